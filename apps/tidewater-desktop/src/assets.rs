//! Island assets from a directory: `shaders/<name>.wgsl` and `textures/<name>.<ext>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tidewater_common::{Layout, MeshData, TextureShape};
use tidewater_render::{
    MemoryResources, PROGRAM_ASSETS, SKY_MESH, TEXTURE_ASSETS, TRANSITION_NOISE_TEXTURE,
    TextureSource,
};
use tidewater_terrain::transition_noise_source;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "exr", "hdr", "tga"];
pub const TRANSITION_NOISE_SIZE: u32 = 512;

/// Reads every program and texture the island needs. Any missing file is an error.
pub fn load(dir: &Path, noise_seed: u32) -> Result<MemoryResources> {
    let _span = tracing::info_span!("load_assets", dir = %dir.display()).entered();
    let mut resources = MemoryResources::new();

    for name in PROGRAM_ASSETS {
        let path = dir.join("shaders").join(format!("{name}.wgsl"));
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("reading shader {}", path.display()))?;
        resources.insert_shader(name, source);
    }

    for (name, descriptor) in TEXTURE_ASSETS {
        if name == TRANSITION_NOISE_TEXTURE {
            resources.insert_texture(
                name,
                transition_noise_source(TRANSITION_NOISE_SIZE, noise_seed),
            );
            continue;
        }
        let path = find_image(&dir.join("textures"), name)?;
        let source = decode(&path, descriptor.layout)?;
        tracing::debug!(name, width = source.width, height = source.height, "loaded texture");
        resources.insert_texture(name, source);
    }

    resources.insert_mesh(SKY_MESH, MeshData::plane());
    Ok(resources)
}

fn find_image(dir: &Path, name: &str) -> Result<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
        .with_context(|| format!("no image for texture '{name}' in {}", dir.display()))
}

/// Decodes an image into tightly packed pixels of `layout`.
fn decode(path: &Path, layout: Layout) -> Result<TextureSource> {
    let image = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
    let (width, height) = (image.width(), image.height());
    let floats = |values: Vec<f32>| bytemuck::cast_slice::<f32, u8>(&values).to_vec();
    let pixels = match layout {
        Layout::R8 => image.into_luma8().into_raw(),
        Layout::RGB8 | Layout::SRGB8 => image.into_rgb8().into_raw(),
        Layout::SRGB8Alpha8 => image.into_rgba8().into_raw(),
        Layout::R32F => floats(image.into_rgb32f().pixels().map(|p| p[0]).collect()),
        Layout::RG32F => floats(
            image
                .into_rgb32f()
                .pixels()
                .flat_map(|p| [p[0], p[1]])
                .collect(),
        ),
        Layout::RGB32F => floats(image.into_rgb32f().into_raw()),
        Layout::RGBA32F => floats(image.into_rgba32f().into_raw()),
        other => bail!("cannot load {} as {other:?}", path.display()),
    };
    Ok(TextureSource {
        shape: TextureShape::D2,
        width,
        height,
        pixels: Some(pixels),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_into_requested_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caustics.png");
        image::RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let rgb = decode(&path, Layout::RGB8).unwrap();
        assert_eq!((rgb.width, rgb.height), (4, 2));
        assert_eq!(rgb.pixels.as_ref().map(Vec::len), Some(4 * 2 * 3));

        let red = decode(&path, Layout::R32F).unwrap();
        let values: Vec<f32> = bytemuck::cast_slice(red.pixels.as_ref().unwrap()).to_vec();
        assert_eq!(values.len(), 8);
        assert!((values[0] - 10.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn missing_shader_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), 0).unwrap_err();
        assert!(format!("{err:#}").contains("shader"));
    }

    #[test]
    fn finds_first_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        image::GrayImage::new(1, 1)
            .save(dir.path().join("foam.png"))
            .unwrap();
        assert!(find_image(dir.path(), "foam").is_ok());
        assert!(find_image(dir.path(), "brdf").is_err());
    }
}
