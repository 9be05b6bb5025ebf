use std::collections::HashMap;

use tidewater_common::{
    Descriptor, MeshData, MeshId, ProgramId, TextureDesc, TextureId, TextureShape,
};

use crate::error::RenderError;
use crate::gpu::GpuBackend;

/// Resolves named programs, textures and meshes to GPU handles.
///
/// Repeated requests for the same name return the same handle.
pub trait ResourceProvider {
    fn program(&mut self, gpu: &mut dyn GpuBackend, name: &str) -> Result<ProgramId, RenderError>;
    fn texture(
        &mut self,
        gpu: &mut dyn GpuBackend,
        name: &str,
        descriptor: Descriptor,
    ) -> Result<TextureId, RenderError>;
    fn mesh(&mut self, gpu: &mut dyn GpuBackend, name: &str) -> Result<MeshId, RenderError>;
    /// Release every handle handed out so far.
    fn clean(&mut self, gpu: &mut dyn GpuBackend);
}

/// Pixel data waiting to be uploaded.
#[derive(Debug, Clone)]
pub struct TextureSource {
    pub shape: TextureShape,
    pub width: u32,
    pub height: u32,
    /// Tightly packed in the layout it will be requested with. `None` zero-fills.
    pub pixels: Option<Vec<u8>>,
}

/// Provider backed by in-memory sources, uploaded on first request.
#[derive(Debug, Default)]
pub struct MemoryResources {
    shaders: HashMap<String, String>,
    textures: HashMap<String, TextureSource>,
    meshes: HashMap<String, MeshData>,
    programs_loaded: HashMap<String, ProgramId>,
    textures_loaded: HashMap<String, TextureId>,
    meshes_loaded: HashMap<String, MeshId>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_shader(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.shaders.insert(name.into(), source.into());
    }

    pub fn insert_texture(&mut self, name: impl Into<String>, source: TextureSource) {
        self.textures.insert(name.into(), source);
    }

    /// A 1x1 zero-filled texture, for runs without real assets.
    pub fn insert_placeholder_texture(&mut self, name: impl Into<String>) {
        self.insert_texture(
            name,
            TextureSource {
                shape: TextureShape::D2,
                width: 1,
                height: 1,
                pixels: None,
            },
        );
    }

    pub fn insert_mesh(&mut self, name: impl Into<String>, mesh: MeshData) {
        self.meshes.insert(name.into(), mesh);
    }

    pub fn has_shader(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    pub fn has_texture(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn has_mesh(&self, name: &str) -> bool {
        self.meshes.contains_key(name)
    }

    /// Handles uploaded so far.
    pub fn loaded_count(&self) -> usize {
        self.programs_loaded.len() + self.textures_loaded.len() + self.meshes_loaded.len()
    }
}

impl ResourceProvider for MemoryResources {
    fn program(&mut self, gpu: &mut dyn GpuBackend, name: &str) -> Result<ProgramId, RenderError> {
        if let Some(id) = self.programs_loaded.get(name) {
            return Ok(*id);
        }
        let source = self
            .shaders
            .get(name)
            .ok_or_else(|| RenderError::missing("program", name))?;
        let id = gpu.create_program(name, source)?;
        tracing::debug!(name, "loaded program");
        self.programs_loaded.insert(name.to_string(), id);
        Ok(id)
    }

    fn texture(
        &mut self,
        gpu: &mut dyn GpuBackend,
        name: &str,
        descriptor: Descriptor,
    ) -> Result<TextureId, RenderError> {
        if let Some(id) = self.textures_loaded.get(name) {
            return Ok(*id);
        }
        let source = self
            .textures
            .get(name)
            .ok_or_else(|| RenderError::missing("texture", name))?;
        let desc = TextureDesc {
            label: name.to_string(),
            shape: source.shape,
            width: source.width,
            height: source.height,
            descriptor,
        };
        let zeros;
        let pixels = match &source.pixels {
            Some(p) => p.as_slice(),
            None => {
                zeros = vec![0u8; desc.data_len()];
                zeros.as_slice()
            }
        };
        if pixels.len() != desc.data_len() {
            return Err(RenderError::SizeMismatch {
                label: name.to_string(),
                expected: desc.data_len(),
                actual: pixels.len(),
            });
        }
        let id = gpu.create_texture(&desc, Some(pixels))?;
        tracing::debug!(name, width = desc.width, height = desc.height, "loaded texture");
        self.textures_loaded.insert(name.to_string(), id);
        Ok(id)
    }

    fn mesh(&mut self, gpu: &mut dyn GpuBackend, name: &str) -> Result<MeshId, RenderError> {
        if let Some(id) = self.meshes_loaded.get(name) {
            return Ok(*id);
        }
        let mesh = self
            .meshes
            .get(name)
            .ok_or_else(|| RenderError::missing("mesh", name))?;
        let id = gpu.create_mesh(name, mesh)?;
        self.meshes_loaded.insert(name.to_string(), id);
        Ok(id)
    }

    fn clean(&mut self, gpu: &mut dyn GpuBackend) {
        for (_, id) in self.textures_loaded.drain() {
            gpu.destroy_texture(id);
        }
        for (_, id) in self.meshes_loaded.drain() {
            gpu.destroy_mesh(id);
        }
        self.programs_loaded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingGpu;
    use tidewater_common::{Filter, Layout, Wrap};

    const R32: Descriptor = Descriptor::new(Layout::R32F, Filter::Linear, Wrap::Repeat);

    #[test]
    fn requests_are_cached() {
        let mut gpu = RecordingGpu::new();
        let mut res = MemoryResources::new();
        res.insert_shader("tonemap", "src");
        res.insert_placeholder_texture("foam");
        let a = res.program(&mut gpu, "tonemap").unwrap();
        let b = res.program(&mut gpu, "tonemap").unwrap();
        assert_eq!(a, b);
        let t1 = res.texture(&mut gpu, "foam", R32).unwrap();
        let t2 = res.texture(&mut gpu, "foam", R32).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn missing_names_are_reported() {
        let mut gpu = RecordingGpu::new();
        let mut res = MemoryResources::new();
        let err = res.mesh(&mut gpu, "plane").unwrap_err();
        assert_eq!(err.to_string(), "missing mesh asset 'plane'");
    }

    #[test]
    fn pixel_size_must_match_layout() {
        let mut gpu = RecordingGpu::new();
        let mut res = MemoryResources::new();
        res.insert_texture(
            "noise",
            TextureSource {
                shape: TextureShape::D2,
                width: 2,
                height: 2,
                pixels: Some(vec![0; 4]),
            },
        );
        assert!(matches!(
            res.texture(&mut gpu, "noise", R32),
            Err(RenderError::SizeMismatch {
                expected: 16,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn clean_releases_uploads() {
        let mut gpu = RecordingGpu::new();
        let mut res = MemoryResources::new();
        res.insert_mesh("plane", MeshData::plane());
        res.insert_placeholder_texture("caustics");
        res.mesh(&mut gpu, "plane").unwrap();
        res.texture(&mut gpu, "caustics", R32).unwrap();
        res.clean(&mut gpu);
        assert_eq!(gpu.live_allocations(), 0);
        assert_eq!(res.loaded_count(), 0);
    }
}
