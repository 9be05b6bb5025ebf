use glam::Vec3;
use serde::{Deserialize, Serialize};
use tidewater_common::{
    Descriptor, Filter, Layout, MeshId, TextureDesc, TextureId, TextureShape, Wrap,
};
use tidewater_render::{GpuBackend, RenderError, TerrainCell, TerrainSource, TextureSource};

use crate::cells::{cell_mesh, clipmap_extent, clipmap_layout};
use crate::heightmap::{Heightmap, IslandShape, transition_noise};
use crate::shadow::shadow_mask;
use crate::TerrainError;

const HEIGHTMAP: Descriptor = Descriptor::new(Layout::R32F, Filter::Linear, Wrap::Clamp);
const SHADOW: Descriptor = Descriptor::new(Layout::R8, Filter::Linear, Wrap::Clamp);

/// Generation and layout parameters of the procedural island.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Heightmap width in texels. Must be a power of two.
    pub resolution: u32,
    pub seed: u32,
    /// World size of one heightmap texel.
    pub texel_size: f32,
    /// Quads per side of a cell.
    pub grid_size: u32,
    pub levels: u32,
    /// Shadow mask width in texels.
    pub shadow_resolution: u32,
    pub shape: IslandShape,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            resolution: 1024,
            seed: 4567,
            texel_size: 0.05,
            grid_size: 32,
            levels: 4,
            shadow_resolution: 512,
            shape: IslandShape::default(),
        }
    }
}

impl TerrainParams {
    pub fn validate(&self) -> Result<(), TerrainError> {
        if !self.resolution.is_power_of_two() {
            return Err(TerrainError::InvalidParams(format!(
                "heightmap resolution {} is not a power of two",
                self.resolution
            )));
        }
        if self.texel_size <= 0.0 || !self.texel_size.is_finite() {
            return Err(TerrainError::InvalidParams(format!(
                "texel size {} must be positive",
                self.texel_size
            )));
        }
        if self.grid_size == 0 || self.levels == 0 || self.levels > 16 {
            return Err(TerrainError::InvalidParams(format!(
                "grid {} with {} levels",
                self.grid_size, self.levels
            )));
        }
        if self.shadow_resolution == 0 {
            return Err(TerrainError::InvalidParams("shadow resolution is zero".into()));
        }
        Ok(())
    }
}

/// Island terrain generated from noise, with a CPU-computed shadow mask.
pub struct ProceduralTerrain {
    params: TerrainParams,
    map: Heightmap,
    heightmap: TextureId,
    shadow: TextureId,
    cells: Vec<TerrainCell>,
    meshes: Vec<MeshId>,
    light: Option<Vec3>,
}

impl ProceduralTerrain {
    pub fn new(gpu: &mut dyn GpuBackend, params: TerrainParams) -> Result<Self, TerrainError> {
        let _span = tracing::info_span!("terrain_generate", seed = params.seed).entered();
        params.validate()?;

        let map = Heightmap::island(params.resolution, params.seed, &params.shape);
        let heightmap = gpu.create_texture(
            &TextureDesc::d2("terrain_heightmap", params.resolution, params.resolution, HEIGHTMAP),
            Some(map.as_bytes()),
        )?;
        let shadow = gpu.create_texture(
            &TextureDesc::d2(
                "terrain_shadow",
                params.shadow_resolution,
                params.shadow_resolution,
                SHADOW,
            ),
            None,
        )?;

        let mut cells = Vec::new();
        let mut meshes = Vec::new();
        for layout in clipmap_layout(params.levels) {
            let mesh = gpu.create_mesh("terrain_cell", &cell_mesh(&layout, params.grid_size))?;
            meshes.push(mesh);
            cells.push(TerrainCell {
                level: layout.level,
                bbox: layout.bbox(params.grid_size),
                mesh,
            });
        }
        let (low, high) = map.range();
        tracing::info!(
            resolution = params.resolution,
            cells = cells.len(),
            low,
            high,
            "terrain ready"
        );

        Ok(Self {
            params,
            map,
            heightmap,
            shadow,
            cells,
            meshes,
            light: None,
        })
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    pub fn heightmap_data(&self) -> &Heightmap {
        &self.map
    }

    /// Light direction of the last shadow computation.
    pub fn shadow_light(&self) -> Option<Vec3> {
        self.light
    }

    /// World height at a horizontal position, the map being centered on the origin.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let half = self.params.resolution as f32 * 0.5;
        let tx = x / self.params.texel_size + half - 0.5;
        let tz = z / self.params.texel_size + half - 0.5;
        self.map.sample(tx, tz)
    }

    /// Regenerates the heightmap with a new seed, reusing the GPU texture.
    ///
    /// The shadow mask is recomputed if one was computed before.
    pub fn regenerate(&mut self, gpu: &mut dyn GpuBackend, seed: u32) -> Result<(), TerrainError> {
        let _span = tracing::info_span!("terrain_regenerate", seed).entered();
        self.params.seed = seed;
        self.map = Heightmap::island(self.params.resolution, seed, &self.params.shape);
        gpu.write_texture(self.heightmap, self.map.as_bytes())?;
        if let Some(light) = self.light {
            self.generate_shadow_map(gpu, light)?;
        }
        Ok(())
    }
}

impl TerrainSource for ProceduralTerrain {
    fn heightmap(&self) -> TextureId {
        self.heightmap
    }

    fn map_width(&self) -> u32 {
        self.params.resolution
    }

    fn shadow_map(&self) -> TextureId {
        self.shadow
    }

    fn texel_size(&self) -> f32 {
        self.params.texel_size
    }

    fn grid_size(&self) -> u32 {
        self.params.grid_size
    }

    fn mesh_size(&self) -> f32 {
        clipmap_extent(self.params.levels, self.params.grid_size, self.params.texel_size)
    }

    fn cells(&self) -> &[TerrainCell] {
        &self.cells
    }

    fn generate_shadow_map(
        &mut self,
        gpu: &mut dyn GpuBackend,
        light_direction: Vec3,
    ) -> Result<(), RenderError> {
        let _span = tracing::info_span!("terrain_shadow").entered();
        let mask = shadow_mask(
            &self.map,
            self.params.shadow_resolution,
            light_direction,
            self.params.texel_size,
        );
        gpu.write_texture(self.shadow, &mask)?;
        self.light = Some(light_direction);
        tracing::debug!(?light_direction, "shadow map updated");
        Ok(())
    }

    fn clean(&mut self, gpu: &mut dyn GpuBackend) {
        for mesh in self.meshes.drain(..) {
            gpu.destroy_mesh(mesh);
        }
        self.cells.clear();
        gpu.destroy_texture(self.heightmap);
        gpu.destroy_texture(self.shadow);
    }
}

/// Transition noise ready to register with a memory resource provider.
pub fn transition_noise_source(size: u32, seed: u32) -> TextureSource {
    let values = transition_noise(size, seed);
    TextureSource {
        shape: TextureShape::D2,
        width: size,
        height: size,
        pixels: Some(bytemuck::cast_slice(&values).to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use tidewater_common::Resolution;
    use tidewater_render::{GpuCommand, RecordingGpu};

    use super::*;

    fn small() -> TerrainParams {
        TerrainParams {
            resolution: 64,
            grid_size: 8,
            levels: 3,
            shadow_resolution: 32,
            ..TerrainParams::default()
        }
    }

    #[test]
    fn builds_clipmap_cells() {
        let mut gpu = RecordingGpu::new();
        let terrain = ProceduralTerrain::new(&mut gpu, small()).unwrap();
        assert_eq!(terrain.cells().len(), 16 + 12 + 12);
        assert_eq!(gpu.live_meshes(), 40);
        assert_eq!(gpu.live_textures(), 2);
        assert_eq!(gpu.texture_size(terrain.heightmap()), Some(Resolution::new(64, 64)));
        assert_eq!(gpu.texture_size(terrain.shadow_map()), Some(Resolution::new(32, 32)));
        assert!((terrain.mesh_size() - 4.0 * 8.0 * 4.0 * 0.05).abs() < 1e-5);
    }

    #[test]
    fn rejects_non_power_of_two() {
        let mut gpu = RecordingGpu::new();
        let params = TerrainParams {
            resolution: 100,
            ..small()
        };
        assert!(matches!(
            ProceduralTerrain::new(&mut gpu, params),
            Err(TerrainError::InvalidParams(_))
        ));
    }

    #[test]
    fn shadow_generation_uploads_mask() {
        let mut gpu = RecordingGpu::new();
        let mut terrain = ProceduralTerrain::new(&mut gpu, small()).unwrap();
        gpu.take_commands();
        let light = Vec3::new(0.437, 0.482, -0.896);
        terrain.generate_shadow_map(&mut gpu, light).unwrap();
        assert_eq!(terrain.shadow_light(), Some(light));
        let shadow = terrain.shadow_map();
        let uploads: Vec<_> = gpu
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::WriteTexture { texture, bytes } if *texture == shadow => Some(*bytes),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![32 * 32]);
    }

    #[test]
    fn regenerate_refreshes_heights_and_shadow() {
        let mut gpu = RecordingGpu::new();
        let mut terrain = ProceduralTerrain::new(&mut gpu, small()).unwrap();
        let before = terrain.heightmap_data().clone();
        terrain.generate_shadow_map(&mut gpu, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        gpu.take_commands();

        terrain.regenerate(&mut gpu, 99).unwrap();
        assert_ne!(terrain.heightmap_data(), &before);
        let writes = gpu
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCommand::WriteTexture { .. }))
            .count();
        assert_eq!(writes, 2);
    }

    #[test]
    fn height_at_origin_is_island_center() {
        let mut gpu = RecordingGpu::new();
        let terrain = ProceduralTerrain::new(&mut gpu, small()).unwrap();
        assert!(terrain.height_at(0.0, 0.0) > 0.0);
        assert!(terrain.height_at(-1.6, -1.6) < 0.0);
    }

    #[test]
    fn clean_releases_everything() {
        let mut gpu = RecordingGpu::new();
        let mut terrain = ProceduralTerrain::new(&mut gpu, small()).unwrap();
        terrain.clean(&mut gpu);
        assert_eq!(gpu.live_meshes(), 0);
        assert_eq!(gpu.live_textures(), 0);
        assert!(terrain.cells().is_empty());
    }

    #[test]
    fn noise_source_matches_r32f_size() {
        let source = transition_noise_source(16, 3);
        assert_eq!(source.pixels.map(|p| p.len()), Some(16 * 16 * 4));
    }
}
