//! Frame orchestration for the island scene.
//!
//! # Invariants
//! - Passes run in a fixed order: sky update (only when the light moved),
//!   scene clear, terrain, ocean, sky, tonemap.
//! - The scene target is cleared to [`SCENE_CLEAR_SENTINEL`] on every channel
//!   before any geometry is drawn.
//! - A pass that changes pipeline state restores it before the next pass.
//! - The wave buffer on the GPU always mirrors the bank after any edit.

use glam::{Vec3, Vec4};
use tidewater_common::{
    BufferId, Descriptor, Filter, Layout, MeshData, MeshId, ProgramId, Resolution, TextureId, Wrap,
};
use tidewater_waves::{Wave, WaveBank, WaveGenerator};

use crate::blur::{BlurProcessor, GaussianBlur};
use crate::camera::{Camera, FrameView, cube_face_view_projections};
use crate::config::{IslandConfig, RenderToggles, TessellationParams};
use crate::error::RenderError;
use crate::framebuffers::{IslandTargets, SCENE_CLEAR_SENTINEL};
use crate::gpu::{GpuBackend, RenderTarget, Viewport};
use crate::resources::{MemoryResources, ResourceProvider};
use crate::sky::SkyCache;
use crate::state::{DepthFunc, DepthState, Faces, PipelineState, StateScope};
use crate::terrain::{TerrainSource, cell_world_bbox, grid_shift, terrain_anchor};

/// Control points per ocean patch.
pub const OCEAN_PATCH_SIZE: u32 = 4;

/// Animation time used while the clock is stopped.
pub const STOPPED_TIME: f32 = 0.1;

/// Height of the water plane. The camera is underwater strictly below it.
pub const SEA_LEVEL: f32 = 0.0;

/// Segments, radius and height of the cylinder the far ocean is ray cast from.
const FAR_OCEAN_CYLINDER: (u32, f32, f32) = (64, 128.0, 256.0);

pub const SKY_PROGRAM: &str = "atmosphere_island";
pub const GROUND_PROGRAM: &str = "ground_island";
pub const OCEAN_PROGRAM: &str = "ocean_island";
pub const FAR_OCEAN_PROGRAM: &str = "far_ocean_island";
pub const WATER_COPY_PROGRAM: &str = "water_copy";
pub const UNDERWATER_PROGRAM: &str = "ocean_underwater";
pub const TONEMAP_PROGRAM: &str = "tonemap";

/// Every program the island needs, including the blur.
pub const PROGRAM_ASSETS: [&str; 8] = [
    SKY_PROGRAM,
    GROUND_PROGRAM,
    OCEAN_PROGRAM,
    FAR_OCEAN_PROGRAM,
    WATER_COPY_PROGRAM,
    UNDERWATER_PROGRAM,
    TONEMAP_PROGRAM,
    GaussianBlur::PROGRAM,
];

pub const TRANSITION_NOISE_TEXTURE: &str = "transition_noise";

/// Every texture the island needs, with the layout it is sampled with.
pub const TEXTURE_ASSETS: [(&str, Descriptor); 9] = [
    (
        "scattering-precomputed",
        Descriptor::new(Layout::RGB32F, Filter::Linear, Wrap::Clamp),
    ),
    (
        "island_material_diff",
        Descriptor::new(Layout::SRGB8Alpha8, Filter::LinearLinear, Wrap::Repeat),
    ),
    (
        "island_material_nor",
        Descriptor::new(Layout::RGB8, Filter::LinearLinear, Wrap::Repeat),
    ),
    (
        "absorbscatterwater",
        Descriptor::new(Layout::SRGB8, Filter::Linear, Wrap::Clamp),
    ),
    (
        "caustics",
        Descriptor::new(Layout::R8, Filter::LinearLinear, Wrap::Repeat),
    ),
    (
        "wave_normals",
        Descriptor::new(Layout::RGB8, Filter::LinearLinear, Wrap::Repeat),
    ),
    (
        "foam",
        Descriptor::new(Layout::SRGB8Alpha8, Filter::LinearLinear, Wrap::Repeat),
    ),
    (
        "brdf-precomputed",
        Descriptor::new(Layout::RG32F, Filter::Linear, Wrap::Clamp),
    ),
    (
        TRANSITION_NOISE_TEXTURE,
        Descriptor::new(Layout::R32F, Filter::Linear, Wrap::Repeat),
    ),
];

pub const SKY_MESH: &str = "plane";

/// Placeholder assets for every name the island requests, for runs without a GPU or asset directory.
pub fn headless_resources() -> MemoryResources {
    let mut resources = MemoryResources::new();
    for name in PROGRAM_ASSETS {
        resources.insert_shader(name, format!("// {name}"));
    }
    for (name, _) in TEXTURE_ASSETS {
        resources.insert_placeholder_texture(name);
    }
    resources.insert_mesh(SKY_MESH, MeshData::plane());
    resources
}

fn texture_descriptor(name: &str) -> Descriptor {
    TEXTURE_ASSETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
        .unwrap_or(Descriptor::new(Layout::RGBA16F, Filter::Linear, Wrap::Clamp))
}

/// Steps of a frame, in the order they ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    SkyUpdate,
    SceneClear,
    Terrain,
    WaterCopy,
    OceanSurface,
    Underwater,
    FarOcean,
    Sky,
    Tonemap,
}

/// What a frame did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub passes: Vec<Pass>,
    pub cells_total: usize,
    pub cells_drawn: usize,
    pub sky_regenerated: bool,
    pub sky_generation: u64,
    pub underwater: bool,
    /// Animation time the frame was rendered at.
    pub time: f32,
}

impl FrameStats {
    pub fn cells_culled(&self) -> usize {
        self.cells_total - self.cells_drawn
    }

    pub fn ran(&self, pass: Pass) -> bool {
        self.passes.contains(&pass)
    }
}

pub fn is_underwater(position: Vec3) -> bool {
    position.y < SEA_LEVEL
}

#[derive(Debug, Clone, Copy)]
struct Programs {
    sky: ProgramId,
    ground: ProgramId,
    ocean: ProgramId,
    far_ocean: ProgramId,
    water_copy: ProgramId,
    underwater: ProgramId,
    tonemap: ProgramId,
}

#[derive(Debug, Clone, Copy)]
struct Textures {
    scattering: TextureId,
    materials: TextureId,
    material_normals: TextureId,
    absorb_scatter: TextureId,
    caustics: TextureId,
    wave_normals: TextureId,
    foam: TextureId,
    brdf: TextureId,
    transition_noise: TextureId,
}

/// Per-frame values shared by the passes.
struct FrameInputs {
    view: FrameView,
    time: f32,
    inv_render_size: glam::Vec2,
    underwater: bool,
}

/// Renders the island: terrain, Gerstner ocean and atmosphere, into offscreen
/// targets that are tonemapped to the display.
pub struct IslandRenderer {
    programs: Programs,
    textures: Textures,
    sky_mesh: MeshId,
    ocean_mesh: MeshId,
    far_ocean_mesh: MeshId,
    ocean_grid_resolution: u32,
    wave_buffer: BufferId,
    waves: WaveBank,
    wave_generator: WaveGenerator,
    targets: IslandTargets,
    terrain: Box<dyn TerrainSource>,
    blur: Box<dyn BlurProcessor>,
    sky: SkyCache,
    toggles: RenderToggles,
    tessellation: TessellationParams,
    display: Resolution,
}

impl IslandRenderer {
    pub fn new(
        gpu: &mut dyn GpuBackend,
        resources: &mut dyn ResourceProvider,
        terrain: Box<dyn TerrainSource>,
        blur: Box<dyn BlurProcessor>,
        config: &IslandConfig,
    ) -> Result<Self, RenderError> {
        let rendering = config.rendering.rendering_resolution();
        let programs = Programs {
            sky: resources.program(gpu, SKY_PROGRAM)?,
            ground: resources.program(gpu, GROUND_PROGRAM)?,
            ocean: resources.program(gpu, OCEAN_PROGRAM)?,
            far_ocean: resources.program(gpu, FAR_OCEAN_PROGRAM)?,
            water_copy: resources.program(gpu, WATER_COPY_PROGRAM)?,
            underwater: resources.program(gpu, UNDERWATER_PROGRAM)?,
            tonemap: resources.program(gpu, TONEMAP_PROGRAM)?,
        };
        let mut texture =
            |name: &str| resources.texture(&mut *gpu, name, texture_descriptor(name));
        let textures = Textures {
            scattering: texture("scattering-precomputed")?,
            materials: texture("island_material_diff")?,
            material_normals: texture("island_material_nor")?,
            absorb_scatter: texture("absorbscatterwater")?,
            caustics: texture("caustics")?,
            wave_normals: texture("wave_normals")?,
            foam: texture("foam")?,
            brdf: texture("brdf-precomputed")?,
            transition_noise: texture(TRANSITION_NOISE_TEXTURE)?,
        };
        let sky_mesh = resources.mesh(gpu, SKY_MESH)?;

        let ocean_grid_resolution = config.ocean_grid_resolution;
        let ocean_mesh = gpu.create_mesh("ocean", &MeshData::grid(ocean_grid_resolution, 1.0))?;
        let (segments, radius, height) = FAR_OCEAN_CYLINDER;
        let far_ocean_mesh = gpu.create_mesh(
            "far_ocean",
            &MeshData::cylinder(segments, radius, height),
        )?;

        let mut wave_generator = WaveGenerator::with_seed(config.wave_seed);
        let mut waves = WaveBank::generate(&mut wave_generator);
        let wave_buffer = gpu.create_buffer("waves", WaveBank::byte_size())?;
        gpu.write_buffer(wave_buffer, waves.as_bytes())?;
        waves.mark_uploaded();

        let targets = IslandTargets::new(gpu, rendering)?;

        tracing::info!(
            %rendering,
            display = %config.rendering.screen_resolution,
            cells = terrain.cells().len(),
            "island renderer ready"
        );

        Ok(Self {
            programs,
            textures,
            sky_mesh,
            ocean_mesh,
            far_ocean_mesh,
            ocean_grid_resolution,
            wave_buffer,
            waves,
            wave_generator,
            targets,
            terrain,
            blur,
            sky: SkyCache::new(config.light_direction),
            toggles: config.toggles,
            tessellation: config.tessellation(),
            display: config.rendering.screen_resolution,
        })
    }

    /// Build with a [`GaussianBlur`] sized for the half-resolution water effects.
    pub fn with_gaussian_blur(
        gpu: &mut dyn GpuBackend,
        resources: &mut dyn ResourceProvider,
        terrain: Box<dyn TerrainSource>,
        config: &IslandConfig,
    ) -> Result<Self, RenderError> {
        let half = config.rendering.rendering_resolution().half();
        let blur = GaussianBlur::new(gpu, resources, half, Layout::RGB32F)?;
        Self::new(gpu, resources, terrain, Box::new(blur), config)
    }

    /// Render one frame. `elapsed` is the animation clock in seconds.
    ///
    /// Never fails: problems inside a pass are logged and the frame carries on.
    pub fn draw(&mut self, gpu: &mut dyn GpuBackend, camera: &Camera, elapsed: f32) -> FrameStats {
        let _span = tracing::info_span!("island_frame").entered();
        let view = FrameView::new(camera);
        let frame = FrameInputs {
            underwater: is_underwater(view.position),
            time: if self.toggles.stop_time {
                STOPPED_TIME
            } else {
                elapsed
            },
            inv_render_size: self.targets.resolution().inverse_size(),
            view,
        };
        let mut stats = FrameStats {
            underwater: frame.underwater,
            time: frame.time,
            ..FrameStats::default()
        };

        if self.sky.needs_update() {
            self.update_sky(gpu);
            stats.sky_regenerated = true;
            stats.passes.push(Pass::SkyUpdate);
        }
        stats.sky_generation = self.sky.generation();

        let base = PipelineState::opaque();
        gpu.bind_target(RenderTarget::framebuffer(self.targets.scene()));
        gpu.set_viewport(Viewport::full(self.targets.resolution()));
        gpu.set_pipeline_state(base);
        gpu.clear(Some(Vec4::splat(SCENE_CLEAR_SENTINEL)), Some(1.0));
        stats.passes.push(Pass::SceneClear);

        if self.toggles.terrain {
            self.draw_terrain(gpu, &frame, &mut stats);
        }

        if self.toggles.ocean {
            self.draw_ocean(gpu, &frame, &mut stats);
        }

        if self.toggles.sky && !(self.toggles.ocean && frame.underwater) {
            let _span = tracing::debug_span!("sky_pass").entered();
            let mut scope = StateScope::push(
                gpu,
                base.with_depth(DepthState::new(true, DepthFunc::LessEqual, false)),
            );
            scope.use_program(self.programs.sky);
            scope.uniform("clipToWorld", frame.view.clip_to_world.into());
            scope.uniform("viewPos", frame.view.position.into());
            scope.uniform("lightDirection", self.sky.light_direction().into());
            scope.bind_texture(self.textures.scattering, 0);
            scope.draw_mesh(self.sky_mesh);
            stats.passes.push(Pass::Sky);
        }
        gpu.unbind_target();

        self.tonemap(gpu, base);
        stats.passes.push(Pass::Tonemap);

        tracing::trace!(
            cells_drawn = stats.cells_drawn,
            cells_culled = stats.cells_culled(),
            underwater = stats.underwater,
            "frame done"
        );
        stats
    }

    fn update_sky(&mut self, gpu: &mut dyn GpuBackend) {
        let _span = tracing::info_span!("sky_update").entered();
        let light = self.sky.light_direction();
        {
            let base = gpu.pipeline_state();
            let mut scope = StateScope::push(gpu, base.with_depth_test(false).with_blend(false));
            let env = self.targets.environment();
            if let Some(size) = scope.framebuffer_size(env) {
                scope.set_viewport(Viewport::full(size));
            }
            scope.use_program(self.programs.sky);
            scope.uniform("viewPos", Vec3::ZERO.into());
            scope.uniform("lightDirection", light.into());
            scope.bind_texture(self.textures.scattering, 0);
            for (layer, face_vp) in (0u32..).zip(cube_face_view_projections()) {
                scope.bind_target(RenderTarget::Framebuffer { id: env, layer });
                scope.uniform("clipToWorld", face_vp.inverse().into());
                scope.draw_mesh(self.sky_mesh);
            }
            scope.unbind_target();
        }

        if let Err(e) = self.terrain.generate_shadow_map(gpu, light) {
            tracing::error!(error = %e, "shadow map generation failed");
        }
        self.sky.mark_updated();
        tracing::debug!(generation = self.sky.generation(), ?light, "environment updated");
    }

    fn draw_terrain(&self, gpu: &mut dyn GpuBackend, frame: &FrameInputs, stats: &mut FrameStats) {
        let _span = tracing::info_span!("terrain_pass").entered();
        let terrain = self.terrain.as_ref();
        let view = &frame.view;
        let anchor = terrain_anchor(view.position + view.direction, terrain);
        let texel_size = terrain.texel_size();

        gpu.use_program(self.programs.ground);
        gpu.uniform("mvp", view.view_proj.into());
        gpu.uniform("shift", anchor.into());
        gpu.uniform("lightDirection", self.sky.light_direction().into());
        gpu.uniform("camDir", view.direction.into());
        gpu.uniform("camPos", view.position.into());
        gpu.uniform("texelSize", texel_size.into());
        gpu.uniform("invMapSize", (1.0 / terrain.map_width().max(1) as f32).into());
        gpu.uniform("invGridSize", (1.0 / terrain.grid_size().max(1) as f32).into());

        gpu.bind_texture(terrain.heightmap(), 0);
        gpu.bind_texture(self.textures.transition_noise, 1);
        gpu.bind_texture(self.textures.materials, 2);
        gpu.bind_texture(self.textures.material_normals, 3);
        gpu.bind_texture(terrain.shadow_map(), 4);

        let cells = terrain.cells();
        stats.cells_total = cells.len();
        for cell in cells {
            let bbox = cell_world_bbox(cell, texel_size, anchor);
            if !view.frustum.intersects(&bbox) {
                continue;
            }
            let level_size = (1u32 << cell.level.min(31)) as f32 * texel_size;
            gpu.uniform("levelSize", level_size.into());
            gpu.uniform("debugCol", false.into());
            gpu.draw_mesh(cell.mesh);
            stats.cells_drawn += 1;

            if self.toggles.wireframe {
                let base = gpu.pipeline_state();
                let mut wire = StateScope::push(gpu, base.wireframe_overlay());
                wire.uniform("debugCol", true.into());
                wire.draw_mesh(cell.mesh);
            }
        }
        stats.passes.push(Pass::Terrain);
    }

    /// Copy the lit scene into the half-resolution water target, blur it and
    /// snapshot the full-resolution positions.
    fn copy_water_backdrop(&mut self, gpu: &mut dyn GpuBackend, time: f32) {
        let targets = &self.targets;
        {
            let base = gpu.pipeline_state();
            let mut scope = StateScope::push(gpu, base.with_depth_test(false));
            scope.bind_target(RenderTarget::framebuffer(targets.water_effects_half()));
            scope.set_viewport(Viewport::full(targets.half_resolution()));
            scope.use_program(self.programs.water_copy);
            scope.bind_texture(targets.scene_color(), 0);
            scope.bind_texture(targets.scene_position(), 1);
            scope.bind_texture(self.textures.caustics, 2);
            scope.bind_texture(self.textures.wave_normals, 3);
            scope.uniform("time", time.into());
            scope.draw_fullscreen();
            scope.unbind_target();
        }

        self.blur.process(
            gpu,
            targets.water_effects_half_texture(),
            targets.water_effects_blur(),
        );
        gpu.blit(
            targets.scene_position(),
            targets.water_position(),
            Filter::Nearest,
        );
    }

    fn bind_water_inputs(&self, gpu: &mut dyn GpuBackend) {
        gpu.bind_buffer(self.wave_buffer, 0);
        gpu.bind_texture(self.textures.foam, 0);
        gpu.bind_texture(self.targets.water_effects_half_texture(), 1);
        gpu.bind_texture(self.targets.water_position_texture(), 2);
        gpu.bind_texture(self.targets.water_effects_blur_texture(), 3);
        gpu.bind_texture(self.textures.absorb_scatter, 4);
        gpu.bind_texture(self.textures.wave_normals, 5);
        gpu.bind_texture(self.targets.environment_texture(), 6);
    }

    fn draw_ocean(&mut self, gpu: &mut dyn GpuBackend, frame: &FrameInputs, stats: &mut FrameStats) {
        let _span = tracing::info_span!("ocean_pass").entered();
        let view = &frame.view;
        let base = gpu.pipeline_state();

        self.copy_water_backdrop(gpu, frame.time);
        stats.passes.push(Pass::WaterCopy);

        gpu.bind_target(RenderTarget::framebuffer(self.targets.scene()));
        gpu.set_viewport(Viewport::full(self.targets.resolution()));
        {
            // Seen from below, the surface shows its back faces.
            let cull = if frame.underwater {
                Faces::Front
            } else {
                Faces::Back
            };
            let mut scope = StateScope::push(gpu, base.with_cull(Some(cull)));
            scope.use_program(self.programs.ocean);
            scope.uniform("mvp", view.view_proj.into());
            scope.uniform("shift", grid_shift(view.position).into());
            scope.uniform("maxLevelX", self.tessellation.max_level_x.into());
            scope.uniform("maxLevelY", self.tessellation.max_level_y.into());
            scope.uniform("distanceScale", self.tessellation.distance_scale.into());
            scope.uniform("debugCol", false.into());
            scope.uniform("camDir", view.direction.into());
            scope.uniform("camPos", view.position.into());
            scope.uniform("distantProxy", false.into());
            scope.uniform("time", frame.time.into());
            scope.uniform("invTargetSize", frame.inv_render_size.into());
            scope.uniform("invTexelSize", (1.0 / self.terrain.texel_size()).into());
            scope.uniform(
                "invMapSize",
                (1.0 / self.terrain.map_width().max(1) as f32).into(),
            );
            self.bind_water_inputs(&mut *scope);
            scope.bind_texture(self.textures.brdf, 7);
            scope.bind_texture(self.terrain.shadow_map(), 8);
            scope.draw_tessellated(self.ocean_mesh, OCEAN_PATCH_SIZE);

            if self.toggles.wireframe {
                let mut wire = StateScope::push(&mut *scope, base.with_cull(Some(cull)).wireframe_overlay());
                wire.uniform("debugCol", true.into());
                wire.draw_tessellated(self.ocean_mesh, OCEAN_PATCH_SIZE);
            }
        }
        stats.passes.push(Pass::OceanSurface);

        if frame.underwater {
            // The surface just drawn has to show up in the blurred backdrop.
            self.copy_water_backdrop(gpu, frame.time);
            stats.passes.push(Pass::WaterCopy);

            gpu.bind_target(RenderTarget::framebuffer(self.targets.scene()));
            gpu.set_viewport(Viewport::full(self.targets.resolution()));
            let mut scope = StateScope::push(gpu, base.with_depth_test(false));
            scope.use_program(self.programs.underwater);
            scope.uniform("mvp", view.view_proj.into());
            scope.uniform("camDir", view.direction.into());
            scope.uniform("camPos", view.position.into());
            scope.uniform("time", frame.time.into());
            scope.uniform("invTargetSize", frame.inv_render_size.into());
            self.bind_water_inputs(&mut *scope);
            scope.draw_fullscreen();
            stats.passes.push(Pass::Underwater);
        } else {
            let mut scope = StateScope::push(
                gpu,
                base.with_depth(DepthState::new(true, DepthFunc::Always, true)),
            );
            scope.use_program(self.programs.far_ocean);
            scope.uniform("mvp", view.view_proj.into());
            scope.uniform("camPos", view.position.into());
            scope.uniform("debugCol", false.into());
            scope.uniform("time", frame.time.into());
            scope.uniform("distantProxy", true.into());
            scope.uniform(
                "waterGridHalf",
                (self.ocean_grid_resolution.saturating_sub(2) as f32 * 0.5).into(),
            );
            scope.uniform("groundGridHalf", (self.terrain.mesh_size() * 0.5).into());
            scope.uniform("invTargetSize", frame.inv_render_size.into());
            self.bind_water_inputs(&mut *scope);
            scope.bind_texture(self.textures.brdf, 7);
            scope.draw_mesh(self.far_ocean_mesh);

            if self.toggles.wireframe {
                let mut wire = StateScope::push(&mut *scope, base.wireframe_overlay());
                wire.uniform("debugCol", true.into());
                wire.draw_mesh(self.far_ocean_mesh);
            }
            stats.passes.push(Pass::FarOcean);
        }
    }

    fn tonemap(&self, gpu: &mut dyn GpuBackend, base: PipelineState) {
        let _span = tracing::debug_span!("tonemap_pass").entered();
        let mut scope = StateScope::push(gpu, base.with_depth_test(false));
        scope.set_viewport(Viewport::full(self.display));
        scope.bind_target(RenderTarget::Display { srgb: true });
        scope.use_program(self.programs.tonemap);
        scope.bind_texture(self.targets.scene_color(), 0);
        scope.draw_fullscreen();
        scope.unbind_target();
    }

    /// Reallocate the offscreen targets for a new rendering resolution.
    pub fn resize(
        &mut self,
        gpu: &mut dyn GpuBackend,
        rendering: Resolution,
    ) -> Result<(), RenderError> {
        self.targets.resize(gpu, rendering)
    }

    /// Size of the presentation surface the tonemap pass covers.
    pub fn set_display_resolution(&mut self, display: Resolution) {
        self.display = display;
    }

    pub fn display_resolution(&self) -> Resolution {
        self.display
    }

    pub fn rendering_resolution(&self) -> Resolution {
        self.targets.resolution()
    }

    /// Returns whether the direction changed, in which case the next frame
    /// regenerates the environment and shadow map.
    pub fn set_light_direction(&mut self, direction: Vec3) -> bool {
        self.sky.set_light_direction(direction)
    }

    pub fn light_direction(&self) -> Vec3 {
        self.sky.light_direction()
    }

    pub fn sky(&self) -> &SkyCache {
        &self.sky
    }

    pub fn waves(&self) -> &WaveBank {
        &self.waves
    }

    /// Draw a fresh bank from the generator and upload it.
    pub fn regenerate_waves(&mut self, gpu: &mut dyn GpuBackend) -> Result<(), RenderError> {
        self.waves.regenerate(&mut self.wave_generator);
        self.upload_waves(gpu)
    }

    /// Edit one wave, uploading the bank if anything changed.
    pub fn edit_wave(
        &mut self,
        gpu: &mut dyn GpuBackend,
        index: usize,
        edit: impl FnOnce(&mut Wave),
    ) -> Result<bool, RenderError> {
        let changed = self.waves.edit(index, edit)?;
        if changed {
            self.upload_waves(gpu)?;
        }
        Ok(changed)
    }

    fn upload_waves(&mut self, gpu: &mut dyn GpuBackend) -> Result<(), RenderError> {
        if !self.waves.is_dirty() {
            return Ok(());
        }
        gpu.write_buffer(self.wave_buffer, self.waves.as_bytes())?;
        self.waves.mark_uploaded();
        tracing::debug!(revision = self.waves.revision(), "uploaded waves");
        Ok(())
    }

    pub fn toggles(&self) -> &RenderToggles {
        &self.toggles
    }

    pub fn toggles_mut(&mut self) -> &mut RenderToggles {
        &mut self.toggles
    }

    pub fn tessellation(&self) -> &TessellationParams {
        &self.tessellation
    }

    pub fn tessellation_mut(&mut self) -> &mut TessellationParams {
        &mut self.tessellation
    }

    pub fn targets(&self) -> &IslandTargets {
        &self.targets
    }

    pub fn terrain(&self) -> &dyn TerrainSource {
        self.terrain.as_ref()
    }

    /// Release every GPU resource the renderer and its collaborators own.
    pub fn clean(mut self, gpu: &mut dyn GpuBackend) {
        self.blur.clean(gpu);
        self.terrain.clean(gpu);
        gpu.destroy_buffer(self.wave_buffer);
        gpu.destroy_mesh(self.ocean_mesh);
        gpu.destroy_mesh(self.far_ocean_mesh);
        self.targets.clean(gpu);
        tracing::debug!("island renderer cleaned");
    }
}
