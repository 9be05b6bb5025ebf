use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec4;
use tidewater_common::{
    BufferId, Descriptor, Filter, FramebufferDesc, FramebufferId, Layout, MeshData, MeshId,
    ProgramId, Resolution, TextureDesc, TextureId, TextureShape, Vertex, Wrap,
};
use tidewater_render::{
    GpuBackend, PipelineState, PolygonMode, RenderError, RenderTarget, UniformValue, Viewport,
};
use wgpu::util::DeviceExt;

use crate::formats;
use crate::reflect::{
    BUFFER_GROUP, FRAGMENT_ENTRY, FULLSCREEN_ENTRY, ProgramInfo, TEXTURE_GROUP, UNIFORM_GROUP,
    VERTEX_ENTRY, reflect,
};
use crate::shaders;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
];

static MESH_LAYOUT: [wgpu::VertexBufferLayout<'static>; 1] = [wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as u64,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &VERTEX_ATTRIBUTES,
}];

const SAMPLED: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC);

struct Program {
    name: String,
    module: wgpu::ShaderModule,
    info: ProgramInfo,
    uniforms: Vec<u8>,
}

struct Texture {
    label: String,
    texture: wgpu::Texture,
    /// Sampling view over every layer and mip.
    view: wgpu::TextureView,
    /// One single-mip 2D view per layer, for rendering.
    layers: Vec<wgpu::TextureView>,
    shape: TextureShape,
    descriptor: Descriptor,
    size: Resolution,
}

impl Texture {
    fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

struct Mesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct Framebuffer {
    desc: FramebufferDesc,
    attachments: Vec<TextureId>,
    depth: Option<TextureId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DrawShape {
    Mesh,
    Fullscreen,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    state: PipelineState,
    shape: DrawShape,
    colors: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
}

/// Views and size of the bound target, resolved for one pass.
struct TargetViews<'a> {
    colors: Vec<&'a wgpu::TextureView>,
    depth: Option<&'a wgpu::TextureView>,
    size: Resolution,
}

/// The swapchain image of the frame being drawn.
struct Display {
    linear: wgpu::TextureView,
    srgb: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: Resolution,
}

#[derive(Debug, Clone, Copy)]
struct PendingClear {
    color: Option<Vec4>,
    depth: Option<f32>,
}

/// [`GpuBackend`] over a wgpu device.
///
/// Binding state is kept CPU-side and turned into one render pass per draw.
/// Pipelines are built on first use for each program, state and target
/// format combination and cached from then on.
///
/// Program binding layout is described in [`crate::reflect`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u32,
    programs: HashMap<ProgramId, Program>,
    textures: HashMap<TextureId, Texture>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    meshes: HashMap<MeshId, Mesh>,
    framebuffers: HashMap<FramebufferId, Framebuffer>,
    samplers: HashMap<(Filter, Wrap), wgpu::Sampler>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    blit_module: wgpu::ShaderModule,
    blit_pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,

    state: PipelineState,
    target: Option<RenderTarget>,
    viewport: Option<Viewport>,
    program: Option<ProgramId>,
    bound_textures: BTreeMap<u32, TextureId>,
    bound_buffers: BTreeMap<u32, BufferId>,
    pending_clear: Option<PendingClear>,
    encoder: Option<wgpu::CommandEncoder>,
    display: Option<Display>,
    warned: Warnings,
    draws: u64,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured GPU error");
        }));
        let blit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit"),
            source: wgpu::ShaderSource::Wgsl(shaders::BLIT_SHADER.into()),
        });
        let features = device.features();
        if !features.contains(wgpu::Features::FLOAT32_FILTERABLE) {
            tracing::warn!("float32 textures are not filterable on this device");
        }
        Self {
            device,
            queue,
            next_id: 1,
            programs: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            meshes: HashMap::new(),
            framebuffers: HashMap::new(),
            samplers: HashMap::new(),
            pipelines: HashMap::new(),
            blit_module,
            blit_pipelines: HashMap::new(),
            state: PipelineState::default(),
            target: None,
            viewport: None,
            program: None,
            bound_textures: BTreeMap::new(),
            bound_buffers: BTreeMap::new(),
            pending_clear: None,
            encoder: None,
            display: None,
            warned: Warnings::default(),
            draws: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Draws issued since creation.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    /// Makes a swapchain image the display target until [`Self::finish_frame`].
    ///
    /// The surface must allow both the sRGB and linear view of its format.
    pub fn begin_frame(&mut self, surface: &wgpu::Texture) {
        let format = surface.format().remove_srgb_suffix();
        let view = |format| {
            surface.create_view(&wgpu::TextureViewDescriptor {
                label: Some("display"),
                format: Some(format),
                ..Default::default()
            })
        };
        self.display = Some(Display {
            linear: view(format),
            srgb: view(format.add_srgb_suffix()),
            format,
            size: Resolution::new(surface.width(), surface.height()),
        });
    }

    /// Submits everything recorded for the frame and releases the display.
    pub fn finish_frame(&mut self) {
        self.flush_clear();
        self.submit();
        self.display = None;
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn warn_once(&mut self, key: String, message: &str) {
        self.warned.warn(key, message);
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tidewater_frame"),
                })
        })
    }

    fn sampler(&mut self, filter: Filter, wrap: Wrap) -> wgpu::Sampler {
        self.samplers
            .entry((filter, wrap))
            .or_insert_with(|| {
                self.device
                    .create_sampler(&formats::sampler_descriptor(filter, wrap))
            })
            .clone()
    }

    fn create_storage(
        &self,
        label: &str,
        shape: TextureShape,
        size: Resolution,
        descriptor: Descriptor,
        usage: wgpu::TextureUsages,
        mips: u32,
    ) -> Texture {
        let format = formats::texture_format(descriptor.layout);
        let layers = shape.layers();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: mips,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(formats::view_dimension(shape)),
            ..Default::default()
        });
        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        Texture {
            label: label.to_string(),
            texture,
            view,
            layers: layer_views,
            shape,
            descriptor,
            size,
        }
    }

    fn renderable(&self, format: wgpu::TextureFormat) -> bool {
        format
            .guaranteed_format_features(self.device.features())
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
    }

    fn blendable(&self, format: wgpu::TextureFormat) -> bool {
        format
            .guaranteed_format_features(self.device.features())
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
    }

    fn blit_pipeline(&mut self, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.blit_pipelines.get(&format) {
            return pipeline.clone();
        }
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("blit_pipeline"),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &self.blit_module,
                    entry_point: Some(FULLSCREEN_ENTRY),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.blit_module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: Default::default(),
                multiview: None,
                cache: None,
            });
        self.blit_pipelines.insert(format, pipeline.clone());
        pipeline
    }

    /// Fullscreen sampled copy from one view into another.
    fn blit_pass(
        &mut self,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        filter: Filter,
    ) {
        let pipeline = self.blit_pipeline(format);
        let sampler = self.sampler(filter, Wrap::Clamp);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        let mut encoder = self.encoder();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: destination,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.encoder = Some(encoder);
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        let Some(record) = self.textures.get(&texture) else {
            return;
        };
        let levels = record.texture.mip_level_count();
        let format = record.format();
        let views: Vec<wgpu::TextureView> = (0..levels)
            .map(|level| {
                record.texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("mip"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        for pair in views.windows(2) {
            self.blit_pass(&pair[0], &pair[1], format, Filter::Linear);
        }
    }

    /// Formats of the bound target's attachments.
    fn target_formats(
        &self,
        target: RenderTarget,
    ) -> Option<(Vec<wgpu::TextureFormat>, Option<wgpu::TextureFormat>)> {
        match target {
            RenderTarget::Display { srgb } => {
                let display = self.display.as_ref()?;
                let format = if srgb {
                    display.format.add_srgb_suffix()
                } else {
                    display.format
                };
                Some((vec![format], None))
            }
            RenderTarget::Framebuffer { id, .. } => {
                let fb = self.framebuffers.get(&id)?;
                let colors = fb
                    .attachments
                    .iter()
                    .map(|t| self.textures.get(t).map(Texture::format))
                    .collect::<Option<Vec<_>>>()?;
                let depth = match fb.depth {
                    Some(t) => Some(self.textures.get(&t)?.format()),
                    None => None,
                };
                Some((colors, depth))
            }
        }
    }

    fn target_views(&self, target: RenderTarget) -> Option<TargetViews<'_>> {
        match target {
            RenderTarget::Display { srgb } => {
                let display = self.display.as_ref()?;
                Some(TargetViews {
                    colors: vec![if srgb { &display.srgb } else { &display.linear }],
                    depth: None,
                    size: display.size,
                })
            }
            RenderTarget::Framebuffer { id, layer } => {
                let fb = self.framebuffers.get(&id)?;
                let layer = layer as usize;
                let mut colors = Vec::with_capacity(fb.attachments.len());
                for attachment in &fb.attachments {
                    colors.push(self.textures.get(attachment)?.layers.get(layer)?);
                }
                let depth = match fb.depth {
                    Some(t) => Some(self.textures.get(&t)?.layers.get(layer)?),
                    None => None,
                };
                Some(TargetViews {
                    colors,
                    depth,
                    size: Resolution::new(fb.desc.width, fb.desc.height),
                })
            }
        }
    }

    fn pipeline(&mut self, key: PipelineKey) -> Result<wgpu::RenderPipeline, String> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }
        let program = self
            .programs
            .get(&key.program)
            .ok_or_else(|| format!("unknown program {:?}", key.program))?;
        let info = &program.info;
        let (entry, buffers): (&str, &[wgpu::VertexBufferLayout]) = match key.shape {
            DrawShape::Mesh if info.has_vertex => (VERTEX_ENTRY, &MESH_LAYOUT),
            DrawShape::Mesh => return Err(format!("program `{}` cannot draw meshes", program.name)),
            DrawShape::Fullscreen if info.has_fullscreen => (FULLSCREEN_ENTRY, &[]),
            DrawShape::Fullscreen => (VERTEX_ENTRY, &[]),
        };
        let cull = formats::cull_mode(key.state.cull).unwrap_or(None);
        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .colors
            .iter()
            .enumerate()
            .map(|(location, &format)| {
                let written = info.fragment_outputs.contains(&(location as u32));
                Some(wgpu::ColorTargetState {
                    format,
                    blend: if self.blendable(format) {
                        formats::blend_state(key.state.blend)
                    } else {
                        None
                    },
                    write_mask: if written {
                        wgpu::ColorWrites::ALL
                    } else {
                        wgpu::ColorWrites::empty()
                    },
                })
            })
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.name.as_str()),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some(entry),
                    compilation_options: Default::default(),
                    buffers,
                },
                fragment: info.has_fragment.then(|| wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: Default::default(),
                    targets: &targets,
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: cull,
                    polygon_mode: formats::polygon_mode(key.state.polygon),
                    ..Default::default()
                },
                depth_stencil: key
                    .depth
                    .map(|format| formats::depth_stencil(&key.state, format)),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }
        tracing::debug!(program = %program.name, state = ?key.state, "created pipeline");
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn bind_groups(
        &mut self,
        program_id: ProgramId,
        pipeline: &wgpu::RenderPipeline,
    ) -> Result<Vec<wgpu::BindGroup>, String> {
        let program = self
            .programs
            .get(&program_id)
            .ok_or_else(|| format!("unknown program {program_id:?}"))?;
        let Some(max_group) = program.info.max_group() else {
            return Ok(Vec::new());
        };

        let uniform_buffer = program.info.uniforms.as_ref().map(|_| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("uniforms"),
                    contents: &program.uniforms,
                    usage: wgpu::BufferUsages::UNIFORM,
                })
        });

        let mut samplers = Vec::new();
        for (&slot, binding) in &program.info.textures {
            let texture_id = self
                .bound_textures
                .get(&slot)
                .ok_or_else(|| format!("`{}` samples slot {slot} with nothing bound", program.name))?;
            let texture = self
                .textures
                .get(texture_id)
                .ok_or_else(|| format!("texture {texture_id:?} bound to slot {slot} is gone"))?;
            if binding.cube != (texture.shape == TextureShape::Cube) {
                return Err(format!("texture `{}` has the wrong shape for slot {slot}", texture.label));
            }
            if program.info.samplers.contains(&slot) {
                samplers.push((slot, texture.descriptor.filter, texture.descriptor.wrap));
            }
        }
        let samplers: Vec<(u32, wgpu::Sampler)> = samplers
            .into_iter()
            .map(|(slot, filter, wrap)| (slot, self.sampler(filter, wrap)))
            .collect();

        let program = &self.programs[&program_id];
        let mut groups = Vec::new();
        for group in 0..=max_group {
            let mut entries = Vec::new();
            match group {
                UNIFORM_GROUP => {
                    if let Some(buffer) = &uniform_buffer {
                        entries.push(wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        });
                    }
                }
                TEXTURE_GROUP => {
                    for &slot in program.info.textures.keys() {
                        let texture = &self.textures[&self.bound_textures[&slot]];
                        entries.push(wgpu::BindGroupEntry {
                            binding: slot * 2,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        });
                    }
                    for (slot, sampler) in &samplers {
                        entries.push(wgpu::BindGroupEntry {
                            binding: slot * 2 + 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        });
                    }
                }
                BUFFER_GROUP => {
                    for &slot in &program.info.buffers {
                        let buffer = self
                            .bound_buffers
                            .get(&slot)
                            .and_then(|b| self.buffers.get(b))
                            .ok_or_else(|| {
                                format!("`{}` reads buffer slot {slot} with nothing bound", program.name)
                            })?;
                        entries.push(wgpu::BindGroupEntry {
                            binding: slot,
                            resource: buffer.as_entire_binding(),
                        });
                    }
                }
                _ => {}
            }
            groups.push(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(program.name.as_str()),
                layout: &pipeline.get_bind_group_layout(group),
                entries: &entries,
            }));
        }
        Ok(groups)
    }

    fn load_ops(&mut self) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>) {
        let clear = self.pending_clear.take();
        let color = match clear.and_then(|c| c.color) {
            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                r: c.x as f64,
                g: c.y as f64,
                b: c.z as f64,
                a: c.w as f64,
            }),
            None => wgpu::LoadOp::Load,
        };
        let depth = match clear.and_then(|c| c.depth) {
            Some(d) => wgpu::LoadOp::Clear(d),
            None => wgpu::LoadOp::Load,
        };
        (color, depth)
    }

    /// Applies a pending clear with an empty pass.
    fn flush_clear(&mut self) {
        if self.pending_clear.is_none() {
            return;
        }
        let Some(target) = self.target else {
            self.pending_clear = None;
            return;
        };
        let (color_load, depth_load) = self.load_ops();
        let mut encoder = self.encoder();
        if let Some(views) = self.target_views(target) {
            let colors = color_attachments(&views, color_load);
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear"),
                color_attachments: &colors,
                depth_stencil_attachment: depth_attachment(&views, depth_load),
                ..Default::default()
            });
        }
        self.encoder = Some(encoder);
    }

    fn draw(&mut self, shape: DrawShape, mesh: Option<MeshId>) {
        let Some(program) = self.program else {
            self.warn_once("no-program".into(), "draw without a program, skipped");
            return;
        };
        let Some(target) = self.target else {
            self.warn_once("no-target".into(), "draw without a target, skipped");
            return;
        };
        if formats::cull_mode(self.state.cull).is_none() {
            // Both faces culled: nothing is rasterized.
            return;
        }
        let feature = match self.state.polygon {
            PolygonMode::Fill => None,
            PolygonMode::Line => Some(wgpu::Features::POLYGON_MODE_LINE),
            PolygonMode::Point => Some(wgpu::Features::POLYGON_MODE_POINT),
        };
        if let Some(feature) = feature {
            if !self.device.features().contains(feature) {
                self.warn_once(format!("{feature:?}"), "polygon mode unsupported, draw skipped");
                return;
            }
        }
        let Some((colors, depth)) = self.target_formats(target) else {
            self.warn_once(format!("{target:?}"), "draw target unavailable, skipped");
            return;
        };
        let key = PipelineKey {
            program,
            state: self.state,
            shape,
            colors,
            depth,
        };
        let pipeline = match self.pipeline(key) {
            Ok(p) => p,
            Err(e) => {
                self.warn_once(format!("pipeline-{program:?}"), &e);
                return;
            }
        };
        let groups = match self.bind_groups(program, &pipeline) {
            Ok(g) => g,
            Err(e) => {
                self.warn_once(e.clone(), "draw bindings incomplete, skipped");
                return;
            }
        };

        let (color_load, depth_load) = self.load_ops();
        let mut encoder = self.encoder();
        let Some(views) = self.target_views(target) else {
            self.encoder = Some(encoder);
            return;
        };
        let rect = gl_viewport(self.viewport, views.size);
        {
            let colors = color_attachments(&views, color_load);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: self.programs.get(&program).map(|p| p.name.as_str()),
                color_attachments: &colors,
                depth_stencil_attachment: depth_attachment(&views, depth_load),
                ..Default::default()
            });
            pass.set_pipeline(&pipeline);
            for (index, group) in groups.iter().enumerate() {
                pass.set_bind_group(index as u32, group, &[]);
            }
            if let Some((x, y, w, h)) = rect {
                pass.set_viewport(x, y, w, h, 0.0, 1.0);
            }
            match mesh.and_then(|m| self.meshes.get(&m)) {
                Some(mesh) => {
                    pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                    pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
                None if shape == DrawShape::Fullscreen => pass.draw(0..3, 0..1),
                None => {}
            }
        }
        self.encoder = Some(encoder);
        self.draws += 1;
    }
}

fn color_attachments<'a>(
    views: &TargetViews<'a>,
    load: wgpu::LoadOp<wgpu::Color>,
) -> Vec<Option<wgpu::RenderPassColorAttachment<'a>>> {
    views
        .colors
        .iter()
        .map(|&view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect()
}

fn depth_attachment<'a>(
    views: &TargetViews<'a>,
    load: wgpu::LoadOp<f32>,
) -> Option<wgpu::RenderPassDepthStencilAttachment<'a>> {
    views.depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    })
}

/// Converts a bottom-left origin viewport to wgpu's top-left, clipped to the target.
///
/// `None` covers the whole target.
fn gl_viewport(viewport: Option<Viewport>, size: Resolution) -> Option<(f32, f32, f32, f32)> {
    let v = viewport?;
    let x = v.x.min(size.width);
    let y = v.y.min(size.height);
    let width = v.width.min(size.width - x).max(1);
    let height = v.height.min(size.height - y).max(1);
    let top = size.height.saturating_sub(y + height);
    Some((x as f32, top as f32, width as f32, height as f32))
}

impl GpuBackend for WgpuBackend {
    fn create_program(&mut self, name: &str, source: &str) -> Result<ProgramId, RenderError> {
        let source = shaders::complete_source(source);
        let (_, info) = reflect(&source).map_err(|message| RenderError::Shader {
            name: name.to_string(),
            message,
        })?;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Shader {
                name: name.to_string(),
                message: error.to_string(),
            });
        }
        let uniforms = vec![0; info.uniforms.as_ref().map_or(0, |u| u.size as usize)];
        let id = ProgramId(self.next_handle());
        tracing::debug!(name, textures = info.textures.len(), "compiled program");
        self.programs.insert(
            id,
            Program {
                name: name.to_string(),
                module,
                info,
                uniforms,
            },
        );
        Ok(id)
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, RenderError> {
        let format = formats::texture_format(desc.descriptor.layout);
        let mips = if desc.shape == TextureShape::D2
            && desc.descriptor.filter.uses_mipmaps()
            && self.renderable(format)
        {
            formats::mip_count(desc.width, desc.height)
        } else {
            1
        };
        let mut usage = SAMPLED;
        if mips > 1 {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let texture = self.create_storage(
            &desc.label,
            desc.shape,
            Resolution::new(desc.width, desc.height),
            desc.descriptor,
            usage,
            mips,
        );
        let id = TextureId(self.next_handle());
        self.textures.insert(id, texture);
        if let Some(data) = data {
            self.write_texture(id, data)?;
        }
        Ok(id)
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), RenderError> {
        // Queue writes land before any recorded pass: keep ordering.
        self.flush_clear();
        self.submit();
        let record = self
            .textures
            .get(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        let layout: Layout = record.descriptor.layout;
        let layers = record.shape.layers();
        let expected = (record.size.width * record.size.height * layers * layout.bytes_per_pixel())
            as usize;
        if data.len() != expected {
            return Err(RenderError::SizeMismatch {
                label: record.label.clone(),
                expected,
                actual: data.len(),
            });
        }
        let pixels = formats::widen_pixels(layout, data);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &record.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(record.size.width * formats::stored_bytes_per_pixel(layout)),
                rows_per_image: Some(record.size.height),
            },
            wgpu::Extent3d {
                width: record.size.width,
                height: record.size.height,
                depth_or_array_layers: layers,
            },
        );
        if record.texture.mip_level_count() > 1 {
            self.generate_mipmaps(texture);
            self.submit();
        }
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(record) = self.textures.remove(&texture) {
            record.texture.destroy();
        }
        self.bound_textures.retain(|_, t| *t != texture);
    }

    fn create_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, RenderError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = BufferId(self.next_handle());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), RenderError> {
        self.flush_clear();
        self.submit();
        let record = self
            .buffers
            .get(&buffer)
            .ok_or(RenderError::UnknownBuffer(buffer))?;
        if data.len() as u64 > record.size() {
            return Err(RenderError::SizeMismatch {
                label: format!("buffer {}", buffer.0),
                expected: record.size() as usize,
                actual: data.len(),
            });
        }
        self.queue.write_buffer(record, 0, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(record) = self.buffers.remove(&buffer) {
            record.destroy();
        }
        self.bound_buffers.retain(|_, b| *b != buffer);
    }

    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<MeshId, RenderError> {
        let vertex_count = mesh.vertices.len() as u32;
        if let Some(bad) = mesh.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(RenderError::Backend(format!(
                "mesh `{label}` index {bad} out of range for {vertex_count} vertices"
            )));
        }
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let id = MeshId(self.next_handle());
        self.meshes.insert(
            id,
            Mesh {
                vertices,
                indices,
                index_count: mesh.indices.len() as u32,
            },
        );
        Ok(id)
    }

    fn destroy_mesh(&mut self, mesh: MeshId) {
        if let Some(record) = self.meshes.remove(&mesh) {
            record.vertices.destroy();
            record.indices.destroy();
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId, RenderError> {
        let size = Resolution::new(desc.width, desc.height);
        let usage = SAMPLED | wgpu::TextureUsages::RENDER_ATTACHMENT;
        let mut attachments = Vec::with_capacity(desc.attachments.len());
        for (index, descriptor) in desc.attachments.iter().enumerate() {
            let label = format!("{}_{index}", desc.label);
            let texture = self.create_storage(&label, desc.shape, size, *descriptor, usage, 1);
            let id = TextureId(self.next_handle());
            self.textures.insert(id, texture);
            attachments.push(id);
        }
        let depth = if desc.depth {
            let descriptor = Descriptor::new(Layout::Depth32F, Filter::Nearest, Wrap::Clamp);
            let label = format!("{}_depth", desc.label);
            let texture = self.create_storage(&label, desc.shape, size, descriptor, usage, 1);
            let id = TextureId(self.next_handle());
            self.textures.insert(id, texture);
            Some(id)
        } else {
            None
        };
        let id = FramebufferId(self.next_handle());
        self.framebuffers.insert(
            id,
            Framebuffer {
                desc: desc.clone(),
                attachments,
                depth,
            },
        );
        tracing::debug!(label = %desc.label, width = desc.width, height = desc.height, "created framebuffer");
        Ok(id)
    }

    fn resize_framebuffer(
        &mut self,
        framebuffer: FramebufferId,
        resolution: Resolution,
    ) -> Result<(), RenderError> {
        self.flush_clear();
        let fb = self
            .framebuffers
            .get(&framebuffer)
            .ok_or(RenderError::UnknownFramebuffer(framebuffer))?;
        let usage = SAMPLED | wgpu::TextureUsages::RENDER_ATTACHMENT;
        let shape = fb.desc.shape;
        let ids: Vec<TextureId> = fb.attachments.iter().copied().chain(fb.depth).collect();
        for id in ids {
            let Some(old) = self.textures.get(&id) else {
                continue;
            };
            let texture =
                self.create_storage(&old.label, shape, resolution, old.descriptor, usage, 1);
            if let Some(old) = self.textures.insert(id, texture) {
                old.texture.destroy();
            }
        }
        if let Some(fb) = self.framebuffers.get_mut(&framebuffer) {
            fb.desc.width = resolution.width;
            fb.desc.height = resolution.height;
        }
        Ok(())
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(fb) = self.framebuffers.remove(&framebuffer) {
            for id in fb.attachments.into_iter().chain(fb.depth) {
                self.destroy_texture(id);
            }
        }
        if matches!(self.target, Some(RenderTarget::Framebuffer { id, .. }) if id == framebuffer) {
            self.target = None;
            self.pending_clear = None;
        }
    }

    fn framebuffer_texture(
        &self,
        framebuffer: FramebufferId,
        attachment: usize,
    ) -> Result<TextureId, RenderError> {
        let fb = self
            .framebuffers
            .get(&framebuffer)
            .ok_or(RenderError::UnknownFramebuffer(framebuffer))?;
        fb.attachments
            .get(attachment)
            .copied()
            .ok_or(RenderError::MissingAttachment {
                framebuffer,
                index: attachment,
            })
    }

    fn framebuffer_size(&self, framebuffer: FramebufferId) -> Option<Resolution> {
        self.framebuffers
            .get(&framebuffer)
            .map(|fb| Resolution::new(fb.desc.width, fb.desc.height))
    }

    fn pipeline_state(&self) -> PipelineState {
        self.state
    }

    fn set_pipeline_state(&mut self, state: PipelineState) {
        self.state = state;
    }

    fn bind_target(&mut self, target: RenderTarget) {
        if self.target != Some(target) {
            self.flush_clear();
        }
        self.target = Some(target);
    }

    fn unbind_target(&mut self) {
        self.flush_clear();
        self.target = None;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn clear(&mut self, color: Option<Vec4>, depth: Option<f32>) {
        let pending = self.pending_clear.get_or_insert(PendingClear {
            color: None,
            depth: None,
        });
        pending.color = color.or(pending.color);
        pending.depth = depth.or(pending.depth);
    }

    fn use_program(&mut self, program: ProgramId) {
        if !self.programs.contains_key(&program) {
            tracing::warn!(?program, "unknown program");
        }
        self.program = Some(program);
    }

    fn uniform(&mut self, name: &str, value: UniformValue) {
        let Some(program) = self.program.and_then(|p| self.programs.get_mut(&p)) else {
            return;
        };
        let written = match &program.info.uniforms {
            Some(block) => block.write(&mut program.uniforms, name, value),
            None => false,
        };
        if !written {
            let key = uniform_key(&program.name, name);
            self.warn_once(key, "uniform not declared by program");
        }
    }

    fn bind_texture(&mut self, texture: TextureId, slot: u32) {
        self.bound_textures.insert(slot, texture);
    }

    fn bind_buffer(&mut self, buffer: BufferId, slot: u32) {
        self.bound_buffers.insert(slot, buffer);
    }

    fn draw_mesh(&mut self, mesh: MeshId) {
        if !self.meshes.contains_key(&mesh) {
            self.warn_once(format!("mesh-{mesh:?}"), "unknown mesh, draw skipped");
            return;
        }
        self.draw(DrawShape::Mesh, Some(mesh));
    }

    fn draw_tessellated(&mut self, mesh: MeshId, patch_size: u32) {
        // No tessellation stage: the control mesh is drawn as triangles.
        if patch_size != 3 {
            self.warn_once(
                format!("patch-{patch_size}"),
                "patches drawn as their triangulated control mesh",
            );
        }
        self.draw_mesh(mesh);
    }

    fn draw_fullscreen(&mut self) {
        self.draw(DrawShape::Fullscreen, None);
    }

    fn blit(&mut self, source: TextureId, destination: FramebufferId, filter: Filter) {
        self.flush_clear();
        let Some(&dest_id) = self
            .framebuffers
            .get(&destination)
            .and_then(|fb| fb.attachments.first())
        else {
            self.warn_once(format!("blit-{destination:?}"), "blit destination unavailable");
            return;
        };
        let (Some(src), Some(dst)) = (self.textures.get(&source), self.textures.get(&dest_id))
        else {
            self.warn_once(format!("blit-{source:?}"), "blit source unavailable");
            return;
        };
        if src.size == dst.size && src.format() == dst.format() {
            let mut encoder = self.encoder();
            let (src, dst) = (&self.textures[&source], &self.textures[&dest_id]);
            encoder.copy_texture_to_texture(
                src.texture.as_image_copy(),
                dst.texture.as_image_copy(),
                wgpu::Extent3d {
                    width: src.size.width,
                    height: src.size.height,
                    depth_or_array_layers: 1,
                },
            );
            self.encoder = Some(encoder);
            return;
        }
        let format = dst.format();
        let (src_view, dst_view) = (src.layers[0].clone(), dst.layers[0].clone());
        self.blit_pass(&src_view, &dst_view, format, filter);
    }
}

/// Warning keys already logged; each key warns once.
#[derive(Default)]
struct Warnings {
    seen: HashSet<String>,
}

impl Warnings {
    /// Logs `message` the first time `key` is seen. Returns whether it logged.
    fn warn(&mut self, key: String, message: &str) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        tracing::warn!(key = %key, "{message}");
        self.seen.insert(key);
        true
    }
}

fn uniform_key(program: &str, uniform: &str) -> String {
    format!("uniform-{program}-{uniform}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_uniform_warns_once_per_program_and_name() {
        let mut warnings = Warnings::default();
        let message = "uniform not declared by program";
        assert!(warnings.warn(uniform_key("water", "u_foam"), message));
        for _ in 0..100 {
            assert!(!warnings.warn(uniform_key("water", "u_foam"), message));
        }
        assert!(warnings.warn(uniform_key("water", "u_time"), message));
        assert!(warnings.warn(uniform_key("terrain", "u_foam"), message));
        assert!(!warnings.warn(uniform_key("terrain", "u_foam"), message));
    }

    #[test]
    fn full_target_needs_no_viewport() {
        assert_eq!(gl_viewport(None, Resolution::new(640, 360)), None);
    }

    #[test]
    fn viewport_origin_is_flipped() {
        let v = Viewport {
            x: 10,
            y: 20,
            width: 100,
            height: 50,
        };
        assert_eq!(
            gl_viewport(Some(v), Resolution::new(640, 360)),
            Some((10.0, 290.0, 100.0, 50.0))
        );
    }

    #[test]
    fn viewport_is_clipped_to_target() {
        let v = Viewport::full(Resolution::new(1920, 1080));
        assert_eq!(
            gl_viewport(Some(v), Resolution::new(960, 540)),
            Some((0.0, 0.0, 960.0, 540.0))
        );
    }
}
