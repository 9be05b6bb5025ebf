use std::collections::BTreeMap;
use std::fmt::Write as _;

use glam::Vec4;
use tidewater_common::{
    BufferId, Filter, FramebufferDesc, FramebufferId, MeshData, MeshId, ProgramId, Resolution,
    TextureDesc, TextureId,
};

use crate::error::RenderError;
use crate::gpu::{GpuBackend, RenderTarget, UniformValue, Viewport};
use crate::state::PipelineState;

/// What a recorded draw rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Mesh(MeshId),
    Tessellated { mesh: MeshId, patch_size: u32 },
    Fullscreen,
}

/// A draw together with the bindings that were live when it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub kind: DrawKind,
    pub program: ProgramId,
    pub target: Option<RenderTarget>,
    pub viewport: Option<Viewport>,
    pub state: PipelineState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    SetState(PipelineState),
    BindTarget(RenderTarget),
    UnbindTarget,
    SetViewport(Viewport),
    Clear {
        color: Option<Vec4>,
        depth: Option<f32>,
    },
    UseProgram(ProgramId),
    Uniform {
        name: String,
        value: UniformValue,
    },
    BindTexture {
        texture: TextureId,
        slot: u32,
    },
    BindBuffer {
        buffer: BufferId,
        slot: u32,
    },
    WriteTexture {
        texture: TextureId,
        bytes: usize,
    },
    WriteBuffer {
        buffer: BufferId,
        bytes: usize,
    },
    Draw(DrawCall),
    Blit {
        source: TextureId,
        destination: FramebufferId,
        filter: Filter,
    },
}

#[derive(Debug, Clone)]
struct TextureRecord {
    label: String,
    size: Resolution,
    bytes: usize,
    owner: Option<FramebufferId>,
}

#[derive(Debug, Clone)]
struct FramebufferRecord {
    desc: FramebufferDesc,
    attachments: Vec<TextureId>,
}

impl FramebufferRecord {
    /// Attachments plus the depth buffer, each one allocation.
    fn storage_count(&self) -> u64 {
        self.attachments.len() as u64 + u64::from(self.desc.depth)
    }
}

/// Headless backend that validates calls and records them in order.
///
/// Used for CLI frame traces and for testing frame orchestration without a
/// GPU. Allocation counters track every storage allocation, including the
/// reallocations done by framebuffer resizes, so leaks show up as a growing
/// [`RecordingGpu::live_allocations`].
#[derive(Debug, Default)]
pub struct RecordingGpu {
    next_id: u32,
    programs: BTreeMap<ProgramId, String>,
    textures: BTreeMap<TextureId, TextureRecord>,
    buffers: BTreeMap<BufferId, (String, u64)>,
    meshes: BTreeMap<MeshId, String>,
    framebuffers: BTreeMap<FramebufferId, FramebufferRecord>,
    commands: Vec<GpuCommand>,
    state: PipelineState,
    target: Option<RenderTarget>,
    viewport: Option<Viewport>,
    program: Option<ProgramId>,
    allocations: u64,
    releases: u64,
    skipped_draws: u64,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving resources and bindings in place.
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|c| match c {
            GpuCommand::Draw(d) => Some(d),
            _ => None,
        })
    }

    /// Cube faces (layers) of `framebuffer` that received at least one draw, in draw order.
    pub fn layers_drawn(&self, framebuffer: FramebufferId) -> Vec<u32> {
        let mut layers = Vec::new();
        for draw in self.draws() {
            if let Some(RenderTarget::Framebuffer { id, layer }) = draw.target {
                if id == framebuffer && layers.last() != Some(&layer) {
                    layers.push(layer);
                }
            }
        }
        layers
    }

    pub fn draws_with_program(&self, program: ProgramId) -> usize {
        self.draws().filter(|d| d.program == program).count()
    }

    /// Every value uploaded to `name`, in order.
    pub fn uniform_values(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GpuCommand::Uniform { name: n, value } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn program_named(&self, name: &str) -> Option<ProgramId> {
        self.programs
            .iter()
            .find_map(|(id, n)| (n == name).then_some(*id))
    }

    pub fn program_name(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(&program).map(String::as_str)
    }

    pub fn texture_label(&self, texture: TextureId) -> Option<&str> {
        self.textures.get(&texture).map(|t| t.label.as_str())
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<Resolution> {
        self.textures.get(&texture).map(|t| t.size)
    }

    /// Descriptor a live framebuffer was created with, at its current size.
    pub fn framebuffer_desc(&self, framebuffer: FramebufferId) -> Option<&FramebufferDesc> {
        self.framebuffers.get(&framebuffer).map(|f| &f.desc)
    }

    pub fn live_allocations(&self) -> u64 {
        self.allocations - self.releases
    }

    pub fn total_allocations(&self) -> u64 {
        self.allocations
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Standalone textures, excluding framebuffer attachments.
    pub fn live_textures(&self) -> usize {
        self.textures.values().filter(|t| t.owner.is_none()).count()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn skipped_draws(&self) -> u64 {
        self.skipped_draws
    }

    /// Human-readable listing of the recorded commands.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            match command {
                GpuCommand::SetState(s) => {
                    let _ = writeln!(
                        out,
                        "state depth={}/{:?}/{} cull={:?} polygon={:?} blend={}",
                        s.depth.test, s.depth.func, s.depth.write, s.cull, s.polygon, s.blend
                    );
                }
                GpuCommand::BindTarget(t) => {
                    let _ = writeln!(out, "bind {}", self.describe_target(*t));
                }
                GpuCommand::UnbindTarget => out.push_str("unbind\n"),
                GpuCommand::SetViewport(v) => {
                    let _ = writeln!(out, "viewport {}x{}", v.width, v.height);
                }
                GpuCommand::Clear { color, depth } => {
                    let _ = writeln!(out, "clear color={color:?} depth={depth:?}");
                }
                GpuCommand::UseProgram(p) => {
                    let _ = writeln!(out, "program {}", self.program_name(*p).unwrap_or("?"));
                }
                GpuCommand::Uniform { name, .. } => {
                    let _ = writeln!(out, "  uniform {name}");
                }
                GpuCommand::BindTexture { texture, slot } => {
                    let _ = writeln!(
                        out,
                        "  texture {slot} <- {}",
                        self.texture_label(*texture).unwrap_or("?")
                    );
                }
                GpuCommand::BindBuffer { buffer, slot } => {
                    let label = self.buffers.get(buffer).map(|b| b.0.as_str());
                    let _ = writeln!(out, "  buffer {slot} <- {}", label.unwrap_or("?"));
                }
                GpuCommand::WriteTexture { texture, bytes } => {
                    let label = self.texture_label(*texture).unwrap_or("?");
                    let _ = writeln!(out, "write texture {label} ({bytes} bytes)");
                }
                GpuCommand::WriteBuffer { buffer, bytes } => {
                    let label = self.buffers.get(buffer).map(|b| b.0.as_str());
                    let _ = writeln!(out, "write buffer {} ({bytes} bytes)", label.unwrap_or("?"));
                }
                GpuCommand::Draw(d) => {
                    let what = match d.kind {
                        DrawKind::Mesh(m) => {
                            format!("mesh {}", self.meshes.get(&m).map_or("?", String::as_str))
                        }
                        DrawKind::Tessellated { mesh, patch_size } => format!(
                            "patches({patch_size}) {}",
                            self.meshes.get(&mesh).map_or("?", String::as_str)
                        ),
                        DrawKind::Fullscreen => "fullscreen".to_string(),
                    };
                    let _ = writeln!(out, "  draw {what}");
                }
                GpuCommand::Blit {
                    source,
                    destination,
                    ..
                } => {
                    let _ = writeln!(
                        out,
                        "blit {} -> {}",
                        self.texture_label(*source).unwrap_or("?"),
                        self.framebuffers
                            .get(destination)
                            .map_or("?", |f| f.desc.label.as_str())
                    );
                }
            }
        }
        out
    }

    fn describe_target(&self, target: RenderTarget) -> String {
        match target {
            RenderTarget::Display { srgb } => format!("display (srgb={srgb})"),
            RenderTarget::Framebuffer { id, layer } => {
                let label = self
                    .framebuffers
                    .get(&id)
                    .map_or("?", |f| f.desc.label.as_str());
                if layer == 0 {
                    label.to_string()
                } else {
                    format!("{label}[{layer}]")
                }
            }
        }
    }

    fn record_draw(&mut self, kind: DrawKind) {
        let Some(program) = self.program else {
            tracing::warn!(?kind, "draw without a program, skipped");
            self.skipped_draws += 1;
            return;
        };
        let mesh = match kind {
            DrawKind::Mesh(m) | DrawKind::Tessellated { mesh: m, .. } => Some(m),
            DrawKind::Fullscreen => None,
        };
        if let Some(mesh) = mesh {
            if !self.meshes.contains_key(&mesh) {
                tracing::warn!(?mesh, "draw with an unknown mesh, skipped");
                self.skipped_draws += 1;
                return;
            }
        }
        self.commands.push(GpuCommand::Draw(DrawCall {
            kind,
            program,
            target: self.target,
            viewport: self.viewport,
            state: self.state,
        }));
    }
}

impl GpuBackend for RecordingGpu {
    fn create_program(&mut self, name: &str, source: &str) -> Result<ProgramId, RenderError> {
        if source.trim().is_empty() {
            return Err(RenderError::Shader {
                name: name.to_string(),
                message: "empty source".into(),
            });
        }
        let id = ProgramId(self.next());
        self.programs.insert(id, name.to_string());
        Ok(id)
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, RenderError> {
        if let Some(data) = data {
            if data.len() != desc.data_len() {
                return Err(RenderError::SizeMismatch {
                    label: desc.label.clone(),
                    expected: desc.data_len(),
                    actual: data.len(),
                });
            }
        }
        let id = TextureId(self.next());
        self.textures.insert(
            id,
            TextureRecord {
                label: desc.label.clone(),
                size: Resolution::new(desc.width, desc.height),
                bytes: desc.data_len(),
                owner: None,
            },
        );
        self.allocations += 1;
        Ok(id)
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), RenderError> {
        let record = self
            .textures
            .get(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        if record.owner.is_none() && data.len() != record.bytes {
            return Err(RenderError::SizeMismatch {
                label: record.label.clone(),
                expected: record.bytes,
                actual: data.len(),
            });
        }
        self.commands.push(GpuCommand::WriteTexture {
            texture,
            bytes: data.len(),
        });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        match self.textures.get(&texture) {
            Some(t) if t.owner.is_none() => {
                self.textures.remove(&texture);
                self.releases += 1;
            }
            Some(_) => tracing::warn!(?texture, "attachments are released with their framebuffer"),
            None => tracing::warn!(?texture, "destroying unknown texture"),
        }
    }

    fn create_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, RenderError> {
        let id = BufferId(self.next());
        self.buffers.insert(id, (label.to_string(), size));
        self.allocations += 1;
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), RenderError> {
        let (label, size) = self
            .buffers
            .get(&buffer)
            .ok_or(RenderError::UnknownBuffer(buffer))?;
        if data.len() as u64 > *size {
            return Err(RenderError::SizeMismatch {
                label: label.clone(),
                expected: *size as usize,
                actual: data.len(),
            });
        }
        self.commands.push(GpuCommand::WriteBuffer {
            buffer,
            bytes: data.len(),
        });
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.releases += 1;
        }
    }

    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<MeshId, RenderError> {
        let count = mesh.vertices.len() as u32;
        if let Some(bad) = mesh.indices.iter().find(|&&i| i >= count) {
            return Err(RenderError::Backend(format!(
                "mesh '{label}' index {bad} out of range ({count} vertices)"
            )));
        }
        let id = MeshId(self.next());
        self.meshes.insert(id, label.to_string());
        self.allocations += 1;
        Ok(id)
    }

    fn destroy_mesh(&mut self, mesh: MeshId) {
        if self.meshes.remove(&mesh).is_some() {
            self.releases += 1;
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId, RenderError> {
        let id = FramebufferId(self.next());
        let mut attachments = Vec::with_capacity(desc.attachments.len());
        for (index, attachment) in desc.attachments.iter().enumerate() {
            let texture = TextureId(self.next());
            let tex_desc = TextureDesc {
                label: format!("{}#{index}", desc.label),
                shape: desc.shape,
                width: desc.width,
                height: desc.height,
                descriptor: *attachment,
            };
            self.textures.insert(
                texture,
                TextureRecord {
                    label: tex_desc.label.clone(),
                    size: Resolution::new(desc.width, desc.height),
                    bytes: tex_desc.data_len(),
                    owner: Some(id),
                },
            );
            attachments.push(texture);
        }
        let record = FramebufferRecord {
            desc: desc.clone(),
            attachments,
        };
        self.allocations += record.storage_count();
        self.framebuffers.insert(id, record);
        Ok(id)
    }

    fn resize_framebuffer(
        &mut self,
        framebuffer: FramebufferId,
        resolution: Resolution,
    ) -> Result<(), RenderError> {
        let record = self
            .framebuffers
            .get_mut(&framebuffer)
            .ok_or(RenderError::UnknownFramebuffer(framebuffer))?;
        record.desc.width = resolution.width;
        record.desc.height = resolution.height;
        let storage = record.storage_count();
        for texture in &record.attachments {
            if let Some(t) = self.textures.get_mut(texture) {
                t.size = resolution;
            }
        }
        self.releases += storage;
        self.allocations += storage;
        Ok(())
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        let Some(record) = self.framebuffers.remove(&framebuffer) else {
            tracing::warn!(?framebuffer, "destroying unknown framebuffer");
            return;
        };
        for texture in &record.attachments {
            self.textures.remove(texture);
        }
        self.releases += record.storage_count();
    }

    fn framebuffer_texture(
        &self,
        framebuffer: FramebufferId,
        attachment: usize,
    ) -> Result<TextureId, RenderError> {
        let record = self
            .framebuffers
            .get(&framebuffer)
            .ok_or(RenderError::UnknownFramebuffer(framebuffer))?;
        record
            .attachments
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
            .map(|f| Resolution::new(f.desc.width, f.desc.height))
    }

    fn pipeline_state(&self) -> PipelineState {
        self.state
    }

    fn set_pipeline_state(&mut self, state: PipelineState) {
        self.state = state;
        self.commands.push(GpuCommand::SetState(state));
    }

    fn bind_target(&mut self, target: RenderTarget) {
        if let RenderTarget::Framebuffer { id, layer } = target {
            match self.framebuffers.get(&id) {
                None => tracing::warn!(?id, "binding unknown framebuffer"),
                Some(f) if layer >= f.desc.shape.layers() => {
                    tracing::warn!(?id, layer, "binding a layer past the framebuffer's shape");
                }
                Some(_) => {}
            }
        }
        self.target = Some(target);
        self.commands.push(GpuCommand::BindTarget(target));
    }

    fn unbind_target(&mut self) {
        self.target = None;
        self.commands.push(GpuCommand::UnbindTarget);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.commands.push(GpuCommand::SetViewport(viewport));
    }

    fn clear(&mut self, color: Option<Vec4>, depth: Option<f32>) {
        self.commands.push(GpuCommand::Clear { color, depth });
    }

    fn use_program(&mut self, program: ProgramId) {
        if !self.programs.contains_key(&program) {
            tracing::warn!(?program, "using unknown program");
        }
        self.program = Some(program);
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn uniform(&mut self, name: &str, value: UniformValue) {
        self.commands.push(GpuCommand::Uniform {
            name: name.to_string(),
            value,
        });
    }

    fn bind_texture(&mut self, texture: TextureId, slot: u32) {
        if !self.textures.contains_key(&texture) {
            tracing::warn!(?texture, slot, "binding unknown texture");
        }
        self.commands.push(GpuCommand::BindTexture { texture, slot });
    }

    fn bind_buffer(&mut self, buffer: BufferId, slot: u32) {
        self.commands.push(GpuCommand::BindBuffer { buffer, slot });
    }

    fn draw_mesh(&mut self, mesh: MeshId) {
        self.record_draw(DrawKind::Mesh(mesh));
    }

    fn draw_tessellated(&mut self, mesh: MeshId, patch_size: u32) {
        self.record_draw(DrawKind::Tessellated { mesh, patch_size });
    }

    fn draw_fullscreen(&mut self) {
        self.record_draw(DrawKind::Fullscreen);
    }

    fn blit(&mut self, source: TextureId, destination: FramebufferId, filter: Filter) {
        self.commands.push(GpuCommand::Blit {
            source,
            destination,
            filter,
        });
    }
}
