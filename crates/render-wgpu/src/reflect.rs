//! WGSL reflection: what a program expects to be bound.
//!
//! Programs follow a fixed binding convention:
//! - group 0, binding 0: a uniform struct whose members are set by name;
//! - group 1: texture slot `n` at binding `2n`, its sampler at `2n + 1`;
//! - group 2: storage buffer slot `n` at binding `n`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use naga::{AddressSpace, Binding, ScalarKind, ShaderStage, TypeInner, VectorSize};
use tidewater_render::UniformValue;

pub const UNIFORM_GROUP: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;
pub const BUFFER_GROUP: u32 = 2;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FULLSCREEN_ENTRY: &str = "vs_fullscreen";
pub const FRAGMENT_ENTRY: &str = "fs_main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Uint,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformField {
    pub offset: u32,
    pub kind: UniformKind,
}

/// Layout of the group 0 uniform struct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBlock {
    pub size: u32,
    pub fields: HashMap<String, UniformField>,
}

impl UniformBlock {
    /// Encodes `value` into `data` at the named member.
    ///
    /// Returns `false` when the member does not exist or its type cannot hold
    /// the value. Booleans are stored as integers.
    pub fn write(&self, data: &mut [u8], name: &str, value: UniformValue) -> bool {
        let Some(field) = self.fields.get(name) else {
            return false;
        };
        let Some(bytes) = encode(field.kind, value) else {
            return false;
        };
        let start = field.offset as usize;
        match data.get_mut(start..start + bytes.len()) {
            Some(slot) => {
                slot.copy_from_slice(&bytes);
                true
            }
            None => false,
        }
    }
}

fn encode(kind: UniformKind, value: UniformValue) -> Option<Vec<u8>> {
    let floats = |v: &[f32]| bytemuck::cast_slice::<f32, u8>(v).to_vec();
    Some(match (kind, value) {
        (UniformKind::Float, UniformValue::Float(v)) => floats(&[v]),
        (UniformKind::Int, UniformValue::Int(v)) => v.to_ne_bytes().to_vec(),
        (UniformKind::Int, UniformValue::Bool(v)) => (v as i32).to_ne_bytes().to_vec(),
        (UniformKind::Uint, UniformValue::Bool(v)) => (v as u32).to_ne_bytes().to_vec(),
        (UniformKind::Uint, UniformValue::Int(v)) if v >= 0 => (v as u32).to_ne_bytes().to_vec(),
        (UniformKind::Vec2, UniformValue::Vec2(v)) => floats(&v.to_array()),
        (UniformKind::Vec3, UniformValue::Vec3(v)) => floats(&v.to_array()),
        (UniformKind::Vec4, UniformValue::Vec4(v)) => floats(&v.to_array()),
        // Columns of a mat3x3 are padded to 16 bytes.
        (UniformKind::Mat3, UniformValue::Mat3(m)) => {
            let mut out = Vec::with_capacity(48);
            for col in [m.x_axis, m.y_axis, m.z_axis] {
                out.extend_from_slice(&floats(&col.extend(0.0).to_array()));
            }
            out
        }
        (UniformKind::Mat4, UniformValue::Mat4(m)) => floats(&m.to_cols_array()),
        _ => return None,
    })
}

/// A texture the program samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub cube: bool,
}

/// Everything the backend needs to know about a parsed program.
#[derive(Debug, Clone, Default)]
pub struct ProgramInfo {
    pub uniforms: Option<UniformBlock>,
    /// Texture slots, keyed by slot number.
    pub textures: BTreeMap<u32, TextureBinding>,
    /// Slots that have a sampler next to their texture.
    pub samplers: BTreeSet<u32>,
    pub buffers: BTreeSet<u32>,
    pub has_vertex: bool,
    pub has_fullscreen: bool,
    pub has_fragment: bool,
    /// Color locations written by the fragment entry point.
    pub fragment_outputs: BTreeSet<u32>,
}

impl ProgramInfo {
    /// Highest bind group index the program uses.
    pub fn max_group(&self) -> Option<u32> {
        if !self.buffers.is_empty() {
            Some(BUFFER_GROUP)
        } else if !self.textures.is_empty() || !self.samplers.is_empty() {
            Some(TEXTURE_GROUP)
        } else if self.uniforms.is_some() {
            Some(UNIFORM_GROUP)
        } else {
            None
        }
    }
}

/// Parses WGSL and extracts its bindings. Errors are rendered with source context.
pub fn reflect(source: &str) -> Result<(naga::Module, ProgramInfo), String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    let mut info = ProgramInfo::default();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let inner = &module.types[var.ty].inner;
        match (binding.group, var.space) {
            (UNIFORM_GROUP, AddressSpace::Uniform) if binding.binding == 0 => {
                info.uniforms = Some(uniform_block(&module, inner)?);
            }
            (TEXTURE_GROUP, AddressSpace::Handle) => {
                let slot = binding.binding / 2;
                match inner {
                    TypeInner::Image { dim, .. } => {
                        info.textures.insert(
                            slot,
                            TextureBinding {
                                cube: *dim == naga::ImageDimension::Cube,
                            },
                        );
                    }
                    TypeInner::Sampler { .. } => {
                        info.samplers.insert(slot);
                    }
                    _ => {}
                }
            }
            (BUFFER_GROUP, AddressSpace::Storage { .. }) => {
                info.buffers.insert(binding.binding);
            }
            (group, _) => {
                return Err(format!(
                    "binding {}:{} does not follow the program binding layout",
                    group, binding.binding
                ));
            }
        }
    }

    for entry in &module.entry_points {
        match (entry.stage, entry.name.as_str()) {
            (ShaderStage::Vertex, VERTEX_ENTRY) => info.has_vertex = true,
            (ShaderStage::Vertex, FULLSCREEN_ENTRY) => info.has_fullscreen = true,
            (ShaderStage::Fragment, FRAGMENT_ENTRY) => {
                info.has_fragment = true;
                if let Some(result) = &entry.function.result {
                    collect_locations(&module, result, &mut info.fragment_outputs);
                }
            }
            _ => {}
        }
    }
    if !info.has_vertex && !info.has_fullscreen {
        return Err(format!("no `{VERTEX_ENTRY}` or `{FULLSCREEN_ENTRY}` entry point"));
    }
    Ok((module, info))
}

fn collect_locations(module: &naga::Module, result: &naga::FunctionResult, out: &mut BTreeSet<u32>) {
    if let Some(Binding::Location { location, .. }) = &result.binding {
        out.insert(*location);
        return;
    }
    if let TypeInner::Struct { members, .. } = &module.types[result.ty].inner {
        for member in members {
            if let Some(Binding::Location { location, .. }) = &member.binding {
                out.insert(*location);
            }
        }
    }
}

fn uniform_block(module: &naga::Module, inner: &TypeInner) -> Result<UniformBlock, String> {
    let TypeInner::Struct { members, span } = inner else {
        return Err("uniform binding 0:0 must be a struct".into());
    };
    let mut fields = HashMap::new();
    for member in members {
        let Some(name) = &member.name else {
            continue;
        };
        let kind = uniform_kind(&module.types[member.ty].inner)
            .ok_or_else(|| format!("uniform member `{name}` has an unsupported type"))?;
        fields.insert(
            name.clone(),
            UniformField {
                offset: member.offset,
                kind,
            },
        );
    }
    Ok(UniformBlock {
        size: *span,
        fields,
    })
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match inner {
        TypeInner::Scalar(s) => match s.kind {
            ScalarKind::Float => Some(UniformKind::Float),
            ScalarKind::Sint => Some(UniformKind::Int),
            ScalarKind::Uint => Some(UniformKind::Uint),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => Some(UniformKind::Vec2),
            VectorSize::Tri => Some(UniformKind::Vec3),
            VectorSize::Quad => Some(UniformKind::Vec4),
        },
        TypeInner::Matrix { columns, rows, .. } => match (columns, rows) {
            (VectorSize::Tri, VectorSize::Tri) => Some(UniformKind::Mat3),
            (VectorSize::Quad, VectorSize::Quad) => Some(UniformKind::Mat4),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat3, Vec3};

    use super::*;

    const OCEAN: &str = r#"
struct Params {
    mvp: mat4x4<f32>,
    normalMat: mat3x3<f32>,
    camPos: vec3<f32>,
    time: f32,
    debugCol: u32,
}
@group(0) @binding(0) var<uniform> params: Params;
@group(1) @binding(0) var heights: texture_2d<f32>;
@group(1) @binding(1) var heights_sampler: sampler;
@group(1) @binding(4) var env: texture_cube<f32>;
@group(1) @binding(5) var env_sampler: sampler;
@group(2) @binding(0) var<storage, read> waves: array<vec4<f32>>;

struct Out {
    @location(0) color: vec4<f32>,
    @location(1) position: vec4<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return params.mvp * vec4<f32>(pos, 1.0);
}

@fragment
fn fs_main() -> Out {
    var out: Out;
    out.color = textureSample(heights, heights_sampler, vec2<f32>(0.0)) + waves[0];
    out.position = textureSample(env, env_sampler, vec3<f32>(1.0));
    return out;
}
"#;

    #[test]
    fn reflects_bindings_and_outputs() {
        let (_, info) = reflect(OCEAN).unwrap();
        let block = info.uniforms.as_ref().unwrap();
        assert_eq!(block.fields["mvp"].offset, 0);
        assert_eq!(block.fields["normalMat"].kind, UniformKind::Mat3);
        assert_eq!(block.fields["camPos"].offset, 112);
        assert_eq!(block.fields["time"].offset, 124);
        assert_eq!(block.size, 144);
        assert_eq!(info.textures.get(&0), Some(&TextureBinding { cube: false }));
        assert_eq!(info.textures.get(&2), Some(&TextureBinding { cube: true }));
        assert!(info.samplers.contains(&2));
        assert!(info.buffers.contains(&0));
        assert!(info.has_vertex && info.has_fragment && !info.has_fullscreen);
        assert_eq!(info.fragment_outputs.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(info.max_group(), Some(BUFFER_GROUP));
    }

    #[test]
    fn writes_values_at_member_offsets() {
        let (_, info) = reflect(OCEAN).unwrap();
        let block = info.uniforms.unwrap();
        let mut data = vec![0u8; block.size as usize];

        assert!(block.write(&mut data, "time", 2.5f32.into()));
        assert_eq!(&data[124..128], &2.5f32.to_ne_bytes());

        assert!(block.write(&mut data, "camPos", Vec3::new(1.0, 2.0, 3.0).into()));
        let cam: &[f32] = bytemuck::cast_slice(&data[112..124]);
        assert_eq!(cam, &[1.0, 2.0, 3.0]);

        assert!(block.write(&mut data, "normalMat", Mat3::IDENTITY.into()));
        let col1: &[f32] = bytemuck::cast_slice(&data[80..96]);
        assert_eq!(col1, &[0.0, 1.0, 0.0, 0.0]);

        assert!(block.write(&mut data, "debugCol", true.into()));
        assert!(!block.write(&mut data, "time", Vec3::ZERO.into()));
        assert!(!block.write(&mut data, "missing", 1.0f32.into()));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = reflect("fn broken( {").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn requires_a_vertex_entry_point() {
        let err = reflect("@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }")
            .unwrap_err();
        assert!(err.contains(VERTEX_ENTRY));
    }

    #[test]
    fn rejects_foreign_binding_groups() {
        let src = "@group(3) @binding(0) var t: texture_2d<f32>;\n@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
        assert!(reflect(src).is_err());
    }
}
