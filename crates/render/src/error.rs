use tidewater_common::{BufferId, FramebufferId, MeshId, ProgramId, TextureId};

/// Errors raised while creating or driving GPU resources.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("missing {kind} asset '{name}'")]
    MissingAsset { kind: &'static str, name: String },

    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshId),

    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),

    #[error("unknown framebuffer {0:?}")]
    UnknownFramebuffer(FramebufferId),

    #[error("framebuffer {framebuffer:?} has no attachment {index}")]
    MissingAttachment {
        framebuffer: FramebufferId,
        index: usize,
    },

    #[error("data size mismatch for '{label}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },

    #[error("shader '{name}' failed to compile: {message}")]
    Shader { name: String, message: String },

    #[error(transparent)]
    Wave(#[from] tidewater_waves::WaveError),

    #[error("gpu backend error: {0}")]
    Backend(String),
}

impl RenderError {
    pub fn missing(kind: &'static str, name: impl Into<String>) -> Self {
        Self::MissingAsset {
            kind,
            name: name.into(),
        }
    }
}
