//! Shared types for the tidewater engine.
//!
//! Everything here is plain data: GPU resources are referred to by opaque
//! handles, never by pointers into a backend's tables.

mod mesh;
mod texture;
mod types;

pub use mesh::{MeshData, Vertex};
pub use texture::{Descriptor, Filter, FramebufferDesc, Layout, TextureDesc, TextureShape, Wrap};
pub use types::{Aabb, BufferId, FramebufferId, MeshId, ProgramId, Resolution, TextureId};
