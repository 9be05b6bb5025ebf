//! wgpu backend for the island renderer.
//!
//! Implements [`tidewater_render::GpuBackend`] on a wgpu device, plus a fly
//! camera for interactive viewers.
//!
//! # Invariants
//! - Recorded work is submitted in the order it was issued, queue writes included.
//! - Framebuffer attachment handles survive resizes.
//! - Draws that cannot be executed are logged once and skipped.

mod backend;
mod camera;
mod formats;
mod reflect;
mod shaders;

pub use backend::WgpuBackend;
pub use camera::FlyCamera;
pub use reflect::{ProgramInfo, UniformBlock, reflect};
pub use shaders::complete_source;

/// Device features the backend uses when the adapter offers them.
pub fn optional_features() -> wgpu::Features {
    wgpu::Features::FLOAT32_FILTERABLE
        | wgpu::Features::POLYGON_MODE_LINE
        | wgpu::Features::POLYGON_MODE_POINT
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no compatible GPU adapter")]
    NoAdapter,
    #[error(transparent)]
    Device(#[from] wgpu::RequestDeviceError),
}

impl From<BackendError> for tidewater_render::RenderError {
    fn from(e: BackendError) -> Self {
        tidewater_render::RenderError::Backend(e.to_string())
    }
}

/// Requests a device with every optional feature the adapter supports.
pub async fn request_device<'a>(
    instance: &wgpu::Instance,
    surface: Option<&'a wgpu::Surface<'a>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), BackendError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(BackendError::NoAdapter)?;
    let features = adapter.features() & optional_features();
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("tidewater_device"),
                required_features: features,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;
    tracing::info!(
        backend = adapter.get_info().backend.to_str(),
        ?features,
        "GPU device ready"
    );
    Ok((adapter, device, queue))
}

pub fn crate_info() -> &'static str {
    "tidewater-render-wgpu v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert_eq!(crate_info(), "tidewater-render-wgpu v0.1.0");
    }

    #[test]
    fn optional_features_include_line_mode() {
        assert!(optional_features().contains(wgpu::Features::POLYGON_MODE_LINE));
    }
}
