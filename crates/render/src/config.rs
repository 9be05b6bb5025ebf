//! Renderer configuration, loadable from YAML.
//!
//! Every field has a default, so a config file only lists what it overrides.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tidewater_common::Resolution;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Window and internal resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Size of the presentation surface.
    pub screen_resolution: Resolution,
    /// Height of the offscreen targets; width follows the screen aspect ratio.
    /// `None` renders at screen resolution.
    pub internal_vertical_resolution: Option<u32>,
    pub vsync: bool,
    pub fullscreen: bool,
    /// Present every other vertical blank.
    pub half_rate: bool,
    /// Keep the window at the aspect ratio of `screen_resolution` when resized.
    pub force_aspect_ratio: bool,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            screen_resolution: Resolution::new(1280, 720),
            internal_vertical_resolution: None,
            vsync: true,
            fullscreen: false,
            half_rate: false,
            force_aspect_ratio: false,
        }
    }
}

impl RenderingConfig {
    /// Resolution of the offscreen scene targets.
    pub fn rendering_resolution(&self) -> Resolution {
        match self.internal_vertical_resolution {
            Some(height) if height > 0 => {
                let width = (height as f32 * self.screen_resolution.aspect_ratio()).round() as u32;
                Resolution::new(width.max(1), height)
            }
            _ => self.screen_resolution,
        }
    }

    /// Applies command-line settings on top of the loaded values.
    pub fn apply(&mut self, overrides: &RenderingOverrides) {
        if let Some((width, height)) = overrides.wxh {
            self.screen_resolution = Resolution::new(width, height);
        }
        if let Some(height) = overrides.internal_vertical_resolution {
            self.internal_vertical_resolution = Some(height);
        }
        self.vsync &= !overrides.no_vsync;
        self.fullscreen |= overrides.fullscreen;
        self.half_rate |= overrides.half_rate;
        self.force_aspect_ratio |= overrides.force_aspect_ratio;
    }

    /// Window size that keeps the configured aspect ratio for a requested size.
    ///
    /// The requested width is kept. Returns `None` when no correction is needed.
    pub fn constrain_window(&self, requested: Resolution) -> Option<Resolution> {
        if !self.force_aspect_ratio || requested.width == 0 {
            return None;
        }
        let height = (requested.width as f32 / self.screen_resolution.aspect_ratio()).round() as u32;
        let height = height.max(1);
        (height != requested.height).then_some(Resolution::new(requested.width, height))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Resolution { width, height } = self.screen_resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "screen resolution {width}x{height} has a zero dimension"
            )));
        }
        if self.internal_vertical_resolution == Some(0) {
            return Err(ConfigError::Invalid(
                "internal vertical resolution must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Settings given on the command line, applied over a loaded config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderingOverrides {
    pub wxh: Option<(u32, u32)>,
    pub internal_vertical_resolution: Option<u32>,
    pub no_vsync: bool,
    pub fullscreen: bool,
    pub half_rate: bool,
    pub force_aspect_ratio: bool,
}

/// Per-pass switches, editable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToggles {
    pub terrain: bool,
    pub ocean: bool,
    pub sky: bool,
    /// Overlay edges on terrain and ocean draws.
    pub wireframe: bool,
    /// Freeze the animation clock.
    pub stop_time: bool,
}

impl Default for RenderToggles {
    fn default() -> Self {
        Self {
            terrain: true,
            ocean: true,
            sky: true,
            wireframe: false,
            stop_time: false,
        }
    }
}

/// Ocean tessellation controls passed to the ocean programs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TessellationParams {
    pub max_level_x: f32,
    pub max_level_y: f32,
    pub distance_scale: f32,
}

impl TessellationParams {
    /// Defaults tuned for a 1920 pixel wide target, scaled for `width`.
    pub fn for_width(width: u32) -> Self {
        let width = width.max(1) as f32;
        Self {
            max_level_x: 128f32.log2(),
            max_level_y: 128.0,
            distance_scale: 1.0 / (width / 1920.0) * 6.0,
        }
    }
}

/// Everything needed to set up the island scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandConfig {
    pub rendering: RenderingConfig,
    pub toggles: RenderToggles,
    /// Overrides the width-derived defaults when set.
    pub tessellation: Option<TessellationParams>,
    /// Direction towards the sun; normalized on use.
    pub light_direction: Vec3,
    pub wave_seed: u64,
    pub terrain_resolution: u32,
    pub terrain_seed: u32,
    /// Quads per side of the tessellated ocean grid.
    pub ocean_grid_resolution: u32,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            rendering: RenderingConfig::default(),
            toggles: RenderToggles::default(),
            tessellation: None,
            light_direction: Vec3::new(0.437, 0.482, -0.896),
            wave_seed: 0,
            terrain_resolution: 1024,
            terrain_seed: 4567,
            ocean_grid_resolution: 128,
        }
    }
}

impl IslandConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rendering.validate()?;
        if self.light_direction.length_squared() <= f32::EPSILON {
            return Err(ConfigError::Invalid("light direction is zero".into()));
        }
        if self.ocean_grid_resolution < 4 {
            return Err(ConfigError::Invalid(format!(
                "ocean grid resolution {} is below 4",
                self.ocean_grid_resolution
            )));
        }
        if !self.terrain_resolution.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "terrain resolution {} is not a power of two",
                self.terrain_resolution
            )));
        }
        Ok(())
    }

    /// Tessellation parameters, derived from the rendering width unless overridden.
    pub fn tessellation(&self) -> TessellationParams {
        self.tessellation.unwrap_or_else(|| {
            TessellationParams::for_width(self.rendering.rendering_resolution().width)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_resolution_follows_aspect() {
        let mut cfg = RenderingConfig {
            screen_resolution: Resolution::new(1920, 1080),
            ..Default::default()
        };
        assert_eq!(cfg.rendering_resolution(), Resolution::new(1920, 1080));
        cfg.internal_vertical_resolution = Some(720);
        assert_eq!(cfg.rendering_resolution(), Resolution::new(1280, 720));
    }

    #[test]
    fn overrides_apply_over_file_values() {
        let mut cfg = RenderingConfig {
            internal_vertical_resolution: Some(540),
            ..Default::default()
        };
        cfg.apply(&RenderingOverrides {
            wxh: Some((1920, 1080)),
            no_vsync: true,
            ..Default::default()
        });
        assert_eq!(cfg.screen_resolution, Resolution::new(1920, 1080));
        assert_eq!(cfg.internal_vertical_resolution, Some(540));
        assert!(!cfg.vsync);
        assert!(!cfg.fullscreen);
    }

    #[test]
    fn forced_aspect_ratio_corrects_height() {
        let mut cfg = RenderingConfig::default();
        assert_eq!(cfg.constrain_window(Resolution::new(1000, 1000)), None);
        cfg.force_aspect_ratio = true;
        assert_eq!(
            cfg.constrain_window(Resolution::new(1920, 1000)),
            Some(Resolution::new(1920, 1080))
        );
        assert_eq!(cfg.constrain_window(Resolution::new(640, 360)), None);
    }

    #[test]
    fn tessellation_scales_with_width() {
        let full = TessellationParams::for_width(1920);
        assert_eq!(full.max_level_x, 7.0);
        assert_eq!(full.max_level_y, 128.0);
        assert!((full.distance_scale - 6.0).abs() < 1e-6);
        let half = TessellationParams::for_width(960);
        assert!((half.distance_scale - 12.0).abs() < 1e-5);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let cfg = IslandConfig::from_yaml_str(
            "rendering:\n  screen_resolution: { width: 800, height: 600 }\ntoggles:\n  wireframe: true\n",
        )
        .unwrap();
        assert_eq!(cfg.rendering.screen_resolution, Resolution::new(800, 600));
        assert!(cfg.rendering.vsync);
        assert!(cfg.toggles.wireframe);
        assert!(cfg.toggles.ocean);
        assert_eq!(cfg.terrain_seed, 4567);
    }

    #[test]
    fn zero_resolution_rejected() {
        let err = IslandConfig::from_yaml_str(
            "rendering:\n  screen_resolution: { width: 0, height: 600 }\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = IslandConfig::from_yaml_str("rendering: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("island.yaml");
        let cfg = IslandConfig {
            wave_seed: 42,
            tessellation: Some(TessellationParams::for_width(1280)),
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        let loaded = IslandConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = IslandConfig::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn explicit_tessellation_overrides_width() {
        let cfg = IslandConfig {
            tessellation: Some(TessellationParams {
                max_level_x: 3.0,
                max_level_y: 16.0,
                distance_scale: 1.0,
            }),
            ..Default::default()
        };
        assert_eq!(cfg.tessellation().max_level_y, 16.0);
        assert!((IslandConfig::default().tessellation().distance_scale - 9.0).abs() < 1e-5);
    }
}
