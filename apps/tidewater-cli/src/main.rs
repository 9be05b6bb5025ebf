use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use glam::Vec3;
use tidewater_render::{
    Camera, FrameStats, IslandConfig, IslandRenderer, RecordingGpu, headless_resources,
};
use tidewater_terrain::{Heightmap, ProceduralTerrain, TerrainParams, lit_fraction, shadow_mask};
use tidewater_waves::{WaveBank, WaveGenerator};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tidewater-cli", about = "Headless tools for the island renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Generate a wave bank and print it
    Waves {
        #[arg(short, long, default_value = "0")]
        seed: u64,
        /// Print the bank as JSON
        #[arg(long)]
        json: bool,
    },
    /// Config file utilities
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate an island heightmap and report its shadow coverage
    Terrain {
        #[arg(short, long, default_value = "4567")]
        seed: u32,
        #[arg(short, long, default_value = "256")]
        resolution: u32,
        /// Direction towards the sun
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        light: Option<Vec<f32>>,
    },
    /// Render frames on a recording backend and print what each frame did
    Frame {
        #[arg(short = 'n', long, default_value = "1")]
        frames: u32,
        /// YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the recorded GPU commands of the last frame
        #[arg(long)]
        trace: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Validate a YAML config file
    Check { file: PathBuf },
    /// Print the default config as YAML
    Default,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tidewater-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("waves: {} per bank", tidewater_waves::WAVE_COUNT);
            println!("render: {}", tidewater_render::crate_info());
            println!("terrain: {}", tidewater_terrain::crate_info());
        }
        Commands::Waves { seed, json } => {
            let bank = WaveBank::generate(&mut WaveGenerator::with_seed(seed));
            if json {
                println!("{}", serde_json::to_string_pretty(bank.waves())?);
            } else {
                println!("Wave bank: seed={seed}, active={}", bank.active_count());
                for (i, wave) in bank.waves().iter().enumerate() {
                    println!(
                        "  [{i}] A={:.4} Q={:.4} w={:.3} phi={:.3} angle={:.1}deg",
                        wave.amplitude(),
                        wave.steepness(),
                        wave.frequency(),
                        wave.phase(),
                        wave.angle().to_degrees()
                    );
                }
                println!(
                    "Horizontal displacement bound: {:.4}",
                    bank.total_displacement_factor()
                );
            }
        }
        Commands::Config { command } => match command {
            ConfigCommand::Check { file } => {
                let config = IslandConfig::load(&file)?;
                let rendering = config.rendering.rendering_resolution();
                println!(
                    "{}: OK, screen {}x{}, internal {}x{}",
                    file.display(),
                    config.rendering.screen_resolution.width,
                    config.rendering.screen_resolution.height,
                    rendering.width,
                    rendering.height
                );
            }
            ConfigCommand::Default => {
                print!("{}", serde_yaml::to_string(&IslandConfig::default())?);
            }
        },
        Commands::Terrain {
            seed,
            resolution,
            light,
        } => {
            let params = TerrainParams {
                resolution,
                seed,
                ..Default::default()
            };
            params.validate()?;
            let light = light
                .map(|v| Vec3::new(v[0], v[1], v[2]))
                .unwrap_or(IslandConfig::default().light_direction)
                .normalize_or_zero();
            let map = Heightmap::island(resolution, seed, &params.shape);
            let (min, max) = map.range();
            let mask = shadow_mask(&map, params.shadow_resolution, light, params.texel_size);
            println!("Heightmap {resolution}x{resolution}: seed={seed}, height {min:.3}..{max:.3}");
            println!(
                "Shadow {0}x{0}: light=({1:.3}, {2:.3}, {3:.3}), lit {4:.1}%",
                params.shadow_resolution,
                light.x,
                light.y,
                light.z,
                lit_fraction(&mask) * 100.0
            );
        }
        Commands::Frame {
            frames,
            config,
            trace,
        } => {
            let config = load_config(config.as_deref())?;
            let (stats, gpu) = run_frames(&config, frames)?;
            for (i, frame) in stats.iter().enumerate() {
                println!(
                    "frame {i}: t={:.3} passes={:?} cells={}/{} sky_regenerated={} underwater={}",
                    frame.time,
                    frame.passes,
                    frame.cells_drawn,
                    frame.cells_total,
                    frame.sky_regenerated,
                    frame.underwater
                );
            }
            println!(
                "{} commands, {} live allocations, {} skipped draws",
                gpu.commands().len(),
                gpu.live_allocations(),
                gpu.skipped_draws()
            );
            if trace {
                print!("{}", gpu.trace());
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<IslandConfig> {
    Ok(match path {
        Some(path) => IslandConfig::load(path)?,
        None => IslandConfig::default(),
    })
}

/// Renders `frames` frames at 60 Hz on a recording backend.
///
/// The recorder keeps only the commands of the last frame.
fn run_frames(config: &IslandConfig, frames: u32) -> anyhow::Result<(Vec<FrameStats>, RecordingGpu)> {
    let _span = tracing::info_span!("run_frames", frames).entered();
    let mut gpu = RecordingGpu::new();
    let mut resources = headless_resources();
    let terrain = ProceduralTerrain::new(
        &mut gpu,
        TerrainParams {
            resolution: config.terrain_resolution.min(256),
            seed: config.terrain_seed,
            shadow_resolution: 128,
            ..Default::default()
        },
    )?;
    let mut renderer =
        IslandRenderer::with_gaussian_blur(&mut gpu, &mut resources, Box::new(terrain), config)?;

    let camera = Camera::default();
    let mut stats = Vec::new();
    for frame in 0..frames {
        gpu.take_commands();
        stats.push(renderer.draw(&mut gpu, &camera, frame as f32 / 60.0));
    }
    Ok((stats, gpu))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_render::Pass;

    #[test]
    fn first_frame_generates_the_sky_once() {
        let (stats, _) = run_frames(&IslandConfig::default(), 2).unwrap();
        assert_eq!(stats.len(), 2);
        assert!(stats[0].sky_regenerated);
        assert!(!stats[1].sky_regenerated);
        assert!(stats[1].ran(Pass::Tonemap));
    }

    #[test]
    fn frame_flags_parse() {
        let cli = Cli::try_parse_from(["tidewater-cli", "frame", "-n", "3", "--trace"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Frame {
                frames: 3,
                trace: true,
                ..
            }
        ));
    }

    #[test]
    fn light_accepts_negative_components() {
        let cli = Cli::try_parse_from(["tidewater-cli", "terrain", "--light", "0.5", "0.5", "-1"])
            .unwrap();
        let Commands::Terrain { light, .. } = cli.command else {
            panic!("expected terrain command");
        };
        assert_eq!(light, Some(vec![0.5, 0.5, -1.0]));
    }
}
