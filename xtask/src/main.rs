use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for tidewater")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy and tests
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Run the benchmark binaries
    Bench,
    /// Build rustdoc for the workspace
    Doc,
    /// Parse and reflect every island program in an asset directory
    Shaders {
        #[arg(default_value = "./assets")]
        assets: PathBuf,
    },
}

/// Crates and their bench targets.
const BENCHES: [(&str, &str); 3] = [
    ("tidewater-waves", "bench_wave_generation"),
    ("tidewater-terrain", "bench_terrain"),
    ("tidewater-render", "bench_frame"),
];

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt", &["fmt", "--all", "--", "--check"])?;
            clippy()?;
            cargo("test", &["test", "--workspace"])?;
        }
        Commands::Fmt => cargo("fmt", &["fmt", "--all", "--", "--check"])?,
        Commands::Clippy => clippy()?,
        Commands::Test => cargo("test", &["test", "--workspace"])?,
        Commands::Bench => {
            for (package, bench) in BENCHES {
                cargo(
                    &format!("bench {bench}"),
                    &["bench", "-p", package, "--bench", bench],
                )?;
            }
        }
        Commands::Doc => cargo("doc", &["doc", "--workspace", "--no-deps"])?,
        Commands::Shaders { assets } => check_shaders(&assets)?,
    }

    Ok(())
}

fn cargo(what: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {what}");
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        bail!("cargo {what} failed");
    }
    Ok(())
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn check_shaders(assets: &Path) -> Result<()> {
    println!("==> Reflecting programs in {}", assets.display());
    let mut failures = 0;
    for name in tidewater_render::PROGRAM_ASSETS {
        let path = assets.join("shaders").join(format!("{name}.wgsl"));
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        match tidewater_render_wgpu::reflect(&tidewater_render_wgpu::complete_source(&source)) {
            Ok((_, info)) => println!(
                "{name}: {} uniform bytes, {} textures, {} buffers, {} outputs",
                info.uniforms.as_ref().map_or(0, |u| u.size),
                info.textures.len(),
                info.buffers.len(),
                info.fragment_outputs.len()
            ),
            Err(e) => {
                failures += 1;
                eprintln!("{name}: {e}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} program(s) failed to reflect");
    }
    Ok(())
}
