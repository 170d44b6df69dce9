//! skiroute CLI - cost surfaces for ski-tour least-cost routing

mod io;
mod manifest;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use skiroute_core::Raster;
use skiroute_cost::hazard::{avalanche_hazard, HazardParams};
use skiroute_cost::{CostSurfaceConfig, CostSurfacePipeline, FeatureMask, PipelineInputs};

use crate::manifest::RunManifest;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "skiroute")]
#[command(author, version, about = "Terrain cost surfaces for ski-tour routing", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a cost surface from a run manifest
    Build {
        /// Run manifest (JSON): rasters, masks and cost_surface configuration
        manifest: PathBuf,
        /// Output cost surface (8-bit GeoTIFF)
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the float grids of every stage into this directory
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Check that rasters share one reference grid with the first
    Validate {
        /// Raster files; the first is the reference
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
    },
    /// Prepare the avalanche hazard layer from release areas and runout
    Hazard {
        /// Runout travel angle raster
        travel_angle: PathBuf,
        /// Potential release area likelihood raster
        pra_raw: PathBuf,
        /// Potential release area mask raster
        pra_binary: PathBuf,
        /// Output hazard layer (float GeoTIFF)
        #[arg(short, long)]
        output: PathBuf,
        /// Hazard parameters (JSON); omitted fields keep their defaults
        #[arg(long)]
        params: Option<PathBuf>,
    },
    /// Print the default cost-surface configuration as JSON
    DefaultConfig,
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f32>> {
    let pb = spinner(&format!("Reading {}...", path.display()));
    let raster = io::read_grid(path)?;
    pb.finish_and_clear();
    debug!("{}: {} x {}", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

fn read_mask(path: &Path) -> Result<FeatureMask> {
    Ok(FeatureMask::from_raster(&read_raster(path)?))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn build(manifest_path: &Path, output: &Path, debug_dir: Option<&Path>) -> Result<()> {
    let manifest = RunManifest::load(manifest_path)?;
    let pipeline = CostSurfacePipeline::new(manifest.config()?)?;

    let mut inputs = PipelineInputs::new();
    for (&layer, path) in &manifest.rasters {
        inputs = inputs.with_raw(layer, read_raster(path)?);
    }
    for (&layer, path) in &manifest.masks {
        inputs = inputs.with_mask(layer, read_mask(path)?);
    }

    let start = Instant::now();
    let (surface, stages) = pipeline
        .run_with_intermediates(&inputs)
        .context("Failed to build cost surface")?;
    let elapsed = start.elapsed();

    let pb = spinner("Writing output...");
    io::write_u8(surface.raster(), output)?;
    pb.finish_and_clear();

    if let Some(dir) = debug_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create debug directory {}", dir.display()))?;
        for (layer, grid) in &stages.unit_costs {
            io::write_f32(grid, &dir.join(format!("cost_{}.tif", layer)))?;
        }
        io::write_f32(&stages.terrain, &dir.join("terrain.tif"))?;
        io::write_f32(&stages.with_barriers, &dir.join("with_barriers.tif"))?;
        io::write_f32(&stages.with_reductions, &dir.join("with_reductions.tif"))?;
        info!("Stage grids written to {}", dir.display());
    }

    let stats = surface.statistics();
    if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
        info!("Cost codes: min {} max {} mean {:.2}", min, max, mean);
    }
    info!("Nodata cells: {}", surface.nodata_count());
    done("Cost surface", output, elapsed);
    Ok(())
}

fn validate(files: &[PathBuf]) -> Result<bool> {
    let (first, rest) = files.split_first().context("No files given")?;
    let reference = read_raster(first)?.reference_grid();
    println!("Reference: {}", first.display());

    let mut all_passed = true;
    for path in rest {
        let grid = read_raster(path)?.reference_grid();
        println!("{}", path.display());
        for result in report::compare(&reference, &grid) {
            let status = if result.passed { "PASS" } else { "FAIL" };
            println!("  {:<9} {}  {}", result.check, status, result.detail);
            all_passed &= result.passed;
        }
    }
    Ok(all_passed)
}

fn hazard(
    travel_angle: &Path,
    pra_raw: &Path,
    pra_binary: &Path,
    output: &Path,
    params: Option<&Path>,
) -> Result<()> {
    let params = match params {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            serde_json::from_str::<HazardParams>(&text)
                .with_context(|| format!("Invalid hazard parameters {}", path.display()))?
        }
        None => HazardParams::default(),
    };

    let ta = read_raster(travel_angle)?;
    let pra = read_raster(pra_raw)?;
    let release = read_mask(pra_binary)?;

    let start = Instant::now();
    let layer = avalanche_hazard(&ta, &pra, &release, &params)
        .context("Failed to build avalanche hazard layer")?;
    let elapsed = start.elapsed();

    let pb = spinner("Writing output...");
    io::write_f32(&layer, output)?;
    pb.finish_and_clear();
    done("Avalanche hazard", output, elapsed);
    Ok(())
}

fn info_cmd(input: &Path) -> Result<()> {
    let raster = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
    );
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            manifest,
            output,
            debug_dir,
        } => build(&manifest, &output, debug_dir.as_deref())?,

        Commands::Validate { files } => {
            if !validate(&files)? {
                eprintln!("Inputs are not co-registered");
                return Ok(ExitCode::FAILURE);
            }
            println!("All inputs share one reference grid");
        }

        Commands::Hazard {
            travel_angle,
            pra_raw,
            pra_binary,
            output,
            params,
        } => hazard(&travel_angle, &pra_raw, &pra_binary, &output, params.as_deref())?,

        Commands::DefaultConfig => {
            println!("{}", CostSurfaceConfig::default().to_json_pretty()?);
        }

        Commands::Info { input } => info_cmd(&input)?,
    }

    Ok(ExitCode::SUCCESS)
}
