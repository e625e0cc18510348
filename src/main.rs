//! `netra` CLI - enhance underwater imagery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use image::{DynamicImage, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netra::{Config, EnhancementMode, Enhancer};

/// Restore color and contrast in underwater images.
#[derive(Parser, Debug)]
#[command(name = "netra")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory containing the model files.
    #[arg(long, global = true, env = "NETRA_MODEL_DIR", value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Generator weights (overrides the file in the model directory).
    #[arg(long, global = true, env = "NETRA_GENERATOR", value_name = "FILE")]
    generator: Option<PathBuf>,

    /// Super-resolution ONNX model (overrides the file in the model directory).
    #[arg(long, global = true, env = "NETRA_UPSCALER", value_name = "FILE")]
    upscaler: Option<PathBuf>,

    /// Output JPEG quality (1-100).
    #[arg(short, long, global = true, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enhance a single image.
    Enhance {
        /// Input image path.
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output image path.
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        options: EnhanceOptions,
    },

    /// Enhance many images into a directory.
    Batch {
        /// Input image paths.
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (created if missing).
        #[arg(short, long, value_name = "DIR")]
        out_dir: PathBuf,

        #[command(flatten)]
        options: EnhanceOptions,
    },

    /// Load the generator and run it on a blank frame.
    Check,

    /// Print a clarity score for each image.
    Score {
        /// Image paths.
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct EnhanceOptions {
    /// Post-processing mode.
    #[arg(short, long, value_enum, default_value_t = Mode::Normal)]
    mode: Mode,

    /// Run the ×4 super-resolution model before the final resize.
    #[arg(long)]
    super_resolution: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Normal,
    Thermal,
}

impl From<Mode> for EnhancementMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Normal => Self::Normal,
            Mode::Thermal => Self::Thermal,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("netra={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args);
    config.validate().context("Invalid configuration")?;

    match &args.command {
        Command::Enhance {
            input,
            output,
            options,
        } => {
            let enhancer = load_enhancer(&config)?;
            enhance_file(&enhancer, input, output, *options, config.output_quality)?;
            println!(
                "Successfully enhanced {} -> {}",
                input.display(),
                output.display()
            );
        }
        Command::Batch {
            inputs,
            out_dir,
            options,
        } => {
            let enhancer = load_enhancer(&config)?;
            run_batch(&enhancer, inputs, out_dir, *options, config.output_quality)?;
        }
        Command::Check => run_check(&config)?,
        Command::Score { inputs } => {
            for input in inputs {
                let image = netra::image::load_image(input)?;
                let score = netra::pipeline::clarity_score(&image);
                println!("{}\t{score:.4}", input.display());
            }
        }
    }

    Ok(())
}

fn build_config(args: &Args) -> Config {
    let defaults = Config::default();
    Config {
        model_dir: args.model_dir.clone().unwrap_or(defaults.model_dir),
        generator_file: args.generator.clone(),
        upscaler_file: args.upscaler.clone(),
        output_quality: args.quality,
    }
}

fn load_enhancer(config: &Config) -> Result<Enhancer> {
    let enhancer = Enhancer::load(config);
    if !enhancer.is_model_loaded() {
        anyhow::bail!(
            "Enhancement model is not loaded: {}",
            enhancer.load_error().unwrap_or("unknown reason")
        );
    }
    Ok(enhancer)
}

fn enhance_file(
    enhancer: &Enhancer,
    input: &Path,
    output: &Path,
    options: EnhanceOptions,
    quality: u8,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let image = netra::image::load_image(input)?;
    let enhanced = enhancer
        .enhance(&image, options.mode.into(), options.super_resolution)
        .with_context(|| format!("Failed to enhance {}", input.display()))?;
    netra::image::save_image(&enhanced, output, quality)?;

    Ok(())
}

fn run_batch(
    enhancer: &Enhancer,
    inputs: &[PathBuf],
    out_dir: &Path,
    options: EnhanceOptions,
    quality: u8,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Enhancing [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut taken = HashSet::new();
    let mut failed = 0usize;
    for input in inputs {
        let output = batch_output_path(out_dir, input, &mut taken);
        if let Err(err) = enhance_file(enhancer, input, &output, options, quality) {
            failed += 1;
            pb.suspend(|| tracing::warn!("Skipping {}: {err:#}", input.display()));
        }
        pb.inc(1);
    }

    pb.finish_with_message("Batch complete");

    let succeeded = inputs.len() - failed;
    println!(
        "Enhanced {succeeded}/{} images into {}",
        inputs.len(),
        out_dir.display()
    );

    if succeeded == 0 {
        anyhow::bail!("No images were enhanced");
    }
    Ok(())
}

/// `<out_dir>/<stem>_enhanced.<ext>`, keeping the input extension (PNG if none).
///
/// Inputs sharing a stem get `_2`, `_3`, ... suffixes instead of overwriting
/// each other.
fn batch_output_path(out_dir: &Path, input: &Path, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png");

    let mut output = out_dir.join(format!("{stem}_enhanced.{extension}"));
    let mut n = 2;
    while !taken.insert(output.clone()) {
        output = out_dir.join(format!("{stem}_enhanced_{n}.{extension}"));
        n += 1;
    }
    output
}

fn run_check(config: &Config) -> Result<()> {
    tracing::info!("[1/3] Loading generator from {}", config.generator_path().display());
    let enhancer = load_enhancer(config)?;
    tracing::info!("[1/3] Generator loaded");

    tracing::info!("[2/3] Enhancing a blank 256x256 frame");
    let blank = DynamicImage::ImageRgb8(RgbImage::new(256, 256));
    let enhanced = enhancer
        .enhance(&blank, EnhancementMode::Normal, false)
        .context("Enhancement of the blank frame failed")?;
    if enhanced.dimensions() != (256, 256) {
        anyhow::bail!(
            "Enhanced frame has the wrong size: {}x{}",
            enhanced.width(),
            enhanced.height()
        );
    }
    tracing::info!("[2/3] Enhancement ran");

    if enhancer.has_super_resolution() {
        tracing::info!("[3/3] Super-resolution model loaded");
    } else {
        tracing::info!("[3/3] Super-resolution model not loaded; the SR path is disabled");
    }

    println!("Model check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_output_names() {
        let mut taken = HashSet::new();
        let out = Path::new("out");

        assert_eq!(
            batch_output_path(out, Path::new("dives/reef.jpg"), &mut taken),
            PathBuf::from("out/reef_enhanced.jpg")
        );
        assert_eq!(
            batch_output_path(out, Path::new("frame"), &mut taken),
            PathBuf::from("out/frame_enhanced.png")
        );
    }

    #[test]
    fn test_batch_output_names_do_not_collide() {
        let mut taken = HashSet::new();
        let out = Path::new("out");

        let first = batch_output_path(out, Path::new("a/reef.jpg"), &mut taken);
        let second = batch_output_path(out, Path::new("b/reef.jpg"), &mut taken);
        let third = batch_output_path(out, Path::new("c/reef.jpg"), &mut taken);

        assert_eq!(first, PathBuf::from("out/reef_enhanced.jpg"));
        assert_eq!(second, PathBuf::from("out/reef_enhanced_2.jpg"));
        assert_eq!(third, PathBuf::from("out/reef_enhanced_3.jpg"));
    }
}
