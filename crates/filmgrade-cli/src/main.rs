//! filmgrade - render film scans through the grading pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use filmgrade_core::BackendKind;
use filmgrade_core::config::RenderConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "filmgrade")]
#[command(version, about = "Film scan grading pipeline")]
#[command(long_about = "
Renders film scans through the grading pipeline on the CPU or on the GPU.

Examples:
  filmgrade render scan.tif out.tif --params look.json
  filmgrade render scan.tif out.tif --params look.json --lut film.cube --backend gen2
  filmgrade batch scans/ graded/ --params look.json --checkpoint graded/.done.json
  filmgrade shader --dialect gen1 > gen1.wgsl
  filmgrade parity scan.tif --params look.json
  filmgrade lut invert film.cube film_inverse.cube --size 33 --verify
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Render config JSON; FILMGRADE_* variables still override it
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one image
    Render(RenderArgs),

    /// Render every image in a directory with shared parameters
    Batch(BatchArgs),

    /// Print the generated WGSL for a dialect
    Shader(ShaderArgs),

    /// Compare both shader dialects against the CPU reference
    Parity(ParityArgs),

    /// 3D LUT tools
    #[command(subcommand)]
    Lut(LutCommand),
}

#[derive(Args)]
struct RenderArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Grading parameters JSON
    #[arg(short, long, value_name = "FILE")]
    params: PathBuf,

    /// 3D LUT (.cube or mesh-list); replaces any LUT in the parameters
    #[arg(short, long, value_name = "FILE")]
    lut: Option<PathBuf>,

    /// Backend: cpu, gen1 or gen2 (defaults to the config)
    #[arg(short, long)]
    backend: Option<BackendKind>,
}

#[derive(Args)]
struct BatchArgs {
    /// Directory of input images
    input_dir: PathBuf,

    /// Output directory
    output_dir: PathBuf,

    /// Grading parameters JSON
    #[arg(short, long, value_name = "FILE")]
    params: PathBuf,

    /// 3D LUT applied to every photo
    #[arg(short, long, value_name = "FILE")]
    lut: Option<PathBuf>,

    /// Checkpoint file; finished photos are skipped on the next run
    #[arg(long, value_name = "FILE")]
    checkpoint: Option<PathBuf>,

    /// Backend: cpu, gen1 or gen2 (defaults to the config)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Worker threads (0 = one per core; defaults to the config)
    #[arg(short = 'j', long)]
    workers: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Gen1,
    Gen2,
}

#[derive(Args)]
struct ShaderArgs {
    /// Shader dialect to generate
    #[arg(short, long, value_enum)]
    dialect: DialectArg,
}

#[derive(Args)]
struct ParityArgs {
    /// Input image
    input: PathBuf,

    /// Grading parameters JSON
    #[arg(short, long, value_name = "FILE")]
    params: PathBuf,

    /// 3D LUT (.cube or mesh-list)
    #[arg(short, long, value_name = "FILE")]
    lut: Option<PathBuf>,

    /// Compare CPU emulations of the dialects instead of the GPU
    #[arg(long)]
    emulate: bool,
}

#[derive(Subcommand)]
enum LutCommand {
    /// Write the inverse of a LUT as .cube
    Invert(InvertArgs),
}

#[derive(Args)]
struct InvertArgs {
    /// LUT to invert (.cube or mesh-list)
    input: PathBuf,

    /// Output .cube file
    output: PathBuf,

    /// Output grid size (defaults to the input size)
    #[arg(short, long)]
    size: Option<u32>,

    /// Report round-trip error after writing
    #[arg(long)]
    verify: bool,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info,filmgrade_core=debug,filmgrade_gpu=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => RenderConfig::from_env().context("reading FILMGRADE_* environment"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Render(args) => commands::render::run(args, &config),
        Commands::Batch(args) => commands::batch::run(args, &config),
        Commands::Shader(args) => commands::shader::run(args),
        Commands::Parity(args) => commands::parity::run(args, &config),
        Commands::Lut(command) => commands::lut::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_args_parse() {
        let cli = Cli::try_parse_from([
            "filmgrade", "render", "in.tif", "out.tif", "--params", "p.json", "--backend", "gen2",
        ])
        .expect("valid args");
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.backend, Some(BackendKind::Gen2Shader));
        assert!(args.lut.is_none());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Cli::try_parse_from([
            "filmgrade", "render", "in.tif", "out.tif", "--params", "p.json", "--backend", "metal",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_lut_invert_args_parse() {
        let cli = Cli::try_parse_from([
            "filmgrade", "lut", "invert", "a.cube", "b.cube", "--size", "33", "--verify",
        ])
        .expect("valid args");
        let Commands::Lut(LutCommand::Invert(args)) = cli.command else {
            panic!("expected lut invert");
        };
        assert_eq!(args.size, Some(33));
        assert!(args.verify);
        assert_eq!(args.output, PathBuf::from("b.cube"));
    }

    #[test]
    fn test_global_verbose_counts() {
        let cli = Cli::try_parse_from(["filmgrade", "-vv", "shader", "--dialect", "gen1"])
            .expect("valid args");
        assert_eq!(cli.verbose, 2);
    }
}
