use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use filmgrade_core::Lut3D;
use filmgrade_core::lut_file::read_lut;
use filmgrade_core::lut_invert::{InversionReport, verify_inversion};

use crate::{InvertArgs, LutCommand};

/// Round-trip samples checked by `--verify`.
const VERIFY_SAMPLES: usize = 100;

pub fn run(command: LutCommand) -> Result<()> {
    match command {
        LutCommand::Invert(args) => invert(args),
    }
}

fn invert(args: InvertArgs) -> Result<()> {
    let lut = read_lut(&args.input)
        .with_context(|| format!("reading LUT {}", args.input.display()))?;
    let size = args.size.unwrap_or(lut.size);

    let start = Instant::now();
    let inverse = lut
        .invert(size)
        .with_context(|| format!("inverting {}", args.input.display()))?;
    tracing::info!(
        input_size = lut.size,
        output_size = size,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "inverted LUT"
    );

    inverse
        .write_cube(&args.output, Some(&inverted_title(&args.input)))
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("{} -> {}", args.input.display(), args.output.display());

    if args.verify {
        print_report(&check_round_trip(&lut, &inverse));
    }
    Ok(())
}

fn check_round_trip(lut: &Lut3D, inverse: &Lut3D) -> InversionReport {
    verify_inversion(lut, inverse, VERIFY_SAMPLES)
}

fn print_report(report: &InversionReport) {
    println!("round trip over {} samples:", report.samples);
    println!("  mean error: {:.6}", report.mean);
    println!("  max error:  {:.6}", report.max);
    println!("  min error:  {:.6}", report.min);
    println!("  quality:    {}", report.quality());
}

fn inverted_title(input: &Path) -> String {
    match input.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => format!("{stem} (Inverted)"),
        None => "Inverted LUT".to_string(),
    }
}
