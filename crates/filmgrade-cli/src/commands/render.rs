use std::time::Instant;

use anyhow::{Context, Result};
use filmgrade_core::RenderBackend;
use filmgrade_core::config::RenderConfig;
use filmgrade_gpu::Backend;

use super::{load_params, read_image, write_image};
use crate::RenderArgs;

pub fn run(args: RenderArgs, config: &RenderConfig) -> Result<()> {
    let params = load_params(&args.params, args.lut.as_deref(), config)?;
    let source = read_image(&args.input)?;

    let kind = args.backend.unwrap_or(config.backend);
    let mut backend = Backend::create(kind).context("creating backend")?;

    let start = Instant::now();
    let rendered = backend
        .render(&params, &source)
        .with_context(|| format!("rendering {}", args.input.display()))?;
    tracing::info!(
        backend = %backend.kind(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "rendered"
    );

    write_image(&args.output, &rendered)?;
    println!("{} -> {}", args.input.display(), args.output.display());
    Ok(())
}
