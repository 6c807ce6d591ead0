use anyhow::{Result, bail};
use filmgrade_core::config::RenderConfig;
use filmgrade_core::parity::{EmulatedShaderBackend, ParityReport, check_backend};
use filmgrade_core::{RenderBackend, ShaderDialect};
use filmgrade_gpu::ShaderBackend;

use super::{load_params, read_image};
use crate::ParityArgs;

fn dialect_backend(dialect: ShaderDialect, emulate: bool) -> Result<Box<dyn RenderBackend>> {
    if emulate {
        return Ok(Box::new(EmulatedShaderBackend::new(dialect)));
    }
    match ShaderBackend::new(dialect) {
        Ok(backend) => Ok(Box::new(backend)),
        Err(e) if e.is_unavailable() => {
            tracing::warn!(%dialect, error = %e, "GPU unavailable, comparing the CPU emulation");
            Ok(Box::new(EmulatedShaderBackend::new(dialect)))
        }
        Err(e) => Err(anyhow::Error::from(e)),
    }
}

pub fn run(args: ParityArgs, config: &RenderConfig) -> Result<()> {
    let params = load_params(&args.params, args.lut.as_deref(), config)?;
    let source = read_image(&args.input)?;

    let mut failures = Vec::new();
    for dialect in ShaderDialect::ALL {
        let mut backend = dialect_backend(dialect, args.emulate)?;
        let report: ParityReport = check_backend(backend.as_mut(), &params, &source)?;
        let verdict = if report.passes(config.parity_tolerance) {
            "ok"
        } else {
            failures.push(dialect);
            "FAIL"
        };
        println!("{dialect}: {report} [{verdict}]");
    }

    if !failures.is_empty() {
        let names: Vec<_> = failures.iter().map(|d| d.as_str()).collect();
        bail!(
            "{} exceeded the parity tolerance of {}",
            names.join(", "),
            config.parity_tolerance
        );
    }
    Ok(())
}

