//! Directory batch export on top of the core batch renderer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use filmgrade_core::batch::{
    BatchCheckpoint, BatchError, BatchJob, BatchRenderer, CancelToken, PhotoSink, PhotoSource,
};
use filmgrade_core::config::RenderConfig;
use filmgrade_core::{BackendKind, CpuBackend, PixelBuffer, RenderBackend};
use filmgrade_gpu::Backend;

use super::{load_params, read_image, write_image};
use crate::BatchArgs;

const IMAGE_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg", "exr"];

/// Photo ids are file names inside one directory.
struct DirSource {
    dir: PathBuf,
}

impl PhotoSource for DirSource {
    fn load(&self, id: &str) -> Result<PixelBuffer, BatchError> {
        read_image(&self.dir.join(id)).map_err(|e| BatchError::Load {
            id: id.to_string(),
            reason: format!("{e:#}"),
        })
    }
}

struct DirSink {
    dir: PathBuf,
}

impl PhotoSink for DirSink {
    fn store(&self, id: &str, image: &PixelBuffer) -> Result<(), BatchError> {
        write_image(&self.dir.join(id), image).map_err(|e| BatchError::Store {
            id: id.to_string(),
            reason: format!("{e:#}"),
        })
    }
}

/// Supported image file names in `dir`, sorted.
fn list_photos(dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)));
        if let (true, Some(name)) = (supported, path.file_name().and_then(|n| n.to_str())) {
            ids.push(name.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

fn worker_backend(kind: BackendKind) -> Box<dyn RenderBackend> {
    match Backend::create(kind) {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            tracing::warn!(requested = %kind, error = %e, "backend failed, worker uses CPU");
            Box::new(CpuBackend::new())
        }
    }
}

pub fn run(args: BatchArgs, config: &RenderConfig) -> Result<()> {
    let params = load_params(&args.params, args.lut.as_deref(), config)?;
    let ids = list_photos(&args.input_dir)?;
    if ids.is_empty() {
        bail!(
            "no supported images in {} (supported: {})",
            args.input_dir.display(),
            IMAGE_EXTENSIONS.join(", ")
        );
    }
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let checkpoint = match &args.checkpoint {
        Some(path) => BatchCheckpoint::open(path)
            .with_context(|| format!("opening checkpoint {}", path.display()))?,
        None => BatchCheckpoint::in_memory(),
    };
    let jobs: Vec<BatchJob> = ids
        .into_iter()
        .map(|id| BatchJob {
            id,
            params: params.clone(),
        })
        .collect();

    let kind = args.backend.unwrap_or(config.backend);
    let workers = args.workers.unwrap_or(config.batch_workers);
    let renderer = BatchRenderer::new(move || worker_backend(kind), workers);
    let source = DirSource {
        dir: args.input_dir.clone(),
    };
    let sink = DirSink {
        dir: args.output_dir.clone(),
    };
    let report = renderer.run(&jobs, &source, &sink, &checkpoint, &CancelToken::new())?;

    println!(
        "{} rendered, {} skipped, {} failed",
        report.rendered.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (id, reason) in &report.failed {
        eprintln!("  {id}: {reason}");
    }
    if !report.is_complete() {
        bail!("{} of {} photos failed", report.failed.len(), report.total());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_photos_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["b.png", "a.TIF", "notes.txt", "c.jpeg"] {
            std::fs::write(dir.path().join(name), b"").expect("write");
        }
        std::fs::create_dir(dir.path().join("sub.png")).expect("mkdir");
        let ids = list_photos(dir.path()).expect("listing");
        assert_eq!(ids, vec!["a.TIF", "b.png", "c.jpeg"]);
    }

    #[test]
    fn test_dir_source_and_sink_keep_8bit_codes() {
        let input = tempfile::tempdir().expect("temp dir");
        let output = tempfile::tempdir().expect("temp dir");
        let buffer = PixelBuffer::from_u8(2, 1, &[10, 20, 30, 200, 150, 100]).expect("shape");
        write_image(&input.path().join("scan.png"), &buffer).expect("write");

        let source = DirSource {
            dir: input.path().to_path_buf(),
        };
        let sink = DirSink {
            dir: output.path().to_path_buf(),
        };
        let loaded = source.load("scan.png").expect("load");
        assert_eq!(loaded.to_u8(), buffer.to_u8());
        sink.store("scan.png", &loaded).expect("store");
        assert!(output.path().join("scan.png").is_file());
    }

    #[test]
    fn test_missing_photo_reports_load_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = DirSource {
            dir: dir.path().to_path_buf(),
        };
        let err = source.load("absent.png").expect_err("missing file");
        assert!(matches!(err, BatchError::Load { ref id, .. } if id == "absent.png"));
    }
}
