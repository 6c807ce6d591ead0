use crate::params::ParamError;

/// Failures surfaced by a render call.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{samples} samples do not describe a {width}x{height} RGB image")]
    ShapeMismatch {
        width: u32,
        height: u32,
        samples: usize,
    },
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ParamError),
    #[error("backend failure: {0}")]
    Backend(String),
}
