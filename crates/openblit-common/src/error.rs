//! Error taxonomy of the compatibility core.
//!
//! The legacy API reports every failure as an in-band status word. OpenBlit
//! keeps that shape: operations return `DdResult<T>` and never unwind, and
//! out-values only exist on the `Ok` path so callers cannot observe stale
//! state on failure.

use thiserror::Error;

/// Status words of the legacy API surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DdError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid display mode")]
    InvalidMode,
    #[error("surface is busy")]
    SurfaceBusy,
    #[error("surface is not locked")]
    NotLocked,
    #[error("a device context is already outstanding")]
    DcAlreadyCreated,
    #[error("no color key set")]
    NoColorKey,
    #[error("no palette attached")]
    NoPaletteAttached,
    #[error("no clipper attached")]
    NoClipperAttached,
    #[error("not found")]
    NotFound,
    #[error("buffer too small, {required} bytes required")]
    MoreData { required: usize },
    #[error("out of memory")]
    OutOfMemory,
    #[error("aggregation is not supported")]
    NoAggregation,
    #[error("no such interface")]
    NoInterface,
    #[error("already initialized")]
    AlreadyInitialized,
    #[error("operation not supported")]
    Unsupported,
    #[error("class not available")]
    ClassNotAvailable,
    #[error("host failure: {0}")]
    Generic(String),
}

pub type DdResult<T> = Result<T, DdError>;

impl DdError {
    /// Wrap a host-API failure description.
    pub fn generic(msg: impl Into<String>) -> Self {
        DdError::Generic(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_data_carries_required_size() {
        let err = DdError::MoreData { required: 48 };
        assert_eq!(err.to_string(), "buffer too small, 48 bytes required");
    }

    #[test]
    fn errors_compare_by_kind() {
        assert_eq!(DdError::SurfaceBusy, DdError::SurfaceBusy);
        assert_ne!(DdError::SurfaceBusy, DdError::NotLocked);
    }
}
