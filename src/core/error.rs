// This module defines the caller-facing error types of textmodel using thiserror.
// TextModelError has two kinds. Compilation is the single fatal kind: a compiling backend
// produced a unit that could not be generated, compiled, verified or loaded. It names the
// backend and the unit and keeps the underlying failure as its source, and it is never
// retried or replaced by a fallback evaluator. Config covers invalid engine configuration
// detected before any template is built. FatalCause groups the layer errors that can sit
// underneath a compilation failure. Unavailable loader strategies never surface here.
// TextModelResult<T> is the convenience alias used by the builder and the engine.

//! Error types for textmodel.

use crate::backend::BackendId;
use crate::core::config::ConfigError;
use crate::loader::LoadError;
#[cfg(feature = "source")]
use crate::source::SourceError;
use crate::unit::UnitError;
use thiserror::Error;

/// Underlying failure of a compiling backend.
#[derive(Error, Debug)]
pub enum FatalCause {
    #[cfg(feature = "source")]
    #[error("source compilation failed: {0}")]
    Source(#[from] SourceError),

    #[error("unit construction failed: {0}")]
    Unit(#[from] UnitError),

    #[error("unit load failed: {0}")]
    Load(#[from] LoadError),

    #[error("template has {0} dynamic fragments, more than a unit can hold")]
    TooManyFields(u32),
}

/// Main error type for building evaluators.
#[derive(Error, Debug)]
pub enum TextModelError {
    #[error("{backend} backend failed to compile {unit}")]
    Compilation {
        backend: BackendId,
        unit: String,
        #[source]
        cause: FatalCause,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl TextModelError {
    /// Whether this error reports a failed compilation rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TextModelError::Compilation { .. })
    }

    /// Cause of a compilation failure.
    pub fn cause(&self) -> Option<&FatalCause> {
        match self {
            TextModelError::Compilation { cause, .. } => Some(cause),
            TextModelError::Config(_) => None,
        }
    }
}

/// Convenience type alias for textmodel results.
pub type TextModelResult<T> = Result<T, TextModelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_compilation_error_keeps_cause() {
        let err = TextModelError::Compilation {
            backend: BackendId::Assembly,
            unit: "TextModel$3".to_string(),
            cause: FatalCause::Unit(UnitError::BadMagic),
        };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "assembly backend failed to compile TextModel$3");
        assert_eq!(
            err.source().map(|cause| cause.to_string()),
            Some("unit construction failed: bad unit magic".to_string())
        );
    }
}
