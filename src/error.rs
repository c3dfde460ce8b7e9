//! Error taxonomy for the box score scanning pipeline.
//!
//! Every variant is a recoverable, per-request condition that the HTTP layer
//! maps to a status code. Nothing here is fatal to the process.

use thiserror::Error;

/// Failures the pipeline can surface to a caller.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The uploaded bytes did not decode as an image.
    #[error("unable to decode image: {0}")]
    ImageDecode(String),

    /// No line or token cleared the similarity threshold in either image variant.
    #[error("username not found in image")]
    UsernameNotFound,

    /// A row was located but could not be resolved into 13 numeric fields,
    /// or the resolved values failed the sanity check.
    #[error("unable to parse stats row: {0}")]
    StatsParse(String),

    /// The tesseract binary could not be located.
    #[error("tesseract is not installed or it's not in your PATH")]
    EngineUnavailable,

    /// The engine was found but an invocation failed (bad exit status,
    /// unreadable output).
    #[error("ocr engine failure: {0}")]
    Engine(String),
}

impl ScanError {
    /// True for conditions caused by the request content rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ScanError::ImageDecode(_) | ScanError::UsernameNotFound | ScanError::StatsParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ScanError::UsernameNotFound.is_client_error());
        assert!(ScanError::ImageDecode("bad".into()).is_client_error());
        assert!(ScanError::StatsParse("short row".into()).is_client_error());
        assert!(!ScanError::EngineUnavailable.is_client_error());
        assert!(!ScanError::Engine("exit 1".into()).is_client_error());
    }
}
