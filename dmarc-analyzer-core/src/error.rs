//! Error taxonomy shared by every stage of the analysis pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding, parsing or analysing a DMARC report.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Unrecognised extension, or a container that does not decompress.
    #[error("unsupported or corrupt report file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Parse(String),

    /// A required DMARC element is absent or carries an invalid value.
    #[error("missing or invalid DMARC element `{0}`")]
    Schema(String),

    #[error("inference service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("inference service returned HTTP {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("inference service returned an empty analysis")]
    EmptyResponse,

    /// Unreadable or corrupt model config. Callers treat this as "no default set".
    #[error("config file {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("no models are installed on the inference service")]
    NoModels,

    #[error("model selection aborted")]
    SelectionAborted,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalyzerError {
    pub fn format(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AnalyzerError::Format {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzerError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<quick_xml::Error> for AnalyzerError {
    fn from(e: quick_xml::Error) -> Self {
        AnalyzerError::Parse(e.to_string())
    }
}

pub type Result<T, E = AnalyzerError> = std::result::Result<T, E>;
