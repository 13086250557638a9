use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Network error during {operation} ({stage}): {details}")]
    NetworkError {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },

    #[error("{url} responded with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Transfer of {url} failed after {attempts} attempts: {details}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        details: String,
    },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Checksum file {url} is malformed: {details}")]
    ChecksumMalformed { url: String, details: String },

    #[error("Repository configuration error: {details}")]
    Configuration { details: String },

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Transfer cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response body")]
    ResponseBody,
    #[error("response parse")]
    ResponseParse,
}

impl SourceError {
    pub fn network_request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::Request,
            details: details.into(),
        }
    }

    pub fn network_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_request(operation, error.to_string())
    }

    pub fn network_body_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::NetworkError {
            operation,
            stage: NetworkStage::ResponseBody,
            details: error.to_string(),
        }
    }

    pub fn network_parse(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn configuration(details: impl Into<String>) -> Self {
        Self::Configuration {
            details: details.into(),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Failure reported by the active-version resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Maven {version} is set by {origin} but is not installed")]
    NotInstalled { version: String, origin: String },

    #[error("No Maven version is set")]
    NoneSet,

    #[error("{0}")]
    Other(String),
}
