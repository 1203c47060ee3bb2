use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single download transport call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport failed: {0}")]
    Other(String),
}

/// Per-candidate acquisition failure. Never fatal to the pass.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("invalid download url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("download of {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("download of {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("content at {location} is not a pdf")]
    NotPdf { location: String },

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not persist {location}: {source}")]
    Persist {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

/// One document that failed to yield text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("pdf parse error in {path}: {details}")]
    PdfParse { path: PathBuf, details: String },

    #[error("pdf had no readable page text: {0}")]
    NoText(PathBuf),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedder returned an empty vector for unit {unit}")]
    EmptyEmbedding { unit: String },

    #[error("embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("embedding for unit {unit} contains non-finite values")]
    NonFinite { unit: String },

    #[error("index was built with embedder {built_with}, queried with {queried_with}")]
    EmbedderMismatch {
        built_with: String,
        queried_with: String,
    },
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("answer endpoint returned {status}: {details}")]
    Status { status: u16, details: String },

    #[error("invalid answer payload: {0}")]
    Payload(String),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("search request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not build http client: {0}")]
    Client(String),
}

