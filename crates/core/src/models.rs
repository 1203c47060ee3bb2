use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One search-provider hit. Bibliographic fields are carried for display only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateRecord {
    pub download_url: Option<String>,
    pub title: String,
    pub year: Option<u32>,
    pub authors: Vec<String>,
}

impl CandidateRecord {
    pub fn with_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            download_url: Some(url.into()),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A validated PDF materialized in the session directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcquiredDocument {
    pub document_id: String,
    pub title: String,
    pub source: String,
    pub local_path: PathBuf,
    pub byte_length: u64,
    pub checksum: String,
    pub acquired_at: DateTime<Utc>,
}

/// One page, or one piece of a long page, of extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextUnit {
    pub document_id: String,
    /// Contiguous per document, starting at 0.
    pub sequence: u32,
    pub page: u32,
    pub text: String,
}

impl TextUnit {
    pub fn label(&self) -> String {
        format!("{}#{}", self.document_id, self.sequence)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedUnit {
    pub unit: TextUnit,
    pub score: f32,
}
