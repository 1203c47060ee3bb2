use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
pub const DEFAULT_TARGET_DOCUMENTS: usize = 1;
pub const DEFAULT_TOP_K: usize = 5;

/// Everything one session needs to know about its collaborators.
/// Passed into the controller explicitly; never read from globals.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub answer_endpoint: String,
    pub answer_api_key: Option<String>,
    pub answer_timeout: Duration,
    pub search_endpoint: String,
    pub search_limit: usize,
    pub download_timeout: Duration,
    pub target_documents: usize,
    pub top_k: usize,
    pub chunking: ChunkingConfig,
    /// Parent of the per-session download directories. System temp dir when unset.
    pub download_root: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(answer_endpoint: impl Into<String>) -> Self {
        Self {
            answer_endpoint: answer_endpoint.into(),
            answer_api_key: None,
            answer_timeout: Duration::from_secs(120),
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            search_limit: 20,
            download_timeout: Duration::from_secs(30),
            target_documents: DEFAULT_TARGET_DOCUMENTS,
            top_k: DEFAULT_TOP_K,
            chunking: ChunkingConfig::default(),
            download_root: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.answer_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("answer endpoint is empty".to_string()));
        }
        Url::parse(&self.answer_endpoint)?;

        if self.search_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("search endpoint is empty".to_string()));
        }
        Url::parse(&self.search_endpoint)?;

        if self.target_documents == 0 {
            return Err(ConfigError::Invalid(
                "target document count must be positive".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be positive".to_string()));
        }
        if self.search_limit == 0 {
            return Err(ConfigError::Invalid("search limit must be positive".to_string()));
        }

        self.chunking.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionConfig;

    #[test]
    fn defaults_validate() {
        let config = SessionConfig::new("http://localhost:5000/generate_llm_response");
        assert!(config.validate().is_ok());
        assert_eq!(config.target_documents, 1);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn zero_counts_are_rejected() {
        let mut config = SessionConfig::new("http://localhost:5000/generate");
        config.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::new("http://localhost:5000/generate");
        config.target_documents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let config = SessionConfig::new("not a url");
        assert!(config.validate().is_err());

        let config = SessionConfig::new("   ");
        assert!(config.validate().is_err());
    }
}
