use crate::error::{AnswerError, SearchError, TransportError};
use crate::models::CandidateRecord;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait SearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<CandidateRecord>, SearchError>;

    fn name(&self) -> &str;
}

/// Single bounded-time download of a URL.
#[async_trait]
pub trait DownloadTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError>;
}

/// Remote text generation: prompt in, raw generated output back.
#[async_trait]
pub trait GenerationEndpoint {
    async fn generate(&self, prompt: &str) -> Result<String, AnswerError>;
}
