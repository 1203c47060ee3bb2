use crate::error::AnswerError;
use crate::traits::GenerationEndpoint;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerationResponse {
    output: Option<String>,
}

fn error_details<E: std::fmt::Display>(body: Result<String, E>) -> String {
    match body {
        Ok(body) => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        Err(error) => format!("<unreadable body: {error}>"),
    }
}

pub struct HttpGenerationEndpoint {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGenerationEndpoint {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnswerError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl GenerationEndpoint for HttpGenerationEndpoint {
    async fn generate(&self, prompt: &str) -> Result<String, AnswerError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&GenerationRequest { prompt });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let details = error_details(response.text().await);
            warn!(endpoint = %self.endpoint, status = status.as_u16(), "answer endpoint failed");
            return Err(AnswerError::Status {
                status: status.as_u16(),
                details,
            });
        }

        let payload: GenerationResponse = response
            .json()
            .await
            .map_err(|error| AnswerError::Payload(error.to_string()))?;

        payload
            .output
            .ok_or_else(|| AnswerError::Payload("response has no `output` field".to_string()))
    }
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Use the following excerpts from research papers to answer the question. \
If the excerpts do not contain the answer, say that you don't know.\n\n\
Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}

/// Removes verbatim copies of the prompt that some endpoints echo back.
pub fn strip_prompt_echo(output: &str, prompt: &str) -> String {
    if prompt.is_empty() {
        return output.trim().to_string();
    }
    output.replace(prompt, "").trim().to_string()
}

pub struct AnswerClient<G> {
    endpoint: G,
}

impl<G> AnswerClient<G> {
    pub fn new(endpoint: G) -> Self {
        Self { endpoint }
    }
}

impl<G> AnswerClient<G>
where
    G: GenerationEndpoint + Send + Sync,
{
    /// One request, no retries.
    pub async fn ask(&self, question: &str, context: &str) -> Result<String, AnswerError> {
        let prompt = build_prompt(question, context);
        debug!(prompt_chars = prompt.len(), "requesting answer");
        let output = self.endpoint.generate(&prompt).await?;
        Ok(strip_prompt_echo(&output, &prompt))
    }
}
