use crate::error::SearchError;
use crate::models::CandidateRecord;
use crate::traits::SearchProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use url::Url;

const FIELDS: &str = "title,year,authors,openAccessPdf";

#[derive(Debug, Deserialize)]
struct PaperSearchResponse {
    #[serde(default)]
    data: Vec<PaperHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    authors: Vec<PaperAuthor>,
    #[serde(default)]
    open_access_pdf: Option<OpenAccessPdf>,
}

#[derive(Debug, Deserialize)]
struct PaperAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    #[serde(default)]
    url: Option<String>,
}

fn into_candidate(hit: PaperHit) -> CandidateRecord {
    CandidateRecord {
        download_url: hit
            .open_access_pdf
            .and_then(|pdf| pdf.url)
            .filter(|url| !url.trim().is_empty()),
        title: hit.title.unwrap_or_default(),
        year: hit.year,
        authors: hit.authors.into_iter().filter_map(|author| author.name).collect(),
    }
}

/// Relevance-ranked paper search against a Semantic Scholar compatible
/// `/paper/search` endpoint.
pub struct SemanticScholarProvider {
    client: Client,
    endpoint: String,
    limit: usize,
}

impl SemanticScholarProvider {
    pub fn new(endpoint: impl Into<String>, limit: usize, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
            limit,
        })
    }

    fn request_url(&self, query: &str) -> Result<Url, SearchError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("limit", &self.limit.to_string())
            .append_pair("fields", FIELDS);
        Ok(url)
    }
}

fn parse_candidates(body: &str) -> Result<Vec<CandidateRecord>, SearchError> {
    let parsed: PaperSearchResponse =
        serde_json::from_str(body).map_err(|error| SearchError::BackendResponse {
            backend: "semantic-scholar".to_string(),
            details: error.to_string(),
        })?;
    Ok(parsed.data.into_iter().map(into_candidate).collect())
}

#[async_trait]
impl SearchProvider for SemanticScholarProvider {
    async fn search(&self, query: &str) -> Result<Vec<CandidateRecord>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let url = self.request_url(query.trim())?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "semantic-scholar".to_string(),
                details: response.status().to_string(),
            });
        }

        let body = response.text().await?;
        let candidates = parse_candidates(&body)?;
        info!(
            query,
            candidates = candidates.len(),
            with_pdf = candidates.iter().filter(|c| c.download_url.is_some()).count(),
            "search finished"
        );
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "semantic-scholar"
    }
}
