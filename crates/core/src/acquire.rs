use crate::error::{AcquisitionError, TransportError};
use crate::models::{AcquiredDocument, CandidateRecord};
use crate::traits::{DownloadTransport, FetchResponse};
use crate::validator::is_pdf;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;
use walkdir::WalkDir;

pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl DownloadTransport for ReqwestTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError> {
        let send = async {
            let response = self.client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(FetchResponse { status, body })
        };

        match send.await {
            Ok(response) => Ok(response),
            Err(error) if error.is_timeout() => Err(TransportError::Timeout(self.timeout)),
            Err(error) => Err(TransportError::Http(error)),
        }
    }
}

/// The session's acquired documents and the temporary directory holding them.
/// Dropping the set, or calling [`DocumentSet::release_files`], deletes the files.
#[derive(Debug, Default)]
pub struct DocumentSet {
    dir: Option<TempDir>,
    documents: Vec<AcquiredDocument>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[AcquiredDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn has_files(&self) -> bool {
        self.dir.is_some()
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.documents.iter().any(|document| document.source == source)
    }

    /// Deletes the materialized files; document metadata stays for display.
    pub fn release_files(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(error) = dir.close() {
                warn!(path = %path.display(), error = %error, "failed to remove session directory");
            } else {
                debug!(path = %path.display(), "session directory removed");
            }
        }
    }

    fn ensure_dir(&mut self, root: Option<&Path>) -> std::io::Result<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.path().to_path_buf());
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix("paper-qa-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        self.dir = Some(dir);
        Ok(path)
    }

    fn persist(
        &mut self,
        root: Option<&Path>,
        title: &str,
        source: &str,
        content: &[u8],
    ) -> Result<AcquiredDocument, AcquisitionError> {
        let persist_error = |error| AcquisitionError::Persist {
            location: source.to_string(),
            source: error,
        };

        let dir = self.ensure_dir(root).map_err(persist_error)?;
        let local_path = dir.join(format!("{}.pdf", Uuid::new_v4()));
        fs::write(&local_path, content).map_err(persist_error)?;

        let document = AcquiredDocument {
            document_id: format!("pdf_{}", self.documents.len()),
            title: title.to_string(),
            source: source.to_string(),
            local_path,
            byte_length: content.len() as u64,
            checksum: digest_bytes(content),
            acquired_at: Utc::now(),
        };
        self.documents.push(document.clone());
        Ok(document)
    }
}

pub fn digest_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
pub struct AcquisitionReport {
    pub accepted: Vec<AcquiredDocument>,
    pub failures: Vec<AcquisitionError>,
    pub attempted: usize,
    pub without_url: usize,
    pub duplicates: usize,
    /// Set when the pass stopped early on an error unrelated to one candidate.
    pub aborted: Option<AcquisitionError>,
}

pub struct Acquirer<T> {
    transport: T,
    download_root: Option<PathBuf>,
}

impl<T> Acquirer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            download_root: None,
        }
    }

    pub fn with_download_root(mut self, root: Option<PathBuf>) -> Self {
        self.download_root = root;
        self
    }
}

impl<T> Acquirer<T>
where
    T: DownloadTransport + Send + Sync,
{
    /// Downloads candidates in order until `target_count` valid PDFs are
    /// accepted or candidates run out. Per-candidate failures are recorded
    /// and skipped; a url that failed may still be accepted from a later
    /// candidate.
    pub async fn acquire(
        &self,
        candidates: &[CandidateRecord],
        target_count: usize,
        into: &mut DocumentSet,
    ) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();
        let mut accepted_urls = HashSet::new();

        for candidate in candidates {
            if report.accepted.len() >= target_count {
                break;
            }

            let raw_url = match candidate.download_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => url,
                _ => {
                    report.without_url += 1;
                    continue;
                }
            };

            let url = match Url::parse(raw_url) {
                Ok(url) => url.to_string(),
                Err(source) => {
                    report.failures.push(AcquisitionError::InvalidUrl {
                        url: raw_url.to_string(),
                        source,
                    });
                    continue;
                }
            };

            if accepted_urls.contains(&url) || into.contains_source(&url) {
                debug!(url = %url, "duplicate download url skipped");
                report.duplicates += 1;
                continue;
            }

            report.attempted += 1;
            let response = match self.transport.fetch(&url).await {
                Ok(response) => response,
                Err(source) => {
                    warn!(url = %url, error = %source, "download failed");
                    report
                        .failures
                        .push(AcquisitionError::Transport { url, source });
                    continue;
                }
            };

            if response.status != 200 {
                warn!(url = %url, status = response.status, "download returned non-success status");
                report.failures.push(AcquisitionError::Status {
                    url,
                    status: response.status,
                });
                continue;
            }

            if !is_pdf(&response.body) {
                debug!(url = %url, bytes = response.body.len(), "downloaded content is not a pdf");
                report.failures.push(AcquisitionError::NotPdf { location: url });
                continue;
            }

            match into.persist(
                self.download_root.as_deref(),
                &candidate.title,
                &url,
                &response.body,
            ) {
                Ok(document) => {
                    info!(
                        document_id = %document.document_id,
                        url = %url,
                        bytes = document.byte_length,
                        "pdf acquired"
                    );
                    accepted_urls.insert(url);
                    report.accepted.push(document);
                }
                Err(error) => {
                    warn!(error = %error, "acquisition pass aborted");
                    report.aborted = Some(error);
                    break;
                }
            }
        }

        report
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Copies local PDF files (or PDFs found under folders) into the session
/// directory, applying the same magic-number check and de-duplication as
/// downloads.
pub fn load_local(
    paths: &[PathBuf],
    download_root: Option<&Path>,
    into: &mut DocumentSet,
) -> AcquisitionReport {
    let mut report = AcquisitionReport::default();
    let mut seen = HashSet::new();

    let files = paths.iter().flat_map(|path| {
        if path.is_dir() {
            discover_pdf_files(path)
        } else {
            vec![path.clone()]
        }
    });

    for path in files {
        let source = fs::canonicalize(&path)
            .unwrap_or_else(|_| path.clone())
            .to_string_lossy()
            .to_string();

        if !seen.insert(source.clone()) || into.contains_source(&source) {
            report.duplicates += 1;
            continue;
        }

        report.attempted += 1;
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(source) => {
                report.failures.push(AcquisitionError::Read { path, source });
                continue;
            }
        };

        if !is_pdf(&content) {
            report
                .failures
                .push(AcquisitionError::NotPdf { location: source });
            continue;
        }

        let title = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        match into.persist(download_root, &title, &source, &content) {
            Ok(document) => report.accepted.push(document),
            Err(error) => {
                warn!(error = %error, "local intake aborted");
                report.aborted = Some(error);
                break;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PDF: &[u8] = b"%PDF-1.4\n%fake";

    #[derive(Default)]
    struct FakeTransport {
        responses: HashMap<String, (u16, Vec<u8>)>,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn serving(entries: &[(&str, u16, &[u8])]) -> Self {
            Self {
                responses: entries
                    .iter()
                    .map(|(url, status, body)| (url.to_string(), (*status, body.to_vec())))
                    .collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl DownloadTransport for FakeTransport {
        async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(url) {
                Some((status, body)) => Ok(FetchResponse {
                    status: *status,
                    body: body.clone(),
                }),
                None => Err(TransportError::Other(format!("unreachable {url}"))),
            }
        }
    }

    fn candidates(urls: &[&str]) -> Vec<CandidateRecord> {
        urls.iter()
            .enumerate()
            .map(|(index, url)| CandidateRecord::with_url(format!("paper {index}"), *url))
            .collect()
    }

    #[tokio::test]
    async fn stops_once_target_count_is_reached() {
        let urls: Vec<String> = (0..10).map(|i| format!("https://papers.test/{i}.pdf")).collect();
        let entries: Vec<(&str, u16, &[u8])> = urls.iter().map(|u| (u.as_str(), 200, PDF)).collect();
        let acquirer = Acquirer::new(FakeTransport::serving(&entries));
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let mut set = DocumentSet::new();

        let report = acquirer.acquire(&candidates(&refs), 3, &mut set).await;

        assert_eq!(report.accepted.len(), 3);
        assert_eq!(set.len(), 3);
        assert_eq!(acquirer.transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.attempted, 3);
    }

    #[tokio::test]
    async fn duplicate_urls_are_fetched_once() {
        let url = "https://papers.test/a.pdf";
        let acquirer = Acquirer::new(FakeTransport::serving(&[(url, 200, PDF)]));
        let mut set = DocumentSet::new();

        let report = acquirer.acquire(&candidates(&[url, url]), 5, &mut set).await;

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(acquirer.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_skipped_and_order_is_preserved() {
        let acquirer = Acquirer::new(FakeTransport::serving(&[
            ("https://papers.test/html", 200, b"<html>nope</html>"),
            ("https://papers.test/missing.pdf", 404, b""),
            ("https://papers.test/one.pdf", 200, PDF),
            ("https://papers.test/two.pdf", 200, PDF),
        ]));
        let mut records = candidates(&[
            "https://papers.test/html",
            "https://papers.test/missing.pdf",
            "https://papers.test/down.pdf",
            "https://papers.test/one.pdf",
            "not a url",
            "https://papers.test/two.pdf",
        ]);
        records.insert(0, CandidateRecord::default());
        let mut set = DocumentSet::new();

        let report = acquirer.acquire(&records, 5, &mut set).await;

        let sources: Vec<&str> = report.accepted.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["https://papers.test/one.pdf", "https://papers.test/two.pdf"]
        );
        assert_eq!(report.without_url, 1);
        assert_eq!(report.failures.len(), 4);
        assert!(matches!(report.failures[0], AcquisitionError::NotPdf { .. }));
        assert!(matches!(report.failures[1], AcquisitionError::Status { status: 404, .. }));
        assert!(matches!(report.failures[2], AcquisitionError::Transport { .. }));
        assert!(matches!(report.failures[3], AcquisitionError::InvalidUrl { .. }));
        assert!(report.aborted.is_none());
        assert_eq!(set.documents()[0].document_id, "pdf_0");
        assert_eq!(set.documents()[1].document_id, "pdf_1");
    }

    #[tokio::test]
    async fn no_valid_pdf_is_an_empty_result() {
        let acquirer = Acquirer::new(FakeTransport::serving(&[(
            "https://papers.test/a",
            200,
            b"PDFxxx",
        )]));
        let mut set = DocumentSet::new();

        let report = acquirer
            .acquire(&candidates(&["https://papers.test/a"]), 1, &mut set)
            .await;

        assert!(report.accepted.is_empty());
        assert!(set.is_empty());
        assert!(!set.has_files());
    }

    #[tokio::test]
    async fn persisted_files_match_downloads_and_are_released() {
        let url = "https://papers.test/a.pdf";
        let acquirer = Acquirer::new(FakeTransport::serving(&[(url, 200, PDF)]));
        let mut set = DocumentSet::new();

        let report = acquirer.acquire(&candidates(&[url]), 1, &mut set).await;
        let document = &report.accepted[0];
        assert_eq!(fs::read(&document.local_path).unwrap(), PDF);
        assert_eq!(document.byte_length, PDF.len() as u64);
        assert_eq!(document.checksum, digest_bytes(PDF));

        let dir = set.directory().unwrap().to_path_buf();
        set.release_files();
        assert!(!dir.exists());
        assert!(!document.local_path.exists());
        assert_eq!(set.len(), 1);
    }

    /// Answers 503 on the first fetch and serves `PDF` afterwards.
    #[derive(Default)]
    struct RecoveringTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DownloadTransport for RecoveringTransport {
        async fn fetch(&self, _url: &str) -> Result<FetchResponse, TransportError> {
            let status = match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => 503,
                _ => 200,
            };
            Ok(FetchResponse {
                status,
                body: PDF.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn failed_url_is_retried_by_a_later_candidate() {
        let url = "https://papers.test/a.pdf";
        let acquirer = Acquirer::new(RecoveringTransport::default());
        let mut set = DocumentSet::new();

        let report = acquirer.acquire(&candidates(&[url, url]), 1, &mut set).await;

        assert_eq!(acquirer.transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.duplicates, 0);
        assert!(matches!(report.failures[0], AcquisitionError::Status { status: 503, .. }));
    }

    /// Serves `PDF`, and wipes the download root before answering the second fetch.
    struct VanishingRootTransport {
        root: PathBuf,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DownloadTransport for VanishingRootTransport {
        async fn fetch(&self, _url: &str) -> Result<FetchResponse, TransportError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                fs::remove_dir_all(&self.root).map_err(|error| TransportError::Other(error.to_string()))?;
            }
            Ok(FetchResponse {
                status: 200,
                body: PDF.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn persist_failure_aborts_pass_and_keeps_accepted() -> Result<(), Box<dyn std::error::Error>> {
        let parent = tempfile::tempdir()?;
        let root = parent.path().join("downloads");
        fs::create_dir(&root)?;
        let acquirer = Acquirer::new(VanishingRootTransport {
            root: root.clone(),
            calls: AtomicUsize::new(0),
        })
        .with_download_root(Some(root));
        let mut set = DocumentSet::new();

        let report = acquirer
            .acquire(
                &candidates(&[
                    "https://papers.test/a.pdf",
                    "https://papers.test/b.pdf",
                    "https://papers.test/c.pdf",
                ]),
                3,
                &mut set,
            )
            .await;

        assert!(matches!(report.aborted, Some(AcquisitionError::Persist { .. })));
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(acquirer.transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(set.len(), 1);
        assert_eq!(set.documents()[0].source, "https://papers.test/a.pdf");
        Ok(())
    }

    #[tokio::test]
    async fn session_directory_is_created_under_download_root() -> Result<(), Box<dyn std::error::Error>> {
        let root = tempfile::tempdir()?;
        let url = "https://papers.test/a.pdf";
        let acquirer = Acquirer::new(FakeTransport::serving(&[(url, 200, PDF)]))
            .with_download_root(Some(root.path().to_path_buf()));
        let mut set = DocumentSet::new();

        acquirer.acquire(&candidates(&[url]), 1, &mut set).await;

        let directory = set.directory().map(Path::to_path_buf);
        assert!(directory.as_deref().is_some_and(|dir| dir.starts_with(root.path())));
        drop(set);
        assert!(fs::read_dir(root.path())?.next().is_none());
        Ok(())
    }

    #[test]
    fn local_files_are_validated_and_copied() -> Result<(), Box<dyn std::error::Error>> {
        let source = tempfile::tempdir()?;
        let nested = source.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(source.path().join("a.pdf"), PDF)?;
        fs::write(nested.join("b.pdf"), PDF)?;
        fs::write(nested.join("fake.pdf"), b"not a pdf")?;
        fs::write(nested.join("notes.txt"), PDF)?;

        let mut set = DocumentSet::new();
        let report = load_local(&[source.path().to_path_buf()], None, &mut set);

        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.failures.len(), 1);
        for document in set.documents() {
            assert!(document.local_path.starts_with(set.directory().unwrap()));
        }

        let again = load_local(&[source.path().join("a.pdf")], None, &mut set);
        assert_eq!(again.duplicates, 1);
        assert_eq!(set.len(), 2);
        Ok(())
    }
}
