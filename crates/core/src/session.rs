use crate::acquire::{load_local, AcquisitionReport, Acquirer, DocumentSet, ReqwestTransport};
use crate::answer::{AnswerClient, HttpGenerationEndpoint};
use crate::config::SessionConfig;
use crate::context::assemble;
use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::error::ConfigError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::index::{build_index, Index};
use crate::models::{AcquiredDocument, RetrievedUnit};
use crate::retriever;
use crate::search::SemanticScholarProvider;
use crate::store::DocumentStore;
use crate::traits::{DownloadTransport, GenerationEndpoint, SearchProvider};
use std::fmt;
use tokio::runtime::{Handle, RuntimeFlavor};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Searching,
    Acquired,
    Indexing,
    Ready,
    Answering,
}

impl Phase {
    /// Phases that only exist while a stage is running.
    pub fn is_transient(self) -> bool {
        matches!(self, Phase::Searching | Phase::Indexing | Phase::Answering)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Empty => "empty",
            Phase::Searching => "searching",
            Phase::Acquired => "acquired",
            Phase::Indexing => "indexing",
            Phase::Ready => "ready",
            Phase::Answering => "answering",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Search(String),
    Load(Vec<PathBuf>),
    Process,
    Ask(String),
    Reset,
    Status,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Search(_) => "search",
            Action::Load(_) => "load",
            Action::Process => "process",
            Action::Ask(_) => "ask",
            Action::Reset => "reset",
            Action::Status => "status",
        }
    }
}

/// Everything the display surface is told about. One action produces a
/// sequence of these.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Phase(Phase),
    Ignored { action: &'static str, phase: Phase },
    SearchFailed(String),
    CandidatesFound { total: usize, with_pdf: usize },
    AcquisitionFailures(Vec<String>),
    AcquisitionAborted(String),
    Documents(Vec<AcquiredDocument>),
    ExtractionErrors(Vec<String>),
    IndexBuilt { documents: usize, units: usize },
    IndexFailed(String),
    Retrieved(Vec<RetrievedUnit>),
    Answer(String),
    AnswerFailed(String),
    Context(String),
    Reset { discarded_documents: usize },
}

pub trait DisplaySurface {
    fn render(&mut self, event: DisplayEvent);
}

impl DisplaySurface for Vec<DisplayEvent> {
    fn render(&mut self, event: DisplayEvent) {
        self.push(event);
    }
}

/// One user's session. Owned by the caller and threaded through
/// [`SessionController::handle`].
#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    documents: DocumentSet,
    index: Option<Index>,
    last_question: Option<String>,
    last_answer: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Empty,
            documents: DocumentSet::new(),
            index: None,
            last_question: None,
            last_answer: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn documents(&self) -> &[AcquiredDocument] {
        self.documents.documents()
    }

    pub fn document_set(&self) -> &DocumentSet {
        &self.documents
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    pub fn last_question(&self) -> Option<&str> {
        self.last_question.as_deref()
    }

    pub fn last_answer(&self) -> Option<&str> {
        self.last_answer.as_deref()
    }

    /// Whether `action` does anything in the current phase. Disabled actions
    /// are dropped, never queued.
    pub fn accepts(&self, action: &Action) -> bool {
        match action {
            Action::Reset | Action::Status => true,
            Action::Search(query) => self.phase == Phase::Empty && !query.trim().is_empty(),
            Action::Load(paths) => self.phase == Phase::Empty && !paths.is_empty(),
            Action::Process => self.phase == Phase::Acquired && !self.documents.is_empty(),
            Action::Ask(question) => {
                self.phase == Phase::Ready && self.index.is_some() && !question.trim().is_empty()
            }
        }
    }
}

pub type HttpSessionController =
    SessionController<SemanticScholarProvider, ReqwestTransport, HttpGenerationEndpoint>;

/// Drives a [`SessionState`] through search, acquisition, indexing and
/// answering. Holds only configuration and collaborators, never session data.
pub struct SessionController<S, T, G, X = LopdfExtractor, E = CharacterNgramEmbedder> {
    config: SessionConfig,
    search: S,
    acquirer: Acquirer<T>,
    store: DocumentStore<X>,
    embedder: E,
    answers: AnswerClient<G>,
}

impl HttpSessionController {
    pub fn connect(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let search = SemanticScholarProvider::new(
            config.search_endpoint.clone(),
            config.search_limit,
            config.download_timeout,
        )
        .map_err(|error| ConfigError::Client(error.to_string()))?;
        let transport = ReqwestTransport::new(config.download_timeout)
            .map_err(|error| ConfigError::Client(error.to_string()))?;
        let endpoint = HttpGenerationEndpoint::new(
            config.answer_endpoint.clone(),
            config.answer_api_key.clone(),
            config.answer_timeout,
        )
        .map_err(|error| ConfigError::Client(error.to_string()))?;

        Ok(Self::new(config, search, transport, endpoint))
    }
}

impl<S, T, G> SessionController<S, T, G> {
    pub fn new(config: SessionConfig, search: S, transport: T, endpoint: G) -> Self {
        let store = DocumentStore::new(config.chunking);
        let acquirer = Acquirer::new(transport).with_download_root(config.download_root.clone());
        Self {
            config,
            search,
            acquirer,
            store,
            embedder: CharacterNgramEmbedder::default(),
            answers: AnswerClient::new(endpoint),
        }
    }
}

impl<S, T, G, X, E> SessionController<S, T, G, X, E> {
    pub fn with_extractor<X2: PdfExtractor>(self, extractor: X2) -> SessionController<S, T, G, X2, E> {
        SessionController {
            store: DocumentStore::with_extractor(extractor, self.config.chunking),
            config: self.config,
            search: self.search,
            acquirer: self.acquirer,
            embedder: self.embedder,
            answers: self.answers,
        }
    }

    pub fn with_embedder<E2: Embedder>(self, embedder: E2) -> SessionController<S, T, G, X, E2> {
        SessionController {
            embedder,
            config: self.config,
            search: self.search,
            acquirer: self.acquirer,
            store: self.store,
            answers: self.answers,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<S, T, G, X, E> SessionController<S, T, G, X, E>
where
    S: SearchProvider + Send + Sync,
    T: DownloadTransport + Send + Sync,
    G: GenerationEndpoint + Send + Sync,
    X: PdfExtractor,
    E: Embedder,
{
    /// Applies one action to the session and returns the resulting state.
    /// Every stage runs to completion before this returns; a failing stage
    /// leaves the state in the last stable phase before it.
    pub async fn handle(
        &self,
        state: SessionState,
        action: Action,
        surface: &mut dyn DisplaySurface,
    ) -> SessionState {
        if !state.accepts(&action) {
            info!(action = action.name(), phase = %state.phase, "action ignored");
            surface.render(DisplayEvent::Ignored {
                action: action.name(),
                phase: state.phase,
            });
            return state;
        }

        match action {
            Action::Search(query) => self.search(state, &query, surface).await,
            Action::Load(paths) => self.load(state, &paths, surface),
            Action::Process => self.process(state, surface),
            Action::Ask(question) => self.ask(state, &question, surface).await,
            Action::Reset => reset(state, surface),
            Action::Status => {
                surface.render(DisplayEvent::Phase(state.phase));
                surface.render(DisplayEvent::Documents(state.documents().to_vec()));
                state
            }
        }
    }

    async fn search(
        &self,
        mut state: SessionState,
        query: &str,
        surface: &mut dyn DisplaySurface,
    ) -> SessionState {
        enter(&mut state, Phase::Searching, surface);
        info!(query, provider = self.search.name(), "searching");

        let candidates = match self.search.search(query).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(error = %error, "search failed");
                surface.render(DisplayEvent::SearchFailed(error.to_string()));
                Vec::new()
            }
        };
        surface.render(DisplayEvent::CandidatesFound {
            total: candidates.len(),
            with_pdf: candidates
                .iter()
                .filter(|candidate| candidate.download_url.is_some())
                .count(),
        });

        let report = self
            .acquirer
            .acquire(&candidates, self.config.target_documents, &mut state.documents)
            .await;
        finish_acquisition(state, report, surface)
    }

    fn load(
        &self,
        mut state: SessionState,
        paths: &[PathBuf],
        surface: &mut dyn DisplaySurface,
    ) -> SessionState {
        enter(&mut state, Phase::Searching, surface);
        let report = load_local(paths, self.config.download_root.as_deref(), &mut state.documents);
        finish_acquisition(state, report, surface)
    }

    fn process(&self, mut state: SessionState, surface: &mut dyn DisplaySurface) -> SessionState {
        enter(&mut state, Phase::Indexing, surface);

        let extraction = run_blocking(|| self.store.extract_all(state.documents.documents()));
        if !extraction.failures.is_empty() {
            surface.render(DisplayEvent::ExtractionErrors(
                extraction
                    .failures
                    .iter()
                    .map(|failure| format!("{}: {}", failure.document_id, failure.error))
                    .collect(),
            ));
        }

        match run_blocking(|| build_index(extraction.units, &self.embedder)) {
            Ok(index) => {
                surface.render(DisplayEvent::IndexBuilt {
                    documents: state.documents.len() - extraction.failures.len(),
                    units: index.len(),
                });
                state.index = Some(index);
                state.documents.release_files();
                enter(&mut state, Phase::Ready, surface);
            }
            Err(error) => {
                warn!(error = %error, "index build failed");
                surface.render(DisplayEvent::IndexFailed(error.to_string()));
                enter(&mut state, Phase::Acquired, surface);
            }
        }

        state
    }

    async fn ask(
        &self,
        mut state: SessionState,
        question: &str,
        surface: &mut dyn DisplaySurface,
    ) -> SessionState {
        enter(&mut state, Phase::Answering, surface);
        state.last_question = Some(question.to_string());
        state.last_answer = None;

        let retrieved = match &state.index {
            Some(index) => retriever::query(index, &self.embedder, question, self.config.top_k),
            None => Ok(Vec::new()),
        };

        match retrieved {
            Ok(retrieved) => {
                let context = assemble(&retrieved);
                surface.render(DisplayEvent::Retrieved(retrieved));

                match self.answers.ask(question, &context).await {
                    Ok(answer) => {
                        state.last_answer = Some(answer.clone());
                        surface.render(DisplayEvent::Answer(answer));
                    }
                    Err(error) => {
                        warn!(error = %error, "answer generation failed");
                        surface.render(DisplayEvent::AnswerFailed(error.to_string()));
                    }
                }
                surface.render(DisplayEvent::Context(context));
            }
            Err(error) => {
                warn!(error = %error, "retrieval failed");
                surface.render(DisplayEvent::AnswerFailed(error.to_string()));
            }
        }

        enter(&mut state, Phase::Ready, surface);
        state
    }
}

/// Moves CPU-bound work off the async worker when the runtime allows it.
fn run_blocking<R>(work: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

fn enter(state: &mut SessionState, phase: Phase, surface: &mut dyn DisplaySurface) {
    state.phase = phase;
    surface.render(DisplayEvent::Phase(phase));
}

fn finish_acquisition(
    mut state: SessionState,
    report: AcquisitionReport,
    surface: &mut dyn DisplaySurface,
) -> SessionState {
    if !report.failures.is_empty() {
        surface.render(DisplayEvent::AcquisitionFailures(
            report.failures.iter().map(ToString::to_string).collect(),
        ));
    }
    if let Some(error) = &report.aborted {
        surface.render(DisplayEvent::AcquisitionAborted(error.to_string()));
    }

    info!(
        accepted = report.accepted.len(),
        attempted = report.attempted,
        failed = report.failures.len(),
        duplicates = report.duplicates,
        without_url = report.without_url,
        "acquisition finished"
    );

    surface.render(DisplayEvent::Documents(state.documents().to_vec()));
    enter(&mut state, Phase::Acquired, surface);
    state
}

/// Drops documents, files and index unconditionally.
fn reset(state: SessionState, surface: &mut dyn DisplaySurface) -> SessionState {
    let discarded_documents = state.documents.len();
    drop(state);

    info!(discarded_documents, "session reset");
    surface.render(DisplayEvent::Reset {
        discarded_documents,
    });

    let mut fresh = SessionState::new();
    enter(&mut fresh, Phase::Empty, surface);
    fresh
}
