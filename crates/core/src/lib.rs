pub mod acquire;
pub mod answer;
pub mod chunking;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod models;
pub mod retriever;
pub mod search;
pub mod session;
pub mod store;
pub mod traits;
pub mod validator;

pub use acquire::{
    discover_pdf_files, load_local, AcquisitionReport, Acquirer, DocumentSet, ReqwestTransport,
};
pub use answer::{build_prompt, strip_prompt_echo, AnswerClient, HttpGenerationEndpoint};
pub use chunking::{normalize_whitespace, split_page, ChunkingConfig};
pub use config::SessionConfig;
pub use context::{assemble, split_context, UNIT_SEPARATOR};
pub use embeddings::{cosine_similarity, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    AcquisitionError, AnswerError, ConfigError, ExtractionError, IndexError, SearchError,
    TransportError,
};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use index::{build_index, Index};
pub use models::{AcquiredDocument, CandidateRecord, RetrievedUnit, TextUnit};
pub use retriever::query;
pub use search::SemanticScholarProvider;
pub use session::{
    Action, DisplayEvent, DisplaySurface, HttpSessionController, Phase, SessionController,
    SessionState,
};
pub use store::{DocumentFailure, DocumentStore, ExtractionReport};
pub use traits::{DownloadTransport, FetchResponse, GenerationEndpoint, SearchProvider};
pub use validator::is_pdf;
