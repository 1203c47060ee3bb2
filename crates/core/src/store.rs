use crate::chunking::{normalize_whitespace, split_page, ChunkingConfig};
use crate::error::ExtractionError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::{AcquiredDocument, TextUnit};
use tracing::{info, warn};

pub struct DocumentFailure {
    pub document_id: String,
    pub error: ExtractionError,
}

/// Units from every readable document plus one failure per unreadable one.
pub struct ExtractionReport {
    pub units: Vec<TextUnit>,
    pub failures: Vec<DocumentFailure>,
}

pub struct DocumentStore<E = LopdfExtractor> {
    extractor: E,
    chunking: ChunkingConfig,
}

impl DocumentStore<LopdfExtractor> {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self::with_extractor(LopdfExtractor, chunking)
    }
}

impl<E: PdfExtractor> DocumentStore<E> {
    pub fn with_extractor(extractor: E, chunking: ChunkingConfig) -> Self {
        Self {
            extractor,
            chunking,
        }
    }

    /// Converts one document into text units in page order.
    pub fn extract(&self, document: &AcquiredDocument) -> Result<Vec<TextUnit>, ExtractionError> {
        let pages = self.extractor.extract_pages(&document.local_path)?;

        let mut units = Vec::new();
        for page in pages {
            let normalized = normalize_whitespace(&page.text);
            for piece in split_page(&normalized, self.chunking) {
                units.push(TextUnit {
                    document_id: document.document_id.clone(),
                    sequence: units.len() as u32,
                    page: page.number,
                    text: piece,
                });
            }
        }

        if units.is_empty() {
            return Err(ExtractionError::NoText(document.local_path.clone()));
        }

        Ok(units)
    }

    /// Extracts every document in acquisition order. A failing document
    /// contributes no units and does not stop the others.
    pub fn extract_all(&self, documents: &[AcquiredDocument]) -> ExtractionReport {
        let mut units = Vec::new();
        let mut failures = Vec::new();

        for document in documents {
            match self.extract(document) {
                Ok(document_units) => {
                    info!(
                        document_id = %document.document_id,
                        units = document_units.len(),
                        "document extracted"
                    );
                    units.extend(document_units);
                }
                Err(error) => {
                    warn!(document_id = %document.document_id, error = %error, "document skipped");
                    failures.push(DocumentFailure {
                        document_id: document.document_id.clone(),
                        error,
                    });
                }
            }
        }

        ExtractionReport { units, failures }
    }
}
