use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::TextUnit;
use tracing::info;

#[derive(Debug, Clone)]
pub(crate) struct IndexEntry {
    pub(crate) unit: TextUnit,
    pub(crate) vector: Vec<f32>,
}

/// Immutable snapshot of text units and their embeddings. There is no
/// update API; a rebuilt index replaces the old one wholesale.
#[derive(Debug, Clone)]
pub struct Index {
    embedder_name: String,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl Index {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embedder_name(&self) -> &str {
        &self.embedder_name
    }

    pub fn units(&self) -> impl Iterator<Item = &TextUnit> {
        self.entries.iter().map(|entry| &entry.unit)
    }

    pub(crate) fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Embeds every unit once, in corpus order. An empty corpus gives an empty index.
pub fn build_index<E>(units: Vec<TextUnit>, embedder: &E) -> Result<Index, IndexError>
where
    E: Embedder + ?Sized,
{
    let dimensions = embedder.dimensions();
    let mut entries = Vec::with_capacity(units.len());

    for unit in units {
        let vector = embedder.embed(&unit.text);

        if vector.is_empty() {
            return Err(IndexError::EmptyEmbedding { unit: unit.label() });
        }
        if vector.len() != dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                found: vector.len(),
            });
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(IndexError::NonFinite { unit: unit.label() });
        }

        entries.push(IndexEntry { unit, vector });
    }

    info!(
        embedder = embedder.name(),
        dimensions,
        units = entries.len(),
        "index built"
    );

    Ok(Index {
        embedder_name: embedder.name().to_string(),
        dimensions,
        entries,
    })
}
