use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::IndexError;
use crate::index::Index;
use crate::models::RetrievedUnit;
use std::cmp::Ordering;

/// Returns the `k` units most similar to the question, best first. Equal
/// scores keep corpus order. An empty index answers with nothing.
pub fn query<E>(
    index: &Index,
    embedder: &E,
    question: &str,
    k: usize,
) -> Result<Vec<RetrievedUnit>, IndexError>
where
    E: Embedder + ?Sized,
{
    if index.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    if embedder.name() != index.embedder_name() {
        return Err(IndexError::EmbedderMismatch {
            built_with: index.embedder_name().to_string(),
            queried_with: embedder.name().to_string(),
        });
    }

    let question_vector = embedder.embed(question);
    if question_vector.len() != index.dimensions() {
        return Err(IndexError::DimensionMismatch {
            expected: index.dimensions(),
            found: question_vector.len(),
        });
    }
    if question_vector.iter().any(|value| !value.is_finite()) {
        return Err(IndexError::NonFinite {
            unit: "question".to_string(),
        });
    }

    let mut scored: Vec<(usize, f32)> = index
        .entries()
        .iter()
        .enumerate()
        .map(|(position, entry)| (position, cosine_similarity(&question_vector, &entry.vector)))
        .collect();

    scored.sort_by(|left, right| match right.1.total_cmp(&left.1) {
        Ordering::Equal => left.0.cmp(&right.0),
        other => other,
    });

    Ok(scored
        .into_iter()
        .take(k)
        .map(|(position, score)| RetrievedUnit {
            unit: index.entries()[position].unit.clone(),
            score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::query;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::IndexError;
    use crate::index::build_index;
    use crate::index::tests::{unit, TableEmbedder};

    fn five_unit_embedder() -> TableEmbedder {
        TableEmbedder::new(
            3,
            &[
                ("u0", vec![0.0, 0.0, 1.0]),
                ("u1", vec![0.6, 0.8, 0.0]),
                ("u2", vec![-1.0, 0.0, 0.0]),
                ("u3", vec![1.0, 0.1, 0.0]),
                ("u4", vec![0.0, -1.0, 0.0]),
                ("question", vec![1.0, 0.2, 0.0]),
            ],
        )
    }

    fn five_units() -> Vec<crate::models::TextUnit> {
        (0..5)
            .map(|i| unit("pdf_0", i, &format!("u{i}")))
            .collect()
    }

    #[test]
    fn results_are_ranked_by_similarity() {
        let embedder = five_unit_embedder();
        let index = build_index(five_units(), &embedder).unwrap();

        let hits = query(&index, &embedder, "question", 2).unwrap();

        let texts: Vec<&str> = hits.iter().map(|hit| hit.unit.text.as_str()).collect();
        assert_eq!(texts, vec!["u3", "u1"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn k_larger_than_corpus_returns_everything_ranked() {
        let embedder = five_unit_embedder();
        let index = build_index(five_units(), &embedder).unwrap();

        let hits = query(&index, &embedder, "question", 50).unwrap();

        assert_eq!(hits.len(), 5);
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn ties_keep_corpus_order() {
        let embedder = TableEmbedder::new(
            2,
            &[
                ("first", vec![1.0, 0.0]),
                ("second", vec![1.0, 0.0]),
                ("third", vec![0.0, 1.0]),
                ("q", vec![1.0, 0.0]),
            ],
        );
        let units = vec![
            unit("pdf_0", 0, "third"),
            unit("pdf_0", 1, "first"),
            unit("pdf_1", 0, "second"),
        ];
        let index = build_index(units, &embedder).unwrap();

        let hits = query(&index, &embedder, "q", 3).unwrap();

        let labels: Vec<String> = hits.iter().map(|hit| hit.unit.label()).collect();
        assert_eq!(labels, vec!["pdf_0#1", "pdf_1#0", "pdf_0#0"]);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let embedder = CharacterNgramEmbedder::default();
        let index = build_index(Vec::new(), &embedder).unwrap();

        for k in [1, 5, 100] {
            assert!(query(&index, &embedder, "anything at all", k).unwrap().is_empty());
        }
    }

    #[test]
    fn different_embedder_is_rejected() {
        let table = five_unit_embedder();
        let index = build_index(five_units(), &table).unwrap();

        let result = query(&index, &CharacterNgramEmbedder::default(), "question", 2);
        assert!(matches!(result, Err(IndexError::EmbedderMismatch { .. })));
    }
}
