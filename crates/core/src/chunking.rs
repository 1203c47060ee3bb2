use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 4_000,
            overlap_chars: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chars == 0 {
            return Err(ConfigError::Invalid("max_chars must be positive".to_string()));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(ConfigError::Invalid(format!(
                "overlap {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits normalized page text into pieces of at most `max_chars` characters,
/// consecutive pieces sharing `overlap_chars`. Short pages come back whole.
pub fn split_page(normalized: &str, config: ChunkingConfig) -> Vec<String> {
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= config.max_chars {
        return vec![trimmed.to_string()];
    }

    let step = config.max_chars.saturating_sub(config.overlap_chars).max(1);
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.max_chars).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof \u{a0}  spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn short_page_is_a_single_piece() {
        let pieces = split_page("a short page", ChunkingConfig::default());
        assert_eq!(pieces, vec!["a short page".to_string()]);
    }

    #[test]
    fn blank_page_yields_nothing() {
        assert!(split_page("   ", ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn long_page_is_split_with_overlap() {
        let config = ChunkingConfig {
            max_chars: 10,
            overlap_chars: 2,
        };
        let pieces = split_page("abcdefghijklmnopqrstu", config);

        assert_eq!(pieces[0], "abcdefghij");
        assert_eq!(pieces[1], "ijklmnopqr");
        assert_eq!(pieces[2], "qrstu");
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let config = ChunkingConfig {
            max_chars: 10,
            overlap_chars: 10,
        };
        assert!(config.validate().is_err());
    }
}
