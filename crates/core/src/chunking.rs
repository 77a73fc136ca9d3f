use crate::error::ChunkingError;
use crate::models::{Chunk, ChunkMetadata, IngestionOptions};
use std::collections::VecDeque;

/// Separators tried in order: paragraphs, lines, words, then a hard cut.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&IngestionOptions::default())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkingError::InvalidConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits text on the coarsest separator present, merging small pieces into
/// windows of at most `chunk_size` characters and recursing into pieces that
/// are still too large.
#[derive(Debug, Clone)]
pub struct RecursiveTextSplitter {
    config: ChunkingConfig,
    separators: Vec<&'static str>,
}

impl RecursiveTextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, ChunkingError> {
        config.validate()?;
        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.to_vec(),
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.split_recursive(text, &self.separators, &mut out);
        out
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let (separator, remaining) = pick_separator(text, separators);
        let mut short_pieces: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                short_pieces.push(piece);
                continue;
            }

            if !short_pieces.is_empty() {
                out.extend(self.merge_pieces(&short_pieces));
                short_pieces.clear();
            }

            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                self.split_recursive(piece, remaining, out);
            }
        }

        if !short_pieces.is_empty() {
            out.extend(self.merge_pieces(&short_pieces));
        }
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.config.chunk_size && !current.is_empty() {
                push_window(&mut windows, &current);

                // Keep only as much trailing context as the overlap allows and
                // the next piece still fits.
                while total > self.config.chunk_overlap
                    || (total + len > self.config.chunk_size && total > 0)
                {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_window(&mut windows, &current);
        windows
    }
}

/// Splits `text` into ordered chunks tagged with an estimated page number and
/// the optional document/policy identifiers.
pub fn chunk_document(
    text: &str,
    page_count: u32,
    document_id: Option<&str>,
    policy_id: Option<&str>,
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, ChunkingError> {
    let splitter = RecursiveTextSplitter::new(config)?;
    let windows = splitter.split(text);
    let total = windows.len();

    if page_count == 0 {
        tracing::warn!("page count of zero treated as a single page");
    }

    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            chunk_index,
            metadata: ChunkMetadata {
                page_number: estimate_page(chunk_index, total, page_count),
                document_id: document_id.map(str::to_string),
                policy_id: policy_id.map(str::to_string),
            },
        })
        .collect())
}

/// Assumes chunks are spread evenly over the pages; the result is clamped to
/// `[1, page_count]`.
pub fn estimate_page(chunk_index: usize, total_chunks: usize, page_count: u32) -> u32 {
    let page_count = page_count.max(1);
    let chunks_per_page = (total_chunks / page_count as usize).max(1);
    let estimated = chunk_index / chunks_per_page + 1;
    u32::try_from(estimated).map_or(page_count, |page| page.min(page_count))
}

fn pick_separator<'a, 's>(text: &str, separators: &'a [&'s str]) -> (&'s str, &'a [&'s str]) {
    for (index, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (*separator, &[]);
        }
        if text.contains(*separator) {
            return (*separator, &separators[index + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Each piece after the first starts with the separator that preceded it.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(index, ch)| &text[index..index + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_window(windows: &mut Vec<String>, pieces: &VecDeque<&str>) {
    let joined = pieces.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn repeated_character_document_yields_three_overlapping_chunks() {
        let text = "A".repeat(2500);
        let chunks = chunk_document(&text, 5, None, None, config(1000, 200)).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.len(), 1000);
        assert_eq!(chunks[1].text.len(), 1000);
        assert_eq!(chunks[2].text.len(), 900);
        let pages: Vec<u32> = chunks.iter().map(|c| c.metadata.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn pages_are_grouped_when_chunks_outnumber_pages() {
        assert_eq!(estimate_page(0, 10, 3), 1);
        assert_eq!(estimate_page(2, 10, 3), 1);
        assert_eq!(estimate_page(3, 10, 3), 2);
        assert_eq!(estimate_page(8, 10, 3), 3);
        assert_eq!(estimate_page(9, 10, 3), 3);
    }

    #[test]
    fn zero_page_count_is_treated_as_one_page() {
        let chunks = chunk_document("short text", 0, None, None, config(100, 10)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.page_number, 1);
    }

    #[test]
    fn identifiers_are_attached_to_every_chunk() {
        let text = "First paragraph about accidents.\n\nSecond paragraph about illness.";
        let chunks = chunk_document(text, 1, Some("doc-1"), Some("policy-9"), config(40, 5)).unwrap();

        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.metadata.document_id.as_deref(), Some("doc-1"));
            assert_eq!(chunk.metadata.policy_id.as_deref(), Some("policy-9"));
        }
        assert_eq!(chunks[0].text, "First paragraph about accidents.");
        assert_eq!(chunks[1].text, "Second paragraph about illness.");
    }

    #[test]
    fn paragraphs_are_preferred_over_word_breaks() {
        let text = "alpha beta gamma\n\ndelta epsilon zeta";
        let splitter = RecursiveTextSplitter::new(config(20, 0)).unwrap();
        assert_eq!(splitter.split(text), vec!["alpha beta gamma", "delta epsilon zeta"]);
    }

    #[test]
    fn oversized_paragraph_falls_back_to_words() {
        let text = "one two three four five six seven eight nine ten";
        let splitter = RecursiveTextSplitter::new(config(15, 0)).unwrap();
        let windows = splitter.split(text);

        assert!(windows.len() > 1);
        for window in &windows {
            assert!(window.chars().count() <= 15, "{window:?} too long");
            assert!(!window.starts_with(' '));
        }
        assert_eq!(windows.join(" "), text);
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let text = "é".repeat(30);
        let splitter = RecursiveTextSplitter::new(config(10, 2)).unwrap();
        for window in splitter.split(&text) {
            assert!(window.chars().count() <= 10);
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = chunk_document("   \n\n  ", 3, None, None, config(100, 10)).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn degenerate_configs_are_rejected() {
        assert!(chunk_document("text", 1, None, None, config(0, 0)).is_err());
        assert!(chunk_document("text", 1, None, None, config(100, 100)).is_err());
    }

    mod proptest_chunking {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn indices_are_contiguous_and_pages_in_range(
                text in "[a-z .\n]{0,3000}",
                page_count in 1u32..40,
                chunk_size in 20usize..400,
                overlap_ratio in 0usize..50,
            ) {
                let chunk_overlap = chunk_size * overlap_ratio / 100;
                let chunks = chunk_document(&text, page_count, None, None, config(chunk_size, chunk_overlap)).unwrap();

                let mut previous_page = 1;
                for (position, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(chunk.chunk_index, position);
                    prop_assert!(chunk.metadata.page_number >= 1);
                    prop_assert!(chunk.metadata.page_number <= page_count);
                    prop_assert!(chunk.metadata.page_number >= previous_page);
                    prop_assert!(chunk.text.chars().count() <= chunk_size);
                    previous_page = chunk.metadata.page_number;
                }
            }

            #[test]
            fn removing_overlaps_reconstructs_length(
                text in "[a-z]{1,3000}",
                chunk_size in 10usize..500,
                overlap_ratio in 0usize..50,
            ) {
                let chunk_overlap = chunk_size * overlap_ratio / 100;
                let splitter = RecursiveTextSplitter::new(config(chunk_size, chunk_overlap)).unwrap();
                let windows = splitter.split(&text);

                let total: usize = windows.iter().map(|w| w.chars().count()).sum();
                let overlaps = chunk_overlap * windows.len().saturating_sub(1);
                prop_assert_eq!(total - overlaps, text.chars().count());
            }

            #[test]
            fn every_word_survives_splitting(
                words in proptest::collection::vec("[a-z]{1,12}", 1..300),
                chunk_size in 20usize..300,
            ) {
                let text = words.join(" ");
                let splitter = RecursiveTextSplitter::new(config(chunk_size, chunk_size / 5)).unwrap();
                let windows = splitter.split(&text);

                for word in &words {
                    prop_assert!(windows.iter().any(|w| w.contains(word.as_str())));
                }
            }
        }
    }
}
