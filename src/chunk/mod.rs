//! Content Chunker (SPEC_FULL.md §4.6), grounded on the pack's
//! `ParagraphChunker` (blank-line splitting, whitespace-boundary fallback
//! for oversized paragraphs), generalized with a sentence-boundary pass and
//! token-count/overlap bookkeeping.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::ContentChunk;

const DEFAULT_TARGET_TOKENS: usize = 500;
const DEFAULT_OVERLAP_TOKENS: usize = 50;

/// A pluggable token counter: an exact tokenizer if injected, otherwise a
/// language-aware character-ratio heuristic (SPEC_FULL.md §4.6).
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// ~4 chars/token for Latin-script languages; denser scripts (CJK) run
/// closer to ~1.5-2 chars/token, so this heuristic checks for CJK code
/// points and adjusts the ratio accordingly.
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let cjk_chars = text.chars().filter(|c| is_cjk(*c)).count();
        let total_chars = text.chars().count();
        let ratio = if total_chars > 0 && cjk_chars as f64 / total_chars as f64 > 0.3 { 1.8 } else { 4.0 };
        ((total_chars as f64) / ratio).ceil().max(1.0) as usize
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0xAC00..=0xD7A3
    )
}

fn sentence_boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)(.*?[.!?])\s+").unwrap())
}

pub struct ContentChunker {
    target_tokens: usize,
    overlap_tokens: usize,
    counter: Box<dyn TokenCounter>,
}

impl ContentChunker {
    pub fn new(target_tokens: usize, overlap_tokens: usize, counter: Box<dyn TokenCounter>) -> Self {
        Self { target_tokens, overlap_tokens, counter }
    }

    fn paragraphs(text: &str) -> Vec<&str> {
        text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect()
    }

    fn sentences(paragraph: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut rest = paragraph;
        while let Some(caps) = sentence_boundary_regex().captures(rest) {
            let m = caps.get(1).unwrap();
            out.push(m.as_str().trim());
            rest = &rest[m.end()..];
        }
        let tail = rest.trim();
        if !tail.is_empty() {
            out.push(tail);
        }
        if out.is_empty() {
            out.push(paragraph);
        }
        out
    }

    /// Splits text into units no larger than `target_tokens`, walking
    /// paragraph boundaries first, then sentence boundaries, then raw
    /// character positions as a last resort.
    fn units<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut units = Vec::new();
        for paragraph in Self::paragraphs(text) {
            if self.counter.count(paragraph) <= self.target_tokens {
                units.push(paragraph);
                continue;
            }
            for sentence in Self::sentences(paragraph) {
                if self.counter.count(sentence) <= self.target_tokens {
                    units.push(sentence);
                } else {
                    units.extend(self.split_by_char(sentence));
                }
            }
        }
        units
    }

    fn split_by_char<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let approx_chars_per_chunk = (self.target_tokens * 4).max(1);
        let mut out = Vec::new();
        let bytes = text.as_bytes();
        let mut start = 0usize;
        while start < bytes.len() {
            let mut end = (start + approx_chars_per_chunk).min(bytes.len());
            while end < bytes.len() && !text.is_char_boundary(end) {
                end += 1;
            }
            out.push(&text[start..end]);
            start = end;
        }
        out
    }

    pub fn chunk(&self, source_id: &str, text: &str) -> Vec<ContentChunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let units = self.units(text);
        let mut chunks: Vec<(String, usize, usize)> = Vec::new(); // (text, start, end)
        let mut current = String::new();
        let mut current_start = 0usize;
        let mut cursor = 0usize;

        for unit in units {
            let unit_start = match text[cursor..].find(unit) {
                Some(rel) => cursor + rel,
                None => cursor,
            };
            let unit_end = unit_start + unit.len();
            cursor = unit_end;

            if current.is_empty() {
                current_start = unit_start;
                current.push_str(unit);
                continue;
            }

            let prospective_tokens = self.counter.count(&current) + self.counter.count(unit);
            if prospective_tokens > self.target_tokens {
                chunks.push((current.clone(), current_start, unit_start));
                current = carry_overlap(&current, self.overlap_tokens, self.counter.as_ref());
                current_start = unit_start.saturating_sub(current.len());
                current.push(' ');
                current.push_str(unit);
            } else {
                current.push(' ');
                current.push_str(unit);
            }
        }

        if !current.is_empty() {
            chunks.push((current, current_start, text.len()));
        }

        let total = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(idx, (chunk_text, start, end))| ContentChunk {
                source_id: source_id.to_string(),
                chunk_index: idx,
                total_chunks: total,
                token_count: self.counter.count(&chunk_text),
                text: chunk_text,
                start_char: start,
                end_char: end,
            })
            .collect()
    }
}

impl Default for ContentChunker {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_TOKENS, DEFAULT_OVERLAP_TOKENS, Box::new(HeuristicTokenCounter))
    }
}

/// Returns the trailing slice of `text` worth roughly `overlap_tokens`, used
/// to seed the next chunk so adjacent chunks share context.
fn carry_overlap(text: &str, overlap_tokens: usize, counter: &dyn TokenCounter) -> String {
    if overlap_tokens == 0 {
        return String::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut tail = String::new();
    for word in words.iter().rev() {
        let candidate = if tail.is_empty() { word.to_string() } else { format!("{word} {tail}") };
        if counter.count(&candidate) > overlap_tokens {
            break;
        }
        tail = candidate;
    }
    tail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_paragraph_is_one_chunk() {
        let chunker = ContentChunker::default();
        let chunks = chunker.chunk("src-1", "A short paragraph about Rust.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunker = ContentChunker::default();
        assert!(chunker.chunk("src-1", "   ").is_empty());
    }

    #[test]
    fn long_text_splits_into_multiple_chunks() {
        let chunker = ContentChunker::new(20, 5, Box::new(HeuristicTokenCounter));
        let paragraph = "word ".repeat(500);
        let chunks = chunker.chunk("src-1", &paragraph);
        assert!(chunks.len() > 1);
        let total = chunks[0].total_chunks;
        assert!(chunks.iter().all(|c| c.total_chunks == total));
    }

    #[test]
    fn heuristic_counter_is_denser_for_cjk() {
        let counter = HeuristicTokenCounter;
        let latin = "a".repeat(40);
        let cjk: String = std::iter::repeat('한').take(40).collect();
        assert!(counter.count(&cjk) > counter.count(&latin));
    }
}
