
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

pub const MIN_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 2000;
pub const MAX_OVERLAP_PERCENT: usize = 50;

/// Separator levels from coarse to fine. Text that none of these split is
/// cut into fixed-width character windows.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Configuration for document chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Overlap between adjacent chunks, as a percentage of `chunk_size`
    pub overlap_percent: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap_percent: 50,
        }
    }
}

impl ChunkingConfig {
    /// Overlap in characters derived from the configured percentage.
    #[inline]
    pub fn overlap_chars(&self) -> usize {
        self.chunk_size * self.overlap_percent.min(MAX_OVERLAP_PERCENT) / 100
    }
}

/// Splits text into bounded chunks where each chunk starts with the trailing
/// `overlap` characters of the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSegmenter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSegmenter {
    #[inline]
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(RagError::Validation(format!(
                "chunk size {} must be between {} and {}",
                chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            )));
        }
        if overlap > chunk_size / 2 {
            return Err(RagError::Validation(format!(
                "overlap {} must not exceed half the chunk size ({})",
                overlap,
                chunk_size / 2
            )));
        }

        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.overlap_chars())
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered chunks.
    ///
    /// Every chunk is at most `chunk_size` characters. Dropping the first
    /// `overlap` characters of every chunk after the first and concatenating
    /// the rest gives back `text` exactly.
    #[inline]
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput(
                "cannot split empty or whitespace-only text".to_string(),
            ));
        }

        let chars: Vec<char> = text.chars().collect();

        let monolithic = !SEPARATORS
            .iter()
            .flat_map(|level| level.iter())
            .any(|separator| text.contains(separator));

        let chunks = if monolithic {
            self.fixed_windows(&chars)
        } else {
            let mut segments = Vec::new();
            self.collect_segments(&chars, 0..chars.len(), 0, &mut segments);
            self.pack(&chars, &segments)
        };

        debug!(
            "Split {} characters into {} chunks (size {}, overlap {})",
            chars.len(),
            chunks.len(),
            self.chunk_size,
            self.overlap
        );

        Ok(chunks)
    }

    /// Largest piece that still fits after an overlap seed.
    fn segment_limit(&self) -> usize {
        self.chunk_size - self.overlap
    }

    fn fixed_windows(&self, chars: &[char]) -> Vec<String> {
        let stride = self.segment_limit();
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += stride;
        }

        chunks
    }

    /// Break `range` into contiguous pieces no longer than the segment limit,
    /// descending through the separator levels as needed.
    fn collect_segments(
        &self,
        chars: &[char],
        range: std::ops::Range<usize>,
        level: usize,
        out: &mut Vec<std::ops::Range<usize>>,
    ) {
        let limit = self.segment_limit();
        if range.len() <= limit {
            if !range.is_empty() {
                out.push(range);
            }
            return;
        }

        let Some(separators) = SEPARATORS.get(level) else {
            let mut start = range.start;
            while start < range.end {
                let end = (start + limit).min(range.end);
                out.push(start..end);
                start = end;
            }
            return;
        };

        let pieces = split_after_separators(chars, range.clone(), separators);
        if pieces.len() <= 1 {
            self.collect_segments(chars, range, level + 1, out);
            return;
        }

        for piece in pieces {
            self.collect_segments(chars, piece, level + 1, out);
        }
    }

    /// Greedily pack contiguous segments into chunks, seeding each chunk after
    /// the first with the tail of its predecessor.
    fn pack(&self, chars: &[char], segments: &[std::ops::Range<usize>]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut end = 0;

        for segment in segments {
            if segment.end - start > self.chunk_size {
                chunks.push(chars[start..end].iter().collect());
                // Every segment fits after the seed, so the flushed chunk is
                // always longer than the overlap.
                start = end.saturating_sub(self.overlap);
            }
            end = segment.end;
        }

        if end > start {
            chunks.push(chars[start..end].iter().collect());
        }

        chunks
    }
}

/// Split `range` into pieces that each end with one of `separators`. The last
/// piece holds whatever follows the final separator.
fn split_after_separators(
    chars: &[char],
    range: std::ops::Range<usize>,
    separators: &[&str],
) -> Vec<std::ops::Range<usize>> {
    let patterns: Vec<Vec<char>> = separators.iter().map(|s| s.chars().collect()).collect();
    let mut pieces = Vec::new();
    let mut piece_start = range.start;
    let mut position = range.start;

    while position < range.end {
        let matched = patterns.iter().find(|pattern| {
            position + pattern.len() <= range.end
                && chars[position..position + pattern.len()] == pattern[..]
        });

        if let Some(pattern) = matched {
            position += pattern.len();
            pieces.push(piece_start..position);
            piece_start = position;
        } else {
            position += 1;
        }
    }

    if piece_start < range.end {
        pieces.push(piece_start..range.end);
    }

    pieces
}

/// Convenience wrapper around [`TextSegmenter`].
#[inline]
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    TextSegmenter::new(chunk_size, overlap)?.split(text)
}
