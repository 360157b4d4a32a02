/// Default size (in bytes of UTF-8 text) above which a source file is split.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 1_000_000;

/// Default upper bound for one chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500_000;

/// Default overlap carried between consecutive chunks, so a construct
/// straddling a cut point is whole in at least one chunk.
pub const DEFAULT_CHUNK_OVERLAP: usize = 10_000;

/// Cut boundaries in preference order: class definitions, function
/// definitions, blank lines, newlines, spaces. Raw characters are the
/// final fallback.
const CUT_BOUNDARIES: [&str; 5] = ["\nclass ", "\nfunction ", "\n\n", "\n", " "];

/// Splits plugin source text into bounded, overlapping chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    threshold: usize,
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SPLIT_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(threshold: usize, chunk_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if overlap >= chunk_size {
            return Err(ChunkerError::OverlapTooLarge {
                overlap,
                chunk_size,
            });
        }
        Ok(Self {
            threshold,
            chunk_size,
            overlap,
        })
    }

    /// Split source text into an ordered, non-empty sequence of chunks.
    ///
    /// Text below the threshold is returned whole as a single chunk; empty
    /// input yields exactly one empty chunk so downstream handling stays
    /// uniform. Every produced chunk is at most `chunk_size` bytes and cuts
    /// always land on UTF-8 character boundaries.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.len() < self.threshold {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let rest = &text[start..];
            if rest.len() <= self.chunk_size {
                chunks.push(rest.to_string());
                break;
            }

            let window_end = floor_char_boundary(rest, self.chunk_size);
            let window = &rest[..window_end];
            let cut = best_cut(window, self.overlap);
            chunks.push(window[..cut].to_string());

            // Back up by the overlap so the next chunk re-covers the tail.
            let mut next_start = start + cut.saturating_sub(self.overlap);
            next_start = start + floor_char_boundary(rest, next_start - start);
            if next_start <= start {
                next_start = start + cut;
            }
            start = next_start;
        }

        if chunks.is_empty() {
            chunks.push(String::new());
        }
        chunks
    }
}

/// Find the best cut position in a window: the latest occurrence of the
/// highest-priority boundary that still leaves room to make progress past
/// the overlap. Falls back to a raw character cut at the window end.
fn best_cut(window: &str, min_cut: usize) -> usize {
    for boundary in CUT_BOUNDARIES {
        if let Some(pos) = window.rfind(boundary) {
            if pos > min_cut {
                return pos;
            }
        }
    }
    window.len()
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
}
