use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 120,
        }
    }
}

/// Split text into overlapping fixed-size windows.
///
/// Windows are measured in characters so multibyte text never splits inside a
/// code point. Every chunk except the last is exactly `chunk_size` characters
/// and each window starts `chunk_size - chunk_overlap` characters after the
/// previous one, so dropping the first `chunk_overlap` characters of every
/// chunk after the first reconstructs the input.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let size = config.chunk_size.max(1);
    // overlap >= size would stall the window; clamp so progress is structural.
    let overlap = config.chunk_overlap.min(size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(total);
        chunks.push(chars[start..end].iter().collect());
        if end == total {
            break;
        }
        start = end - overlap;
    }

    chunks
}
