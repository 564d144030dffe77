//! Token-bounded, overlapping transcript chunking.
//!
//! A token is a whitespace-delimited word. Chunk text is its tokens joined by
//! single spaces, so consecutive chunks share exactly `overlap` tokens.

use crate::{
    error::ChunkError,
    types::{Chunk, TranscriptSegment},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBounds {
    pub max_chunk_size: usize,
    pub overlap: usize,
}

impl ChunkBounds {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.max_chunk_size <= self.overlap {
            return Err(ChunkError::DegenerateBounds {
                max_chunk_size: self.max_chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }
}

/// Split segments into chunks of at most `max_chunk_size` tokens, each new
/// chunk seeded with the trailing `overlap` tokens of the previous one.
pub fn split(
    segments: &[TranscriptSegment],
    max_chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkError> {
    if segments.is_empty() {
        return Err(ChunkError::EmptyInput);
    }
    ChunkBounds {
        max_chunk_size,
        overlap,
    }
    .validate()?;

    let tokens: Vec<&str> = segments
        .iter()
        .flat_map(|seg| seg.text.split_whitespace())
        .collect();

    if tokens.is_empty() {
        return Err(ChunkError::EmptyInput);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + max_chunk_size).min(tokens.len());
        let window = &tokens[start..end];
        chunks.push(Chunk {
            index: chunks.len(),
            text: window.join(" "),
            token_count: window.len(),
        });

        if end == tokens.len() {
            break;
        }
        // max_chunk_size > overlap, so this always advances
        start = end - overlap;
    }

    Ok(chunks)
}
