//! Text chunking with configurable size and overlap.

use crate::types::{Chunk, ChunkMetadata, LoadedDocument};
use ragdex_core::config::validate_window;
use ragdex_core::AppResult;

/// Deterministic chunk id for a window starting at `char_start`.
pub fn chunk_id(document_id: &str, char_start: usize) -> String {
    format!("{}::c{}", document_id, char_start)
}

/// Chunk a document into overlapping character windows.
///
/// Windows advance by `window_size - overlap` characters and together cover
/// the text with no gaps. The last window may be shorter than `window_size`.
/// Chunk text is the exact window content (no trimming), so offsets in the
/// metadata always point back into the loaded text.
pub fn chunk_document(
    document: &LoadedDocument,
    window_size: usize,
    overlap: usize,
) -> AppResult<Vec<Chunk>> {
    validate_window(window_size, overlap)?;

    let text = &document.text;
    if text.is_empty() {
        return Ok(vec![]);
    }

    // Byte offset of every char boundary, plus the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let step = window_size - overlap;
    let source_path = document.source_path().to_string();
    let extra: std::collections::BTreeMap<String, String> = document
        .metadata
        .iter()
        .filter(|(k, _)| k.as_str() != "path")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut chunks = Vec::with_capacity(char_count / step + 1);
    let mut start = 0usize;

    loop {
        let end = (start + window_size).min(char_count);

        chunks.push(Chunk {
            chunk_id: chunk_id(&document.document_id, start),
            text: text[boundaries[start]..boundaries[end]].to_string(),
            metadata: ChunkMetadata {
                document_id: document.document_id.clone(),
                source_path: source_path.clone(),
                char_start: start,
                char_end: end,
                window_size,
                overlap,
                extra: extra.clone(),
            },
        });

        if end == char_count {
            break;
        }
        start += step;
    }

    tracing::debug!(
        "Chunked '{}' into {} chunks (size: {}, overlap: {})",
        document.document_id,
        chunks.len(),
        window_size,
        overlap
    );

    Ok(chunks)
}
