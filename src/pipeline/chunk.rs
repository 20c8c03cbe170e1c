use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ChunkerConfig;
use crate::domain::{CombinedUpdate, ContentChunk};

/// Splits document content into bounded chunks. Splitting is deterministic:
/// the same document and configuration always produce the same chunk set,
/// and concatenating a document's chunks in chunk_id order reproduces the
/// content exactly. Boundary preference: paragraph break, then sentence end,
/// then whitespace, then a hard cut at the limit.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk one combined update. Empty content produces zero chunks; the
    /// caller reports that as a run warning.
    pub fn chunk(&self, update: &CombinedUpdate) -> Vec<ContentChunk> {
        let content = &update.update.full_content;
        if content.is_empty() {
            return Vec::new();
        }

        let pieces = self.split_content(content);
        let reference = &update.update.reference_number;
        let chunks: Vec<ContentChunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(seq, piece)| ContentChunk {
                chunk_id: chunk_id(reference, seq as u32),
                reference_number: reference.clone(),
                seq: seq as u32,
                regulator: update.regulator,
                title: update.update.title.clone(),
                document_type: update.update.document_type,
                publication_date: update.update.publication_date,
                source_url: update.update.source_url.clone(),
                content: piece,
            })
            .collect();

        crate::observability::metrics::chunker::chunks_produced(chunks.len() as u64);
        debug!(
            reference = %reference,
            chunks = chunks.len(),
            "chunked document content"
        );
        chunks
    }

    fn split_content(&self, content: &str) -> Vec<String> {
        let max_chars = self.config.max_chunk_chars;
        let mut pieces = Vec::new();
        let mut rest = content;

        while !rest.is_empty() {
            let window_end = match rest.char_indices().nth(max_chars) {
                Some((byte_idx, _)) => byte_idx,
                // Fewer than max_chars characters remain
                None => {
                    pieces.push(rest.to_string());
                    break;
                }
            };
            let cut = find_cut(&rest[..window_end]);
            pieces.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }

        pieces
    }
}

/// Deterministic chunk id: parent reference plus zero-padded sequence.
fn chunk_id(reference_number: &str, seq: u32) -> String {
    format!("{reference_number}#{seq:04}")
}

/// Orders chunk ids in document order. Plain string comparison would put
/// "#10000" before "#9999" once the sequence outgrows the zero pad; comparing
/// length first keeps the numeric order (ids under one reference share the
/// same prefix, so a longer id always carries a larger sequence).
pub fn compare_chunk_ids(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// SHA-256 digest of document content, recorded per document so re-runs can
/// be verified idempotent without diffing full text.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pick a cut position within a full window of text. Always returns a
/// non-zero byte offset on a char boundary so the caller makes progress.
fn find_cut(window: &str) -> usize {
    // Paragraph break: keep the separator with the preceding chunk
    if let Some(pos) = window.rfind("\n\n") {
        if pos > 0 {
            return pos + 2;
        }
    }

    // Sentence end: punctuation followed by whitespace
    let mut sentence_cut = None;
    let mut prev: Option<(usize, char)> = None;
    for (idx, ch) in window.char_indices() {
        if let Some((prev_idx, prev_ch)) = prev {
            if matches!(prev_ch, '.' | '!' | '?') && ch.is_whitespace() && prev_idx > 0 {
                sentence_cut = Some(prev_idx + prev_ch.len_utf8());
            }
        }
        prev = Some((idx, ch));
    }
    if let Some(cut) = sentence_cut {
        return cut;
    }

    // Last whitespace
    if let Some((idx, ch)) = window
        .char_indices()
        .rev()
        .find(|(idx, ch)| *idx > 0 && ch.is_whitespace())
    {
        return idx + ch.len_utf8();
    }

    // Hard cut at the limit
    window.len()
}
