//! Groups evidence items into size-bounded, category-ordered chunks.
//!
//! Each chunk becomes the payload of one analysis job. Items are sorted by
//! category priority (stable among equals), then accumulated greedily: a new
//! chunk starts whenever the next item would push the running total past the
//! byte budget. An item that alone exceeds the budget gets a chunk of its
//! own so it never blocks progress.

use crate::evidence::EvidenceItem;

/// A bounded group of evidence items assigned to one analysis job.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based position within the inspection's chunk sequence.
    pub index: usize,
    /// Cumulative byte size of the items.
    pub total_bytes: u64,
    pub items: Vec<EvidenceItem>,
}

/// Partitions `items` into ordered chunks, each within `max_chunk_bytes`
/// unless a single item alone exceeds it.
///
/// Concatenating the returned chunks' items reproduces the priority-sorted
/// input exactly. An empty input yields an empty list.
///
/// # Panics
/// Panics if `max_chunk_bytes` is 0.
pub fn build_chunks(items: &[EvidenceItem], max_chunk_bytes: u64) -> Vec<Chunk> {
    assert!(max_chunk_bytes > 0, "max_chunk_bytes must be > 0");

    let mut sorted: Vec<EvidenceItem> = items.to_vec();
    // Stable sort keeps upload order among items of equal priority.
    sorted.sort_by_key(|item| item.category.priority());

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<EvidenceItem> = Vec::new();
    let mut current_bytes: u64 = 0;

    for item in sorted {
        if !current.is_empty() && current_bytes + item.byte_size > max_chunk_bytes {
            chunks.push(Chunk {
                index: chunks.len() + 1,
                total_bytes: current_bytes,
                items: std::mem::take(&mut current),
            });
            current_bytes = 0;
        }
        current_bytes += item.byte_size;
        current.push(item);
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len() + 1,
            total_bytes: current_bytes,
            items: current,
        });
    }

    chunks
}
