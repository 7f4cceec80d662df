//! Partitioning identifier lists into fixed-capacity batches.

use enrich_core::Identifier;

/// An ordered group of identifiers submitted as one unit of remote work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of this batch in the split
    pub index: usize,
    /// Identifiers in input order
    pub identifiers: Vec<Identifier>,
}

impl Batch {
    /// Number of identifiers in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Whether the batch holds no identifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// One-based batch number, as shown in logs.
    #[must_use]
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Split `identifiers` into batches of at most `max_batch_size`, preserving order.
///
/// Every identifier lands in exactly one batch and only the last batch may be
/// smaller than the limit. Empty input yields no batches. A limit of zero is
/// treated as one.
#[must_use]
pub fn split_batches(identifiers: &[Identifier], max_batch_size: usize) -> Vec<Batch> {
    identifiers
        .chunks(max_batch_size.max(1))
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            identifiers: chunk.to_vec(),
        })
        .collect()
}
