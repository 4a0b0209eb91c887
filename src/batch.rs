//! Order-preserving partitioning of id sequences into bounded batches.

use ahash::AHashSet;
use std::hash::Hash;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Splits `items` into consecutive chunks of at most `size` elements.
///
/// Empty input yields no batches. A `size` of zero is treated as one so the
/// result never contains an empty batch.
pub fn partition<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items
        .chunks(size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

pub fn batch_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}

/// Drops repeated values while keeping the first occurrence in place.
pub fn dedup_preserving_order<T>(items: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Clone + Eq + Hash,
{
    let mut seen = AHashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
