//! Round-robin batching over a queue's candidate list, and the proportional
//! split of a shared per-cycle budget between the two queues.

/// Returns the next batch starting at `cursor`, plus the cursor to persist.
///
/// The batch is clipped at the end of the list and never padded from the
/// front. A cursor at or past the end (the list shrank since the last cycle)
/// restarts from the beginning. The returned cursor is always `< items.len()`,
/// or `0` for an empty list.
pub fn slice_batch<T>(items: &[T], cursor: usize, batch_size: usize) -> (&[T], usize) {
    if items.is_empty() {
        return (&[], 0);
    }

    let start = if cursor >= items.len() { 0 } else { cursor };
    let end = start.saturating_add(batch_size).min(items.len());
    let batch = &items[start..end];

    let mut next = start + batch.len();
    if next >= items.len() {
        next = 0;
    }
    (batch, next)
}

/// Shrinks the two requested batch sizes so their sum fits `hard_max`.
///
/// `hard_max == 0` means unlimited. The missing share is rounded down and the
/// cutoff queue takes the remainder, so the sum is exactly `hard_max` whenever
/// capping applies.
pub fn cap_batch_sizes(missing: usize, cutoff: usize, hard_max: usize) -> (usize, usize) {
    let total = missing + cutoff;
    if hard_max == 0 || total <= hard_max {
        return (missing, cutoff);
    }

    let missing_effective = (missing as u128 * hard_max as u128 / total as u128) as usize;
    (missing_effective, hard_max - missing_effective)
}
