/// Slice `seq` into fixed-size pages. `page_index` is 1-based and assumed
/// already clamped to `[1, total_pages]` by the caller; this function only
/// clips the end bound to the sequence length.
///
/// `total_pages` is at least 1 even for an empty sequence, so callers never
/// see a zero-page state.
pub fn page<T>(seq: &[T], page_size: usize, page_index: usize) -> (&[T], usize) {
    assert!(page_size > 0, "page_size must be at least 1");

    let total_pages = seq.len().div_ceil(page_size).max(1);
    let start = ((page_index - 1) * page_size).min(seq.len());
    let end = (start + page_size).min(seq.len());
    (&seq[start..end], total_pages)
}
