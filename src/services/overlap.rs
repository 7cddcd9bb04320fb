/// Half-open interval intersection on minutes-of-day: `[a_start, a_end)` against
/// `[b_start, b_end)`. Touching intervals and zero-length intervals never overlap.
pub fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < a_end && b_start < b_end && a_start < b_end && a_end > b_start
}
