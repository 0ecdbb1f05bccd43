//! Warmup trimming by event count.
//!
//! Early operations of a run are slower while caches, connections and JIT
//! compilers settle. Dropping a fixed fraction of the leading events removes
//! those transients from latency samples.

/// Index of the first element kept after trimming `warmup_fraction` of `len`
///
/// The result is always within `0..=len`; fractions outside `[0, 1]` (or NaN)
/// degrade to keeping everything or nothing instead of failing.
pub fn warmup_cutoff(len: usize, warmup_fraction: f64) -> usize {
    // `as usize` saturates: negative and NaN become 0.
    let cutoff = (len as f64 * warmup_fraction).floor() as usize;
    cutoff.min(len)
}

/// Return the suffix of `sequence` that starts at `floor(len * warmup_fraction)`
pub fn trim<T>(sequence: &[T], warmup_fraction: f64) -> &[T] {
    &sequence[warmup_cutoff(sequence.len(), warmup_fraction)..]
}
