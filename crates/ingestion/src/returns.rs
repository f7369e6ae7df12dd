//! Log-return computation.
//!
//! A non-finite log-return (zero or negative close, 0/0) becomes exactly 0.
//! Downstream features rely on that value, so it is not a numerical accident.

/// Log-return between two consecutive closes and whether it had to be coerced.
#[inline]
pub fn log_return(prev_close: f64, close: f64) -> (f64, bool) {
    let ret = (close / prev_close).ln();
    if ret.is_finite() {
        (ret, false)
    } else {
        (0.0, true)
    }
}

/// Log-returns of a close sequence. The first close has no predecessor, so the
/// output is one element shorter than the input.
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|pair| log_return(pair[0], pair[1]).0)
        .collect()
}
