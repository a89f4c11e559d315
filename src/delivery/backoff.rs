//! Retry delays
//!
//! Delays are exponentially distributed (`-ln(1 - U)`) and scaled by the
//! square of the one-based round number.

use std::time::Duration;

use rand::Rng;

/// Scale of one unit of jitter
pub const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Delay before the next attempt after a failure in `round` (zero-based)
pub fn backoff_delay<R: Rng + ?Sized>(rng: &mut R, base: Duration, round: usize) -> Duration {
    let u: f64 = rng.gen();
    let jitter = -(1.0 - u).ln();
    if jitter <= 0.0 {
        return Duration::ZERO;
    }
    let scale = ((round + 1) * (round + 1)) as f64;
    base.mul_f64(jitter * scale)
}
