//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate the delay before retry `attempt` (1-based).
///
/// The nominal delay is `base * 2^(attempt-1)`, capped at `max`, then scaled
/// by a factor drawn uniformly from `[1 - jitter_ratio, 1 + jitter_ratio]`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, jitter_ratio: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(attempt - 1);
    let capped_delay = base.saturating_mul(exponential_base).min(max);

    let jitter_ratio = jitter_ratio.clamp(0.0, 1.0);
    if jitter_ratio == 0.0 || capped_delay.is_zero() {
        return capped_delay;
    }

    let factor = rand::thread_rng().gen_range((1.0 - jitter_ratio)..=(1.0 + jitter_ratio));
    capped_delay.mul_f64(factor)
}
