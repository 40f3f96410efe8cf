//! Retry backoff policy: bounded exponential growth plus jitter.

use rand::Rng;

/// Compute the delay in seconds before retry number `attempt` (1-based).
///
/// `min(base * 2^(attempt-1), max)` plus a uniform jitter in
/// `0..=max(1, bounded / 4)` so synchronized failures do not retry in
/// lockstep.
pub fn compute_retry_delay(attempt: u32, base_seconds: u64, max_seconds: u64) -> u64 {
    compute_retry_delay_with(&mut rand::rng(), attempt, base_seconds, max_seconds)
}

/// Same policy with an injected random source, for deterministic tests.
pub fn compute_retry_delay_with<R: Rng + ?Sized>(
    rng: &mut R,
    attempt: u32,
    base_seconds: u64,
    max_seconds: u64,
) -> u64 {
    let exp = base_seconds.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let bounded = exp.min(max_seconds);
    let jitter = rng.random_range(0..=std::cmp::max(1, bounded / 4));
    bounded + jitter
}
