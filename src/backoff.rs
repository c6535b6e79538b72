use std::time::Duration;

const MAX_BASE_DELAY: Duration = Duration::from_secs(10);

/// Exponential delay before retry number `attempt + 1`, capped at ten
/// seconds, plus up to 25% jitter.
pub fn delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt));
    let capped = exp.min(MAX_BASE_DELAY);
    let jitter_ms = fastrand::u64(0..=capped.as_millis() as u64 / 4);
    capped + Duration::from_millis(jitter_ms)
}
