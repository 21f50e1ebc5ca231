//! Delays between RPC attempts and endpoint cooldowns.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` of a failed node call.
///
/// Attempt 0 is the first try and never waits. Later attempts double from
/// `base_ms` up to `max_ms`, plus up to a tenth of that as jitter so that
/// concurrent callers do not hit the next node in lockstep.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(exponent) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let capped = base_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(max_ms);
    Duration::from_millis(capped.saturating_add(jitter(capped / 10)))
}

fn jitter(range_ms: u64) -> u64 {
    if range_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..range_ms)
}

/// Endpoint cooldown after `failures` consecutive failures: `base × 2^failures`, capped.
///
/// No jitter here, so the earliest expiry in a pool is predictable.
pub fn cooldown_delay(failures: u32, base_ms: u64, max_ms: u64) -> Duration {
    let factor = 2u64.saturating_pow(failures);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}
