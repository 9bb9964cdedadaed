//! Batch size controller.
//!
//! Computes the per-tick send quota from the persisted base batch size,
//! the local hour and the current reputation score. Pure function; the
//! dispatcher supplies all inputs.

/// Hard lower bound on any quota or persisted batch size.
pub const MIN_BATCH_SIZE: i64 = 10;

/// Hard upper bound on any quota or persisted batch size.
pub const MAX_BATCH_SIZE: i64 = 200;

/// Quota cap while reputation is below [`LOW_REPUTATION_THRESHOLD`].
pub const LOW_REPUTATION_CAP: i64 = 25;

/// Quota cap during the peak window, binding over all other adjustments.
pub const PEAK_HOUR_CAP: i64 = 25;

/// Score below which the quota is capped at [`LOW_REPUTATION_CAP`].
pub const LOW_REPUTATION_THRESHOLD: f64 = 0.8;

/// Score above which the quota is relaxed by [`HIGH_REPUTATION_FACTOR`].
pub const HIGH_REPUTATION_THRESHOLD: f64 = 0.95;

const HIGH_REPUTATION_FACTOR: f64 = 1.5;

/// Local peak window: 09:00 inclusive to 17:00 exclusive.
const PEAK_HOURS: std::ops::Range<u32> = 9..17;

/// Compute the send quota for one tick.
///
/// Starts from the persisted base, applies the reputation adjustment,
/// then the peak-hour cap, and finally clamps to
/// `[MIN_BATCH_SIZE, MAX_BATCH_SIZE]`.
pub fn compute(base_batch_size: i64, local_hour: u32, reputation_score: f64) -> i64 {
    let mut quota = base_batch_size;

    if reputation_score < LOW_REPUTATION_THRESHOLD {
        quota = quota.min(LOW_REPUTATION_CAP);
    } else if reputation_score > HIGH_REPUTATION_THRESHOLD {
        quota = ((quota as f64 * HIGH_REPUTATION_FACTOR).min(MAX_BATCH_SIZE as f64)) as i64;
    }

    // The peak cap binds last: even a relaxed quota slows down during
    // business hours.
    if PEAK_HOURS.contains(&local_hour) {
        quota = quota.min(PEAK_HOUR_CAP);
    }

    quota.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_passes_through_off_peak() {
        assert_eq!(compute(50, 3, 0.9), 50);
        assert_eq!(compute(120, 20, 0.9), 120);
    }

    #[test]
    fn test_peak_hours_cap() {
        assert_eq!(compute(100, 9, 0.9), 25);
        assert_eq!(compute(100, 16, 0.9), 25);
        // Window is exclusive at 17
        assert_eq!(compute(100, 17, 0.9), 100);
        assert_eq!(compute(100, 8, 0.9), 100);
    }

    #[test]
    fn test_low_reputation_caps() {
        assert_eq!(compute(100, 20, 0.5), 25);
        // Exactly at the threshold is not "low"
        assert_eq!(compute(100, 20, 0.8), 100);
    }

    #[test]
    fn test_high_reputation_relaxes() {
        assert_eq!(compute(100, 20, 0.96), 150);
        // Relaxation is capped
        assert_eq!(compute(180, 20, 0.99), 200);
        // Exactly at the threshold does not relax
        assert_eq!(compute(100, 20, 0.95), 100);
    }

    #[test]
    fn test_peak_cap_binds_over_relaxation() {
        assert_eq!(compute(100, 10, 0.99), 25);
    }

    #[test]
    fn test_quota_always_within_bounds() {
        for base in [1, 5, 10, 37, 50, 199, 200, 500, 1_000] {
            for hour in 0..24 {
                for score in [0.0, 0.5, 0.79, 0.8, 0.81, 0.95, 0.96, 1.0] {
                    let quota = compute(base, hour, score);
                    assert!(
                        (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&quota),
                        "quota {} out of bounds for base={} hour={} score={}",
                        quota,
                        base,
                        hour,
                        score
                    );
                }
            }
        }
    }
}
