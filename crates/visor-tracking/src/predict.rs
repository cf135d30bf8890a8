//! Device-pose resolution for a future timestamp. The platform only
//! predicts so far ahead, and sometimes not at all, so failed queries walk
//! backward in small steps until something answers.

use thiserror::Error;
use visor_spatial::DeviceAnchor;

/// Step size when walking a failed query back in time, seconds.
pub const WALK_BACK_STEP_S: f64 = 0.005;
/// Walk-back retries after the initial attempt.
pub const MAX_WALK_BACK_STEPS: u32 = 20;
/// Cap on how far ahead of now a prediction is requested, seconds.
pub const MAX_PREDICTION_S: f64 = 0.030;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredictError {
    #[error("no device anchor available at or near the requested timestamp")]
    NoAnchorAvailable,
}

/// Resolve a device anchor as close to `target` as the platform allows.
/// Returns the anchor and the timestamp the caller should treat as
/// achieved. After the walk-back is exhausted one last query goes out at
/// the original target, reported as achieved "now".
pub fn resolve_device_anchor<F>(
    query: F,
    target: f64,
    now: f64,
) -> Result<(DeviceAnchor, f64), PredictError>
where
    F: Fn(f64) -> Option<DeviceAnchor>,
{
    let mut walked_back = target;
    for _ in 0..=MAX_WALK_BACK_STEPS {
        if let Some(anchor) = query(walked_back) {
            return Ok((anchor, walked_back));
        }
        walked_back -= WALK_BACK_STEP_S;
    }

    if let Some(anchor) = query(target) {
        return Ok((anchor, now));
    }

    Err(PredictError::NoAnchorAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use std::cell::Cell;

    fn anchor_at(timestamp: f64) -> DeviceAnchor {
        DeviceAnchor {
            origin_from_anchor: Mat4::IDENTITY,
            tracked: true,
            timestamp,
        }
    }

    #[test]
    fn immediate_answer_keeps_target() {
        let calls = Cell::new(0u32);
        let (anchor, achieved) = resolve_device_anchor(
            |ts| {
                calls.set(calls.get() + 1);
                Some(anchor_at(ts))
            },
            10.0,
            9.95,
        )
        .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(achieved, 10.0);
        assert_eq!(anchor.timestamp, 10.0);
    }

    #[test]
    fn walks_back_until_the_platform_answers() {
        let calls = Cell::new(0u32);
        let horizon = 10.0 - 3.0 * WALK_BACK_STEP_S;
        let (anchor, achieved) = resolve_device_anchor(
            |ts| {
                calls.set(calls.get() + 1);
                (ts <= horizon + 1e-9).then(|| anchor_at(ts))
            },
            10.0,
            9.95,
        )
        .unwrap();
        assert_eq!(calls.get(), 4);
        assert!((achieved - horizon).abs() < 1e-9);
        assert!((anchor.timestamp - horizon).abs() < 1e-9);
    }

    #[test]
    fn fallback_reports_now_but_queries_the_original_target() {
        let calls = Cell::new(0u32);
        let (anchor, achieved) = resolve_device_anchor(
            |ts| {
                calls.set(calls.get() + 1);
                // Refuse the whole walk-back, answer the final retry.
                (calls.get() == MAX_WALK_BACK_STEPS + 2).then(|| anchor_at(ts))
            },
            10.0,
            9.95,
        )
        .unwrap();
        assert_eq!(calls.get(), MAX_WALK_BACK_STEPS + 2);
        assert_eq!(achieved, 9.95);
        assert_eq!(anchor.timestamp, 10.0);
    }

    #[test]
    fn total_refusal_is_an_error() {
        let calls = Cell::new(0u32);
        let result = resolve_device_anchor(
            |_| {
                calls.set(calls.get() + 1);
                None
            },
            10.0,
            9.95,
        );
        assert_eq!(result.unwrap_err(), PredictError::NoAnchorAvailable);
        // Initial attempt, twenty walk-backs, one final retry.
        assert_eq!(calls.get(), MAX_WALK_BACK_STEPS + 2);
    }
}
