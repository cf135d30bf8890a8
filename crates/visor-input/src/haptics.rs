//! Haptic pulse shaping and playback. Each hand holds at most one pending
//! vibration request; a servicing tick shapes it into a bounded continuous
//! pulse and plays it on a lazily-acquired per-hand engine. Engine failures
//! are self-healing, never propagated.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use visor_link::Side;

/// Shortest pulse the engine will accept, seconds.
pub const MIN_PULSE_S: f64 = 0.032;
/// Longest single pulse; longer requests are refreshed by later requests.
pub const MAX_PULSE_S: f64 = 0.5;

/// Preferred engine locality per hand.
pub const LOCALITY_LEFT: &str = "left-handle";
pub const LOCALITY_RIGHT: &str = "right-handle";
/// Last-resort locality covering every actuator the device has.
pub const LOCALITY_ALL: &str = "all";

/// A time-windowed vibration request for one hand. Only the most recent
/// request per hand is honored; new requests replace pending ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticRequest {
    pub start_s: f64,
    pub end_s: f64,
    /// Clamped to [0, 1] when shaped.
    pub amplitude: f32,
    /// Carried on the wire but not shaped into the pulse; engines play at a
    /// fixed pitch.
    pub frequency: f32,
}

/// One shaped pulse ready for playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticPulse {
    pub amplitude: f32,
    pub duration_s: f64,
    /// Always maximum; the remote end conveys texture through amplitude.
    pub sharpness: f32,
}

/// Bound a request into a playable pulse. Stale requests (negative window
/// or already over at `now`) still produce a pulse, just a silent
/// floor-length one, so the engine pipeline stays warm.
pub fn shape_pulse(request: &HapticRequest, now: f64) -> HapticPulse {
    let mut duration = request.end_s - request.start_s;
    let mut amplitude = request.amplitude.clamp(0.0, 1.0);
    if duration < 0.0 || request.end_s < now {
        amplitude = 0.0;
        duration = MIN_PULSE_S;
    }
    HapticPulse {
        amplitude,
        duration_s: duration.clamp(MIN_PULSE_S, MAX_PULSE_S),
        sharpness: 1.0,
    }
}

#[derive(Debug, Error)]
pub enum HapticError {
    #[error("haptic playback failed: {0}")]
    Playback(String),
}

/// A started platform haptic engine bound to one locality.
pub trait HapticEngine: Send {
    fn play(&mut self, pulse: &HapticPulse) -> Result<(), HapticError>;
}

/// Access to the platform's haptic engines, keyed by locality name.
pub trait HapticProvider: Send + Sync {
    /// Locality names the connected hardware advertises.
    fn localities(&self) -> Vec<String>;

    /// Create and start an engine for the named locality, `None` when the
    /// hardware has nothing under that name.
    fn engine(&self, locality: &str) -> Option<Box<dyn HapticEngine>>;
}

const fn side_locality(side: Side) -> &'static str {
    match side {
        Side::Left => LOCALITY_LEFT,
        Side::Right => LOCALITY_RIGHT,
    }
}

const fn side_hint(side: Side) -> &'static str {
    match side {
        Side::Left => "(l)",
        Side::Right => "(r)",
    }
}

/// Exact side locality first, then any locality whose name hints at the
/// side, then everything-at-once.
fn acquire_engine(provider: &dyn HapticProvider, side: Side) -> Option<Box<dyn HapticEngine>> {
    if let Some(engine) = provider.engine(side_locality(side)) {
        return Some(engine);
    }
    for locality in provider.localities() {
        if locality.to_lowercase().contains(side_hint(side)) {
            if let Some(engine) = provider.engine(&locality) {
                debug!(?side, locality, "haptic engine acquired by name hint");
                return Some(engine);
            }
        }
    }
    provider.engine(LOCALITY_ALL)
}

#[derive(Default)]
struct Lane {
    request: Option<HapticRequest>,
    engine: Option<Box<dyn HapticEngine>>,
}

/// Per-hand vibration state: latest request, lazily-acquired engine.
pub struct HapticScheduler {
    provider: Arc<dyn HapticProvider>,
    lanes: [Lane; 2],
}

impl HapticScheduler {
    pub fn new(provider: Arc<dyn HapticProvider>) -> Self {
        Self {
            provider,
            lanes: [Lane::default(), Lane::default()],
        }
    }

    /// Replace whatever is pending for the hand. Requests are never queued.
    pub fn request(&mut self, side: Side, request: HapticRequest) {
        self.lanes[side.index()].request = Some(request);
    }

    /// Shape and play the pending pulse for each hand. A playback failure
    /// drops the engine; the next tick re-acquires it.
    pub fn service(&mut self, now: f64) {
        for side in Side::BOTH {
            let lane = &mut self.lanes[side.index()];
            let Some(request) = lane.request else {
                continue;
            };
            let pulse = shape_pulse(&request, now);

            if lane.engine.is_none() {
                lane.engine = acquire_engine(self.provider.as_ref(), side);
                if lane.engine.is_none() {
                    debug!(?side, "no haptic engine available");
                    continue;
                }
            }
            if let Some(engine) = &mut lane.engine {
                if let Err(error) = engine.play(&pulse) {
                    warn!(?side, %error, "haptic playback failed, discarding engine");
                    lane.engine = None;
                }
            }
        }
    }
}

/// Provider whose engines log pulses instead of vibrating anything. Stands
/// in where no controller hardware is attached.
pub struct LogHapticProvider;

struct LogEngine {
    locality: String,
}

impl HapticEngine for LogEngine {
    fn play(&mut self, pulse: &HapticPulse) -> Result<(), HapticError> {
        debug!(
            locality = self.locality,
            amplitude = pulse.amplitude,
            duration_s = pulse.duration_s,
            "haptic pulse"
        );
        Ok(())
    }
}

impl HapticProvider for LogHapticProvider {
    fn localities(&self) -> Vec<String> {
        vec![LOCALITY_LEFT.into(), LOCALITY_RIGHT.into(), LOCALITY_ALL.into()]
    }

    fn engine(&self, locality: &str) -> Option<Box<dyn HapticEngine>> {
        Some(Box::new(LogEngine {
            locality: locality.to_owned(),
        }))
    }
}

/// Runs the scheduler: consumes requests as they arrive and services the
/// lanes on a fixed tick.
pub async fn run_haptics_loop<C>(
    mut scheduler: HapticScheduler,
    mut requests: mpsc::UnboundedReceiver<(Side, HapticRequest)>,
    tick: Duration,
    now: C,
) where
    C: Fn() -> f64 + Send + 'static,
{
    let mut ticker = tokio::time::interval(tick);
    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some((side, request)) => scheduler.request(side, request),
                None => break,
            },
            _ = ticker.tick() => scheduler.service(now()),
        }
    }
    debug!("haptic request channel closed");
}
