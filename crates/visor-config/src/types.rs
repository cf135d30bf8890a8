use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub tracking: TrackingConfig,
    pub view: ViewConfig,
    pub haptics: HapticsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            view: ViewConfig::default(),
            haptics: HapticsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Follow the platform's silent re-centers so the streamed center stays
    /// where the origin anchor is. When false the reference frame is frozen
    /// at session start and platform re-centers shift the world instead.
    pub keep_center_fixed: bool,
    /// Tracking send rate, frames per second.
    pub cadence_hz: f32,
    /// How far ahead of now each frame's poses are requested, seconds.
    /// Capped by the tracker's prediction limit.
    pub requested_prediction_s: f64,
    /// Gap window between origin-anchor updates that counts as one press of
    /// the recenter gesture.
    pub recenter_min_gap_s: f64,
    pub recenter_max_gap_s: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            keep_center_fixed: false,
            cadence_hz: 90.0,
            requested_prediction_s: 0.045,
            recenter_min_gap_s: 0.5,
            recenter_max_gap_s: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Interpupillary distance in millimeters.
    pub ipd_mm: f32,
    pub fov: FovConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            ipd_mm: 63.0,
            fov: FovConfig::default(),
        }
    }
}

/// Per-eye half-angles in degrees, mirrored between the eyes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FovConfig {
    pub outward_deg: f32,
    pub inward_deg: f32,
    pub upward_deg: f32,
    pub downward_deg: f32,
}

impl Default for FovConfig {
    fn default() -> Self {
        Self {
            outward_deg: 49.0,
            inward_deg: 40.0,
            upward_deg: 48.0,
            downward_deg: 48.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HapticsConfig {
    pub enabled: bool,
    /// How often queued vibration requests are turned into pulses, ms.
    pub service_interval_ms: u64,
}

impl Default for HapticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_interval_ms: 32,
        }
    }
}
