//! Wire-facing types shared by the tracking and input layers: poses, device
//! motions, view parameters, button values, the stable path-id registry and
//! the sink trait everything is delivered through.

pub mod paths;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Left/right hand identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub const fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// -1 for left, +1 for right. Used for mirrored offsets.
    pub const fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    pub const fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Orientation plus position, the unit every device pose is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    /// Rotation and translation of an affine transform, scale discarded.
    pub fn from_transform(transform: &Mat4) -> Self {
        Self {
            orientation: Quat::from_mat4(transform),
            position: transform.w_axis.truncate(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.orientation.is_finite() && self.position.is_finite()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A device pose together with its velocity estimates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceMotion {
    pub device_id: u64,
    pub pose: Pose,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl DeviceMotion {
    /// Motion with zero velocities, for devices we only know a pose for.
    pub fn stationary(device_id: u64, pose: Pose) -> Self {
        Self {
            device_id,
            pose,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// Per-eye field of view, half-angles in radians. Left and down are negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fov {
    pub left: f32,
    pub right: f32,
    pub up: f32,
    pub down: f32,
}

/// One eye's pose and projection for a tracking frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViewParams {
    pub pose: Pose,
    pub fov: Fov,
}

/// Joint count of the outbound hand skeleton layout: one root slot, 25
/// finger/wrist slots and two arm stand-ins.
pub const SKELETON_JOINT_COUNT: usize = 28;

/// A full outbound hand skeleton frame. Never sent partially filled.
pub type Skeleton = [Pose; SKELETON_JOINT_COUNT];

/// Everything reported upstream for one target timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingPacket {
    /// Timestamp the poses are predicted for, nanoseconds.
    pub target_timestamp_ns: u64,
    pub views: [ViewParams; 2],
    pub motions: Vec<DeviceMotion>,
    pub hand_skeletons: [Option<Skeleton>; 2],
}

/// Value carried by a logical button emission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ButtonValue {
    Binary(bool),
    Scalar(f32),
}

/// Outbound seam to the remote end. Implementations must tolerate being
/// called from the render cadence, so sends have to be cheap or deferred.
pub trait TrackingSink: Send + Sync {
    fn send_tracking(&self, packet: TrackingPacket);
    fn send_button(&self, path: u64, value: ButtonValue);
}

/// Sink that logs packet summaries instead of transmitting anything.
pub struct LogSink;

impl TrackingSink for LogSink {
    fn send_tracking(&self, packet: TrackingPacket) {
        tracing::debug!(
            target_ns = packet.target_timestamp_ns,
            motions = packet.motions.len(),
            left_skeleton = packet.hand_skeletons[0].is_some(),
            right_skeleton = packet.hand_skeletons[1].is_some(),
            "tracking packet"
        );
    }

    fn send_button(&self, path: u64, value: ButtonValue) {
        tracing::debug!(path = format_args!("{path:#x}"), ?value, "button emission");
    }
}
