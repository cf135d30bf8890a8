//! Platform-facing seam for spatial data: anchors, anchor update feeds, the
//! on-demand device (head) pose query and best-effort anchor mutation. The
//! tracking layer consumes this trait; a simulated runtime stands in where no
//! headset hardware is present.

pub mod hand;
pub mod sim;

pub use hand::{HandJoint, HandJointId, HandSkeleton};
pub use sim::SimulatedRuntime;

use std::fmt;

use glam::Mat4;
use thiserror::Error;
use tokio::sync::mpsc;
use visor_link::Side;

/// Platform anchor identity. Locally-minted ids live in the top half of the
/// id space, clear of platform-assigned ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Surface label attached to plane anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneClassification {
    Wall,
    Floor,
    Ceiling,
    Table,
    Seat,
    Window,
    Unknown,
}

/// What kind of thing an anchor is pinned to.
#[derive(Debug, Clone)]
pub enum AnchorKind {
    World,
    Plane {
        classification: PlaneClassification,
    },
    Hand {
        chirality: Side,
        skeleton: Option<HandSkeleton>,
    },
    Mesh,
}

/// One tracked spatial entity as last reported by the platform.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub id: AnchorId,
    /// Platform-origin-to-anchor transform.
    pub origin_from_anchor: Mat4,
    pub tracked: bool,
    /// Platform timebase, seconds.
    pub timestamp: f64,
    pub kind: AnchorKind,
}

impl Anchor {
    pub fn world(id: AnchorId, origin_from_anchor: Mat4, tracked: bool, timestamp: f64) -> Self {
        Self {
            id,
            origin_from_anchor,
            tracked,
            timestamp,
            kind: AnchorKind::World,
        }
    }

    /// World anchor at the platform origin, not yet tracked by anything.
    pub fn identity_world(id: AnchorId, timestamp: f64) -> Self {
        Self::world(id, Mat4::IDENTITY, false, timestamp)
    }

    pub fn distance_from_origin(&self) -> f32 {
        self.origin_from_anchor.w_axis.truncate().length()
    }

    pub fn distance_to(&self, other: &Anchor) -> f32 {
        (self.origin_from_anchor.w_axis.truncate() - other.origin_from_anchor.w_axis.truncate())
            .length()
    }

    pub fn is_world(&self) -> bool {
        matches!(self.kind, AnchorKind::World)
    }

    /// Chirality and skeleton for hand anchors, `None` otherwise.
    pub fn hand_parts(&self) -> Option<(Side, Option<&HandSkeleton>)> {
        match &self.kind {
            AnchorKind::Hand {
                chirality,
                skeleton,
            } => Some((*chirality, skeleton.as_ref())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    Added,
    Updated,
    Removed,
}

/// One entry from an anchor update feed.
#[derive(Debug, Clone)]
pub struct AnchorUpdate {
    pub event: UpdateEvent,
    pub anchor: Anchor,
    /// When the platform emitted the event, its timebase, seconds.
    pub timestamp: f64,
}

/// Head pose answer from the on-demand query.
#[derive(Debug, Clone, Copy)]
pub struct DeviceAnchor {
    pub origin_from_anchor: Mat4,
    pub tracked: bool,
    pub timestamp: f64,
}

/// Most recent hand anchors, one slot per side.
#[derive(Debug, Clone, Default)]
pub struct HandSnapshot {
    pub left: Option<Anchor>,
    pub right: Option<Anchor>,
}

impl HandSnapshot {
    pub fn side(&self, side: Side) -> Option<&Anchor> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }
}

/// The four anchor update feeds a started runtime delivers.
pub struct AnchorFeeds {
    pub world: mpsc::UnboundedReceiver<AnchorUpdate>,
    pub planes: mpsc::UnboundedReceiver<AnchorUpdate>,
    pub hands: mpsc::UnboundedReceiver<AnchorUpdate>,
    pub meshes: mpsc::UnboundedReceiver<AnchorUpdate>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("spatial capability unavailable or denied: {0}")]
    CapabilityDenied(String),
    #[error("runtime already started")]
    AlreadyStarted,
    #[error("anchor mutation rejected: {0}")]
    AnchorMutation(String),
}

/// A platform spatial runtime. All methods are callable from any thread;
/// `start` may only succeed once per session.
pub trait SpatialRuntime: Send + Sync {
    /// Begin anchor delivery. Failures here are fatal for the session.
    fn start(&self) -> Result<AnchorFeeds, RuntimeError>;

    /// Predicted head pose for `timestamp`, or `None` when the platform
    /// cannot answer (too far ahead, warming up, headset off).
    fn query_device_anchor(&self, timestamp: f64) -> Option<DeviceAnchor>;

    /// Latest hand anchors without waiting on the feed.
    fn latest_hand_anchors(&self) -> HandSnapshot;

    /// Register an anchor with the platform so it persists and re-surfaces
    /// in the world feed.
    fn add_anchor(&self, anchor: Anchor) -> Result<(), RuntimeError>;

    fn remove_anchor(&self, id: AnchorId) -> Result<(), RuntimeError>;

    /// Session clock, seconds. The timebase anchor timestamps use.
    fn now(&self) -> f64;
}
