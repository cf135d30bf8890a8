//! Spatial tracking for the streaming client: keeps a stable world origin
//! across the platform's silent re-centers, converts device and hand poses
//! into the outbound coordinate convention, retargets hand skeletons onto
//! the fixed joint layout and resolves per-frame pose predictions.

pub mod origin;
pub mod predict;
pub mod session;
pub mod skeleton;
pub mod store;
pub mod transform;

pub use origin::{OriginState, OriginStabilizer, RecenterDetector};
pub use predict::PredictError;
pub use session::{SessionEvent, SessionSnapshot, TrackingSession};
pub use store::AnchorStore;
