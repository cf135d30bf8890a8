//! The tracking session: consumes the runtime's anchor feeds, keeps the
//! shared tracker state, and produces outbound tracking packets on demand.
//!
//! Feed consumers, platform anchor mutation and sink dispatch each run on
//! their own task. All shared state sits behind one mutex which is never
//! held across an await or a platform call, so the pose path stays callable
//! from the render cadence.

use std::sync::{Arc, Mutex};

use glam::Mat4;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use visor_config::TrackingConfig;
use visor_link::{paths, DeviceMotion, Fov, Pose, Skeleton, TrackingPacket, TrackingSink, ViewParams};
use visor_spatial::{
    AnchorKind, AnchorUpdate, HandSnapshot, PlaneClassification, RuntimeError, SpatialRuntime,
    UpdateEvent,
};

use crate::origin::{AnchorCommand, OriginStabilizer, OriginState, FORCE_ADOPT_AFTER_POSES};
use crate::predict::{resolve_device_anchor, PredictError, MAX_PREDICTION_S};
use crate::skeleton::{self, ELBOW_SLOT, FOREARM_SLOT};
use crate::store::AnchorStore;
use crate::transform;

/// Successful sends before a hard prediction failure is treated as tracking
/// loss rather than session warm-up.
pub const TRACKING_LOSS_GRACE_POSES: u64 = 30;

/// Lifecycle signals surfaced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The device pose cannot be resolved or the origin anchor stopped
    /// being tracked. The headset was likely taken off.
    TrackingLost,
    /// The recenter gesture fired and the origin was re-established.
    OriginReset,
}

/// Point-in-time view of the session for logging and diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot {
    pub origin_adopted: bool,
    pub anchor_count: usize,
    pub sent_poses: u64,
}

/// Mutable tracker state behind the session's single lock.
struct TrackerState {
    anchors: AnchorStore,
    origin: OriginState,
    /// Successful tracking sends this session.
    sent_poses: u64,
    /// Timestamp of the most recent hand-anchor update.
    hands_updated_ts: f64,
    /// `hands_updated_ts` at the time of the previous send.
    last_sent_hands_ts: f64,
    last_hand_poses: [Pose; 2],
}

impl TrackerState {
    fn new(config: &TrackingConfig) -> Self {
        Self {
            anchors: AnchorStore::new(),
            origin: OriginState::new(config.recenter_min_gap_s, config.recenter_max_gap_s),
            sent_poses: 0,
            hands_updated_ts: 0.0,
            last_sent_hands_ts: 0.0,
            last_hand_poses: [Pose::IDENTITY; 2],
        }
    }

    /// Hand motion with a linear velocity estimated from the distance the
    /// hand covered between the updates behind this send and the previous
    /// one. Angular velocity is not reported.
    fn hand_motion(&mut self, side: visor_link::Side, pose: Pose) -> DeviceMotion {
        let last = self.last_hand_poses[side.index()];
        let dt = (self.hands_updated_ts - self.last_sent_hands_ts) as f32;
        let linear_velocity = if dt > 0.0 {
            (pose.position - last.position) / dt
        } else {
            glam::Vec3::ZERO
        };
        self.last_hand_poses[side.index()] = pose;
        DeviceMotion {
            device_id: paths::hand_device(side),
            pose,
            linear_velocity,
            angular_velocity: glam::Vec3::ZERO,
        }
    }
}

pub struct TrackingSession {
    runtime: Arc<dyn SpatialRuntime>,
    state: Arc<Mutex<TrackerState>>,
    commands_tx: mpsc::UnboundedSender<AnchorCommand>,
    packets_tx: mpsc::UnboundedSender<TrackingPacket>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl TrackingSession {
    /// Start the runtime's anchor delivery and spawn the consumer tasks.
    /// The returned receiver carries lifecycle events for the host.
    pub fn start(
        runtime: Arc<dyn SpatialRuntime>,
        sink: Arc<dyn TrackingSink>,
        config: &TrackingConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), RuntimeError> {
        let feeds = runtime.start()?;
        let state = Arc::new(Mutex::new(TrackerState::new(config)));
        let stabilizer = OriginStabilizer::new(config.keep_center_fixed);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (packets_tx, packets_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(world_feed(
                feeds.world,
                state.clone(),
                stabilizer,
                commands_tx.clone(),
                events_tx.clone(),
            )),
            tokio::spawn(plane_feed(feeds.planes, state.clone())),
            tokio::spawn(hand_feed(feeds.hands, state.clone())),
            tokio::spawn(mesh_feed(feeds.meshes, state.clone())),
            tokio::spawn(anchor_mutations(commands_rx, runtime.clone())),
            tokio::spawn(dispatch_packets(packets_rx, sink)),
        ];

        Ok((
            Self {
                runtime,
                state,
                commands_tx,
                packets_tx,
                events_tx,
                tasks,
            },
            events_rx,
        ))
    }

    /// Resolve the device pose for `target_timestamp`, convert views and
    /// hands into output space and queue the packet for the sink.
    ///
    /// `reported_timestamp` is the timestamp the remote end is told; it
    /// keeps the full requested prediction even when the platform query had
    /// to be walked back.
    pub fn send_tracking(
        &self,
        eye_transforms: &[Mat4; 2],
        fovs: [Fov; 2],
        target_timestamp: f64,
        reported_timestamp: f64,
    ) -> Result<(), PredictError> {
        let now = self.runtime.now();
        let target = target_timestamp.min(now + MAX_PREDICTION_S);

        let resolved = resolve_device_anchor(
            |timestamp| self.runtime.query_device_anchor(timestamp),
            target,
            now,
        );
        let (device_anchor, achieved) = match resolved {
            Ok(resolved) => resolved,
            Err(error) => {
                let past_grace =
                    self.state.lock().unwrap().sent_poses > TRACKING_LOSS_GRACE_POSES;
                if past_grace {
                    warn!("device pose unresolvable, signalling tracking loss");
                    let _ = self.events_tx.send(SessionEvent::TrackingLost);
                }
                return Err(error);
            }
        };
        trace!(target, achieved, "device pose resolved");

        let hands = self.runtime.latest_hand_anchors();

        let packet = {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;

            // The platform only accepts anchor registration while tracking
            // is fully online, so the fallback origin is registered from
            // here rather than at session start. Once registered, every
            // user recenter surfaces as an update event for it.
            if !state.origin.adopted && state.sent_poses > FORCE_ADOPT_AFTER_POSES {
                let command = state.origin.force_adopt();
                let _ = self.commands_tx.send(command);
            }
            state.sent_poses += 1;

            let reference = state.origin.reference;
            let device_transform =
                transform::output_transform(&reference, &device_anchor.origin_from_anchor);
            let views = [
                ViewParams {
                    pose: Pose::from_transform(&(device_transform * eye_transforms[0])),
                    fov: fovs[0],
                },
                ViewParams {
                    pose: Pose::from_transform(&(device_transform * eye_transforms[1])),
                    fov: fovs[1],
                },
            ];

            let mut motions = Vec::new();
            let mut hand_skeletons: [Option<Skeleton>; 2] = [None, None];
            for side in visor_link::Side::BOTH {
                let Some(anchor) = hands.side(side) else {
                    continue;
                };
                if !anchor.tracked {
                    continue;
                }
                let Some((chirality, hand_skeleton)) = anchor.hand_parts() else {
                    continue;
                };

                let pose = transform::palm_pose(
                    &reference,
                    &anchor.origin_from_anchor,
                    chirality,
                    hand_skeleton,
                );
                motions.push(state.hand_motion(chirality, pose));

                let frame = skeleton::retarget(
                    &reference,
                    &anchor.origin_from_anchor,
                    chirality,
                    hand_skeleton,
                );
                if let Some(frame) = frame {
                    motions.push(DeviceMotion::stationary(
                        paths::forearm_device(chirality),
                        frame[FOREARM_SLOT],
                    ));
                    motions.push(DeviceMotion::stationary(
                        paths::elbow_device(chirality),
                        frame[ELBOW_SLOT],
                    ));
                }
                hand_skeletons[chirality.index()] = frame;
            }
            state.last_sent_hands_ts = state.hands_updated_ts;

            TrackingPacket {
                target_timestamp_ns: secs_to_nanos(reported_timestamp),
                views,
                motions,
                hand_skeletons,
            }
        };

        let _ = self.packets_tx.send(packet);
        Ok(())
    }

    /// Identity view poses keep the downstream video path fed until real
    /// tracking comes online.
    pub fn send_placeholder_tracking(&self, fovs: [Fov; 2], target_timestamp: f64) {
        let packet = TrackingPacket {
            target_timestamp_ns: secs_to_nanos(target_timestamp),
            views: [
                ViewParams {
                    pose: Pose::IDENTITY,
                    fov: fovs[0],
                },
                ViewParams {
                    pose: Pose::IDENTITY,
                    fov: fovs[1],
                },
            ],
            motions: Vec::new(),
            hand_skeletons: [None, None],
        };
        let _ = self.packets_tx.send(packet);
    }

    /// Map a view pose handed back by the remote renderer into a
    /// platform-local transform.
    pub fn remote_view_to_local(&self, eye_transform: &Mat4, view_pose: &Pose) -> Mat4 {
        let reference = self.state.lock().unwrap().origin.reference;
        transform::remote_view_to_local(&reference, eye_transform, view_pose)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().unwrap();
        SessionSnapshot {
            origin_adopted: state.origin.adopted,
            anchor_count: state.anchors.len(),
            sent_poses: state.sent_poses,
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn secs_to_nanos(seconds: f64) -> u64 {
    (seconds * 1_000_000_000.0) as u64
}

async fn world_feed(
    mut updates: mpsc::UnboundedReceiver<AnchorUpdate>,
    state: Arc<Mutex<TrackerState>>,
    stabilizer: OriginStabilizer,
    commands: mpsc::UnboundedSender<AnchorCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    while let Some(update) = updates.recv().await {
        trace!(event = ?update.event, anchor = %update.anchor.id, "world anchor update");
        let effects = {
            let mut guard = state.lock().unwrap();
            let state = &mut *guard;
            stabilizer.on_world_anchor(&mut state.anchors, &mut state.origin, &update)
        };
        if effects.origin_reset {
            let _ = events.send(SessionEvent::OriginReset);
        }
        if effects.tracking_lost {
            let _ = events.send(SessionEvent::TrackingLost);
        }
        for command in effects.commands {
            let _ = commands.send(command);
        }
    }
    debug!("world anchor feed ended");
}

async fn plane_feed(
    mut updates: mpsc::UnboundedReceiver<AnchorUpdate>,
    state: Arc<Mutex<TrackerState>>,
) {
    while let Some(update) = updates.recv().await {
        // Windows reflect and confuse tracking; leave them out entirely.
        if matches!(
            update.anchor.kind,
            AnchorKind::Plane {
                classification: PlaneClassification::Window
            }
        ) {
            continue;
        }
        let mut state = state.lock().unwrap();
        match update.event {
            UpdateEvent::Added | UpdateEvent::Updated => state.anchors.upsert(update.anchor),
            UpdateEvent::Removed => {
                state.anchors.remove(update.anchor.id);
            }
        }
    }
    debug!("plane anchor feed ended");
}

async fn hand_feed(
    mut updates: mpsc::UnboundedReceiver<AnchorUpdate>,
    state: Arc<Mutex<TrackerState>>,
) {
    while let Some(update) = updates.recv().await {
        let mut state = state.lock().unwrap();
        match update.event {
            UpdateEvent::Added | UpdateEvent::Updated => {
                state.hands_updated_ts = update.timestamp;
                state.anchors.upsert(update.anchor);
            }
            UpdateEvent::Removed => {
                state.anchors.remove(update.anchor.id);
            }
        }
    }
    debug!("hand anchor feed ended");
}

async fn mesh_feed(
    mut updates: mpsc::UnboundedReceiver<AnchorUpdate>,
    state: Arc<Mutex<TrackerState>>,
) {
    while let Some(update) = updates.recv().await {
        let mut state = state.lock().unwrap();
        match update.event {
            UpdateEvent::Added | UpdateEvent::Updated => state.anchors.upsert(update.anchor),
            UpdateEvent::Removed => {
                state.anchors.remove(update.anchor.id);
            }
        }
    }
    debug!("mesh anchor feed ended");
}

/// Best-effort platform anchor mutation. Failures are logged and dropped;
/// the reference frame never depends on platform cleanup succeeding.
async fn anchor_mutations(
    mut commands: mpsc::UnboundedReceiver<AnchorCommand>,
    runtime: Arc<dyn SpatialRuntime>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            AnchorCommand::Add(anchor) => {
                let id = anchor.id;
                if let Err(error) = runtime.add_anchor(anchor) {
                    warn!(anchor = %id, %error, "anchor registration failed");
                }
            }
            AnchorCommand::Remove(id) => {
                // Removes fail routinely: the placeholder was often never
                // registered in the first place.
                if let Err(error) = runtime.remove_anchor(id) {
                    debug!(anchor = %id, %error, "anchor removal failed");
                }
            }
        }
    }
    debug!("anchor mutation queue closed");
}

/// Hands packets to the sink off the pose-producing thread.
async fn dispatch_packets(
    mut packets: mpsc::UnboundedReceiver<TrackingPacket>,
    sink: Arc<dyn TrackingSink>,
) {
    while let Some(packet) = packets.recv().await {
        sink.send_tracking(packet);
    }
    debug!("packet dispatch queue closed");
}
