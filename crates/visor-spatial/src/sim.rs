//! Simulated spatial runtime for running the client without headset
//! hardware. Emits a plausible environment: one world anchor near the start
//! point, a floor and a window plane, a mesh chunk and two waving hands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::{Mat4, Quat, Vec3};
use tokio::sync::mpsc;
use tracing::debug;
use visor_link::Side;

use crate::hand::{HandJoint, HandJointId, HandSkeleton};
use crate::{
    Anchor, AnchorFeeds, AnchorId, AnchorKind, AnchorUpdate, DeviceAnchor, HandSnapshot,
    PlaneClassification, RuntimeError, SpatialRuntime, UpdateEvent,
};

const TICK: Duration = Duration::from_millis(10);
/// Ticks before the first world anchor shows up.
const WORLD_ANCHOR_TICK: u64 = 50;
/// Re-observation period for registered world anchors, in ticks.
const WORLD_UPDATE_PERIOD: u64 = 200;
const PLANE_TICK: u64 = 100;
const MESH_TICK: u64 = 150;
/// Hand updates run at roughly a third of the tick rate.
const HAND_PERIOD: u64 = 3;

/// Head queries fail during warm-up, matching a session that is still
/// coming online.
const WARMUP_S: f64 = 0.25;
/// How far ahead of now the head query will answer.
const QUERY_HORIZON_S: f64 = 0.035;

const WORLD_ANCHOR_ID: AnchorId = AnchorId(1);
const LEFT_HAND_ID: AnchorId = AnchorId(2);
const RIGHT_HAND_ID: AnchorId = AnchorId(3);
const FLOOR_ID: AnchorId = AnchorId(4);
const WINDOW_ID: AnchorId = AnchorId(5);
const MESH_ID: AnchorId = AnchorId(6);

#[derive(Clone)]
pub struct SimulatedRuntime {
    inner: Arc<Inner>,
}

struct Inner {
    epoch: Instant,
    state: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    started: bool,
    /// Anchors the platform knows about, its own and client-registered ones.
    registered: HashMap<AnchorId, Anchor>,
    hands: HandSnapshot,
    world_tx: Option<mpsc::UnboundedSender<AnchorUpdate>>,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                state: Mutex::new(SimState::default()),
            }),
        }
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialRuntime for SimulatedRuntime {
    fn start(&self) -> Result<AnchorFeeds, RuntimeError> {
        let (world_tx, world_rx) = mpsc::unbounded_channel();
        let (planes_tx, planes_rx) = mpsc::unbounded_channel();
        let (hands_tx, hands_rx) = mpsc::unbounded_channel();
        let (meshes_tx, meshes_rx) = mpsc::unbounded_channel();

        {
            let mut state = self.inner.state.lock().unwrap();
            if state.started {
                return Err(RuntimeError::AlreadyStarted);
            }
            state.started = true;
            state.world_tx = Some(world_tx.clone());
        }

        tokio::spawn(
            Driver {
                inner: self.inner.clone(),
                world: world_tx,
                planes: planes_tx,
                hands: hands_tx,
                meshes: meshes_tx,
            }
            .run(),
        );

        debug!("simulated spatial runtime started");
        Ok(AnchorFeeds {
            world: world_rx,
            planes: planes_rx,
            hands: hands_rx,
            meshes: meshes_rx,
        })
    }

    fn query_device_anchor(&self, timestamp: f64) -> Option<DeviceAnchor> {
        let now = self.now();
        if now < WARMUP_S || timestamp > now + QUERY_HORIZON_S {
            return None;
        }
        Some(DeviceAnchor {
            origin_from_anchor: head_transform(timestamp),
            tracked: true,
            timestamp,
        })
    }

    fn latest_hand_anchors(&self) -> HandSnapshot {
        self.inner.state.lock().unwrap().hands.clone()
    }

    fn add_anchor(&self, mut anchor: Anchor) -> Result<(), RuntimeError> {
        let now = self.now();
        let mut state = self.inner.state.lock().unwrap();
        anchor.tracked = true;
        anchor.timestamp = now;
        state.registered.insert(anchor.id, anchor.clone());
        // Registration surfaces in the world feed like any platform anchor.
        if anchor.is_world() {
            if let Some(tx) = &state.world_tx {
                let _ = tx.send(AnchorUpdate {
                    event: UpdateEvent::Added,
                    anchor,
                    timestamp: now,
                });
            }
        }
        Ok(())
    }

    fn remove_anchor(&self, id: AnchorId) -> Result<(), RuntimeError> {
        let mut state = self.inner.state.lock().unwrap();
        state
            .registered
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::AnchorMutation(format!("unknown anchor {id}")))
    }

    fn now(&self) -> f64 {
        self.inner.epoch.elapsed().as_secs_f64()
    }
}

struct Driver {
    inner: Arc<Inner>,
    world: mpsc::UnboundedSender<AnchorUpdate>,
    planes: mpsc::UnboundedSender<AnchorUpdate>,
    hands: mpsc::UnboundedSender<AnchorUpdate>,
    meshes: mpsc::UnboundedSender<AnchorUpdate>,
}

impl Driver {
    async fn run(self) {
        let mut ticker = tokio::time::interval(TICK);
        let mut tick: u64 = 0;
        let mut hands_announced = false;

        'drive: loop {
            ticker.tick().await;
            tick += 1;
            let now = self.inner.epoch.elapsed().as_secs_f64();

            if tick == WORLD_ANCHOR_TICK {
                let anchor = Anchor::world(
                    WORLD_ANCHOR_ID,
                    Mat4::from_translation(Vec3::new(0.4, 0.0, -0.2)),
                    true,
                    now,
                );
                self.inner
                    .state
                    .lock()
                    .unwrap()
                    .registered
                    .insert(anchor.id, anchor.clone());
                if self.send_world(anchor, UpdateEvent::Added, now).is_err() {
                    break;
                }
            }

            if tick > WORLD_ANCHOR_TICK && tick % WORLD_UPDATE_PERIOD == 0 {
                let registered: Vec<Anchor> = {
                    let state = self.inner.state.lock().unwrap();
                    state
                        .registered
                        .values()
                        .filter(|anchor| anchor.is_world())
                        .cloned()
                        .collect()
                };
                for mut anchor in registered {
                    anchor.timestamp = now;
                    if self.send_world(anchor, UpdateEvent::Updated, now).is_err() {
                        break 'drive;
                    }
                }
            }

            if tick == PLANE_TICK {
                let floor = plane_anchor(FLOOR_ID, PlaneClassification::Floor, Mat4::IDENTITY, now);
                let window = plane_anchor(
                    WINDOW_ID,
                    PlaneClassification::Window,
                    Mat4::from_translation(Vec3::new(0.0, 1.5, -2.0)),
                    now,
                );
                for anchor in [floor, window] {
                    let _ = self.planes.send(AnchorUpdate {
                        event: UpdateEvent::Added,
                        anchor,
                        timestamp: now,
                    });
                }
            }

            if tick == MESH_TICK {
                let _ = self.meshes.send(AnchorUpdate {
                    event: UpdateEvent::Added,
                    anchor: Anchor {
                        id: MESH_ID,
                        origin_from_anchor: Mat4::IDENTITY,
                        tracked: true,
                        timestamp: now,
                        kind: AnchorKind::Mesh,
                    },
                    timestamp: now,
                });
            }

            if tick % HAND_PERIOD == 0 {
                let event = if hands_announced {
                    UpdateEvent::Updated
                } else {
                    UpdateEvent::Added
                };
                hands_announced = true;
                let left = hand_anchor(LEFT_HAND_ID, Side::Left, now);
                let right = hand_anchor(RIGHT_HAND_ID, Side::Right, now);
                {
                    let mut state = self.inner.state.lock().unwrap();
                    state.hands.left = Some(left.clone());
                    state.hands.right = Some(right.clone());
                }
                for anchor in [left, right] {
                    if self
                        .hands
                        .send(AnchorUpdate {
                            event,
                            anchor,
                            timestamp: now,
                        })
                        .is_err()
                    {
                        break 'drive;
                    }
                }
            }
        }
        debug!("simulated feed consumers gone, stopping driver");
    }

    fn send_world(
        &self,
        anchor: Anchor,
        event: UpdateEvent,
        timestamp: f64,
    ) -> Result<(), mpsc::error::SendError<AnchorUpdate>> {
        self.world.send(AnchorUpdate {
            event,
            anchor,
            timestamp,
        })
    }
}

fn head_transform(timestamp: f64) -> Mat4 {
    let t = timestamp as f32;
    let yaw = 0.15 * (0.4 * t).sin();
    let height = 1.6 + 0.02 * (0.9 * t).sin();
    Mat4::from_rotation_translation(Quat::from_rotation_y(yaw), Vec3::new(0.0, height, 0.0))
}

fn plane_anchor(
    id: AnchorId,
    classification: PlaneClassification,
    origin_from_anchor: Mat4,
    timestamp: f64,
) -> Anchor {
    Anchor {
        id,
        origin_from_anchor,
        tracked: true,
        timestamp,
        kind: AnchorKind::Plane { classification },
    }
}

fn hand_anchor(id: AnchorId, side: Side, timestamp: f64) -> Anchor {
    let t = timestamp as f32;
    let sway = 0.03 * (1.3 * t + side.index() as f32).sin();
    let origin_from_anchor = Mat4::from_rotation_translation(
        Quat::from_rotation_x(-0.4),
        Vec3::new(side.sign() * 0.18, 1.05 + sway, -0.35),
    );
    Anchor {
        id,
        origin_from_anchor,
        tracked: true,
        timestamp,
        kind: AnchorKind::Hand {
            chirality: side,
            skeleton: Some(simulated_skeleton(side)),
        },
    }
}

fn simulated_skeleton(side: Side) -> HandSkeleton {
    let joints = HandJointId::ALL
        .iter()
        .map(|&id| HandJoint {
            id,
            anchor_from_joint: Mat4::from_translation(joint_offset(id, side)),
        })
        .collect();
    HandSkeleton::new(joints)
}

/// Rough open-hand layout in the wrist frame, fingers extending -Z. Defined
/// for the right hand and mirrored in x for the left.
fn joint_offset(id: HandJointId, side: Side) -> Vec3 {
    use HandJointId::*;
    let (lateral, reach) = match id {
        Wrist => (0.0, 0.0),
        ThumbKnuckle => (0.035, 0.02),
        ThumbIntermediateBase => (0.05, 0.045),
        ThumbIntermediateTip => (0.06, 0.065),
        ThumbTip => (0.065, 0.08),
        IndexFingerMetacarpal => (0.02, 0.03),
        IndexFingerKnuckle => (0.025, 0.09),
        IndexFingerIntermediateBase => (0.025, 0.125),
        IndexFingerIntermediateTip => (0.025, 0.15),
        IndexFingerTip => (0.025, 0.17),
        MiddleFingerMetacarpal => (0.0, 0.03),
        MiddleFingerKnuckle => (0.0, 0.095),
        MiddleFingerIntermediateBase => (0.0, 0.135),
        MiddleFingerIntermediateTip => (0.0, 0.162),
        MiddleFingerTip => (0.0, 0.185),
        RingFingerMetacarpal => (-0.02, 0.03),
        RingFingerKnuckle => (-0.022, 0.09),
        RingFingerIntermediateBase => (-0.022, 0.127),
        RingFingerIntermediateTip => (-0.022, 0.152),
        RingFingerTip => (-0.022, 0.172),
        LittleFingerMetacarpal => (-0.038, 0.028),
        LittleFingerKnuckle => (-0.042, 0.08),
        LittleFingerIntermediateBase => (-0.042, 0.11),
        LittleFingerIntermediateTip => (-0.042, 0.13),
        LittleFingerTip => (-0.042, 0.148),
        ForearmWrist => (0.0, -0.02),
        ForearmArm => (0.0, -0.16),
    };
    Vec3::new(lateral * side.sign(), 0.0, -reach)
}
