//! World-origin bookkeeping. The platform re-centers its origin whenever it
//! likes (crown press, tracking hiccups), so the session pins one world
//! anchor as "the" origin and re-expresses every outbound pose against it.

use glam::Mat4;
use tracing::{debug, info, warn};
use visor_spatial::{Anchor, AnchorId, AnchorUpdate, UpdateEvent};

use crate::store::AnchorStore;

/// Radius around the platform origin inside which a world anchor qualifies
/// as the session origin, and inside which anchors get purged on a recenter
/// gesture.
pub const ORIGIN_RADIUS_M: f32 = 3.5;

/// Successful sends to wait before registering the identity placeholder as
/// the origin when the environment never produced a usable anchor.
pub const FORCE_ADOPT_AFTER_POSES: u64 = 300;

/// Closely-spaced origin updates (beyond the first) that count as the
/// deliberate recenter gesture.
pub const RECENTER_TRIGGER_COUNT: u32 = 2;

/// Locally-minted anchor ids live in the top half of the id space, clear of
/// platform-assigned ones.
const LOCAL_ID_BASE: u64 = 1 << 63;

/// Infers the repeated-recenter gesture from origin-anchor update timing.
/// The platform offers no direct recenter signal; what it does deliver is an
/// update for the registered origin anchor each time the user recenters, so
/// several updates in quick succession read as an intentional gesture.
pub struct RecenterDetector {
    min_gap_s: f64,
    max_gap_s: f64,
    last_update_ts: f64,
    presses: u32,
}

impl RecenterDetector {
    pub fn new(min_gap_s: f64, max_gap_s: f64) -> Self {
        Self {
            min_gap_s,
            max_gap_s,
            last_update_ts: 0.0,
            presses: 0,
        }
    }

    /// Feed one origin-anchor update timestamp. True when the gesture fired;
    /// the press count resets either way once it does.
    pub fn observe(&mut self, timestamp: f64) -> bool {
        let since_last = timestamp - self.last_update_ts;
        if since_last > self.min_gap_s && since_last < self.max_gap_s {
            self.presses += 1;
        } else {
            self.presses = 0;
        }
        self.last_update_ts = timestamp;

        if self.presses >= RECENTER_TRIGGER_COUNT {
            self.presses = 0;
            true
        } else {
            false
        }
    }
}

/// Best-effort platform anchor mutation, executed outside the state lock.
#[derive(Debug, Clone)]
pub enum AnchorCommand {
    Add(Anchor),
    Remove(AnchorId),
}

/// Reference-frame state for one session.
pub struct OriginState {
    /// The anchor poses are stabilized against. Starts as an identity
    /// placeholder until a real anchor is adopted.
    pub origin_anchor: Anchor,
    pub adopted: bool,
    /// Output-space reference transform. Poses go out as
    /// `reference.inverse() * raw`.
    pub reference: Mat4,
    pub recenter: RecenterDetector,
    local_seq: u64,
}

impl OriginState {
    pub fn new(recenter_min_gap_s: f64, recenter_max_gap_s: f64) -> Self {
        Self {
            origin_anchor: Anchor::identity_world(AnchorId(LOCAL_ID_BASE), 0.0),
            adopted: false,
            reference: Mat4::IDENTITY,
            recenter: RecenterDetector::new(recenter_min_gap_s, recenter_max_gap_s),
            local_seq: 0,
        }
    }

    fn mint_identity_origin(&mut self, timestamp: f64) -> Anchor {
        self.local_seq += 1;
        Anchor::identity_world(AnchorId(LOCAL_ID_BASE + self.local_seq), timestamp)
    }

    /// Register the identity placeholder as the origin. Once the platform
    /// knows the anchor, every user recenter surfaces as an update event for
    /// it, which is the only recenter signal we get.
    pub fn force_adopt(&mut self) -> AnchorCommand {
        self.adopted = true;
        info!(anchor = %self.origin_anchor.id, "no world anchor near start point, registering identity origin");
        AnchorCommand::Add(self.origin_anchor.clone())
    }
}

/// What a world-anchor event asks the session to do once the lock is
/// released.
#[derive(Default)]
pub struct WorldUpdateEffects {
    pub commands: Vec<AnchorCommand>,
    /// The origin anchor stopped being tracked (headset likely removed).
    pub tracking_lost: bool,
    /// The recenter gesture fired and the origin was re-established.
    pub origin_reset: bool,
}

/// Applies world-anchor feed events to the origin state and anchor store.
#[derive(Clone, Copy)]
pub struct OriginStabilizer {
    /// When set, the reference follows the origin anchor so the streamed
    /// center stays put across platform re-centers. When unset the
    /// reference stays frozen and re-centers move the streamed world.
    keep_center_fixed: bool,
}

impl OriginStabilizer {
    pub fn new(keep_center_fixed: bool) -> Self {
        Self { keep_center_fixed }
    }

    pub fn on_world_anchor(
        &self,
        store: &mut AnchorStore,
        origin: &mut OriginState,
        update: &AnchorUpdate,
    ) -> WorldUpdateEffects {
        let mut effects = WorldUpdateEffects::default();
        match update.event {
            UpdateEvent::Added | UpdateEvent::Updated => {
                store.upsert(update.anchor.clone());

                if !origin.adopted {
                    let distance = update.anchor.distance_from_origin();
                    debug!(
                        anchor = %update.anchor.id,
                        distance,
                        tracked = update.anchor.tracked,
                        "world anchor seen before origin adoption"
                    );
                    // Any tracked anchor near the start point will do. The
                    // stale placeholder is cleaned up best-effort; which
                    // anchor wins when several qualify is arbitrary, but
                    // there is normally only one.
                    if distance < ORIGIN_RADIUS_M && update.anchor.tracked {
                        effects
                            .commands
                            .push(AnchorCommand::Remove(origin.origin_anchor.id));
                        origin.origin_anchor = update.anchor.clone();
                        origin.adopted = true;
                        info!(anchor = %update.anchor.id, distance, "adopted world origin anchor");
                    }
                }

                if update.anchor.id == origin.origin_anchor.id {
                    origin.origin_anchor = update.anchor.clone();

                    // Happens when the headset comes off or the app closes.
                    if !update.anchor.tracked {
                        warn!(anchor = %update.anchor.id, "origin anchor no longer tracked");
                        effects.tracking_lost = true;
                        return effects;
                    }

                    if self.keep_center_fixed {
                        origin.reference = update.anchor.origin_from_anchor;
                    }

                    // Added events also fire on registration; only genuine
                    // re-observations count toward the gesture.
                    if update.event == UpdateEvent::Updated
                        && origin.recenter.observe(update.timestamp)
                    {
                        info!("recenter gesture detected, re-establishing origin");
                        effects.origin_reset = true;

                        let purge: Vec<AnchorId> = store
                            .world_anchors()
                            .filter(|anchor| anchor.distance_to(&update.anchor) < ORIGIN_RADIUS_M)
                            .map(|anchor| anchor.id)
                            .collect();
                        for id in purge {
                            store.remove(id);
                            effects.commands.push(AnchorCommand::Remove(id));
                        }

                        let fresh = origin.mint_identity_origin(update.timestamp);
                        debug!(anchor = %fresh.id, "registering fresh identity origin");
                        origin.origin_anchor = fresh.clone();
                        origin.adopted = true;
                        effects.commands.push(AnchorCommand::Add(fresh));
                    }
                }
            }
            UpdateEvent::Removed => {
                // The platform drops anchors it lost interest in; the stored
                // record stays until something replaces it.
            }
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use visor_spatial::UpdateEvent;

    fn world_update(id: u64, position: Vec3, tracked: bool, ts: f64, event: UpdateEvent) -> AnchorUpdate {
        AnchorUpdate {
            event,
            anchor: Anchor::world(
                AnchorId(id),
                Mat4::from_translation(position),
                tracked,
                ts,
            ),
            timestamp: ts,
        }
    }

    fn fixture(keep_center_fixed: bool) -> (OriginStabilizer, AnchorStore, OriginState) {
        (
            OriginStabilizer::new(keep_center_fixed),
            AnchorStore::new(),
            OriginState::new(0.5, 1.5),
        )
    }

    #[test]
    fn adopts_first_near_tracked_anchor() {
        let (stabilizer, mut store, mut origin) = fixture(false);
        let placeholder_id = origin.origin_anchor.id;

        let far = world_update(1, Vec3::new(10.0, 0.0, 0.0), true, 1.0, UpdateEvent::Added);
        let effects = stabilizer.on_world_anchor(&mut store, &mut origin, &far);
        assert!(!origin.adopted);
        assert!(effects.commands.is_empty());

        let untracked = world_update(2, Vec3::new(1.0, 0.0, 0.0), false, 2.0, UpdateEvent::Added);
        stabilizer.on_world_anchor(&mut store, &mut origin, &untracked);
        assert!(!origin.adopted);

        let near = world_update(3, Vec3::new(1.0, 0.0, 0.0), true, 3.0, UpdateEvent::Added);
        let effects = stabilizer.on_world_anchor(&mut store, &mut origin, &near);
        assert!(origin.adopted);
        assert_eq!(origin.origin_anchor.id, AnchorId(3));
        assert!(matches!(
            effects.commands.as_slice(),
            [AnchorCommand::Remove(id)] if *id == placeholder_id
        ));
    }

    #[test]
    fn reference_follows_origin_only_when_keeping_center() {
        for keep in [false, true] {
            let (stabilizer, mut store, mut origin) = fixture(keep);
            let position = Vec3::new(0.5, 0.0, -1.0);
            let update = world_update(1, position, true, 1.0, UpdateEvent::Added);
            stabilizer.on_world_anchor(&mut store, &mut origin, &update);
            assert!(origin.adopted);
            if keep {
                assert!((origin.reference.w_axis.truncate() - position).length() < 1e-6);
            } else {
                assert_eq!(origin.reference, Mat4::IDENTITY);
            }
        }
    }

    #[test]
    fn untracked_origin_update_signals_loss_and_keeps_reference() {
        let (stabilizer, mut store, mut origin) = fixture(true);
        let position = Vec3::new(1.0, 0.0, 0.0);
        stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(1, position, true, 1.0, UpdateEvent::Added),
        );
        let reference_before = origin.reference;

        let effects = stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(1, Vec3::new(2.0, 0.0, 0.0), false, 2.0, UpdateEvent::Updated),
        );
        assert!(effects.tracking_lost);
        assert_eq!(origin.reference, reference_before);
        assert!(origin.adopted);
    }

    #[test]
    fn unrelated_anchor_updates_do_not_touch_reference() {
        let (stabilizer, mut store, mut origin) = fixture(true);
        stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(1, Vec3::ZERO, true, 1.0, UpdateEvent::Added),
        );
        let reference_before = origin.reference;

        stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(9, Vec3::new(2.0, 0.0, 0.0), true, 2.0, UpdateEvent::Updated),
        );
        assert_eq!(origin.reference, reference_before);
        assert_eq!(origin.origin_anchor.id, AnchorId(1));
    }

    #[test]
    fn recenter_gesture_purges_and_reinstalls_origin() {
        let (stabilizer, mut store, mut origin) = fixture(false);
        stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(1, Vec3::ZERO, true, 10.0, UpdateEvent::Added),
        );
        // A bystander anchor inside the purge radius and one outside it.
        stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(2, Vec3::new(1.0, 0.0, 0.0), true, 10.0, UpdateEvent::Added),
        );
        stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(3, Vec3::new(20.0, 0.0, 0.0), true, 10.0, UpdateEvent::Added),
        );

        // Two well-spaced updates arm the detector, the third fires it.
        for ts in [11.0, 12.0] {
            let effects = stabilizer.on_world_anchor(
                &mut store,
                &mut origin,
                &world_update(1, Vec3::ZERO, true, ts, UpdateEvent::Updated),
            );
            assert!(!effects.origin_reset);
        }
        let effects = stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(1, Vec3::ZERO, true, 13.0, UpdateEvent::Updated),
        );

        assert!(effects.origin_reset);
        assert!(origin.adopted);
        assert_ne!(origin.origin_anchor.id, AnchorId(1));
        assert_eq!(origin.origin_anchor.origin_from_anchor, Mat4::IDENTITY);
        // Near anchors are gone from the store, the far one survives.
        assert!(store.get(AnchorId(1)).is_none());
        assert!(store.get(AnchorId(2)).is_none());
        assert!(store.get(AnchorId(3)).is_some());

        let removes = effects
            .commands
            .iter()
            .filter(|command| matches!(command, AnchorCommand::Remove(_)))
            .count();
        let adds: Vec<&AnchorCommand> = effects
            .commands
            .iter()
            .filter(|command| matches!(command, AnchorCommand::Add(_)))
            .collect();
        assert_eq!(removes, 2);
        assert_eq!(adds.len(), 1);
    }

    #[test]
    fn slow_or_rapid_updates_do_not_trigger_recenter() {
        let (stabilizer, mut store, mut origin) = fixture(false);
        stabilizer.on_world_anchor(
            &mut store,
            &mut origin,
            &world_update(1, Vec3::ZERO, true, 10.0, UpdateEvent::Added),
        );

        // Gaps of 2s (too slow) and 0.1s (too fast) never arm the detector.
        for ts in [12.0, 14.0, 14.1, 14.2, 16.0] {
            let effects = stabilizer.on_world_anchor(
                &mut store,
                &mut origin,
                &world_update(1, Vec3::ZERO, true, ts, UpdateEvent::Updated),
            );
            assert!(!effects.origin_reset);
        }
    }

    #[test]
    fn detector_fires_once_per_burst() {
        let mut detector = RecenterDetector::new(0.5, 1.5);
        assert!(!detector.observe(10.0));
        assert!(!detector.observe(11.0));
        assert!(detector.observe(12.0));
        // Counter restarted: the next in-window update is press one again.
        assert!(!detector.observe(13.0));
        assert!(detector.observe(14.0));
    }

    #[test]
    fn force_adopt_registers_current_placeholder() {
        let mut origin = OriginState::new(0.5, 1.5);
        let placeholder_id = origin.origin_anchor.id;
        let command = origin.force_adopt();
        assert!(origin.adopted);
        assert!(matches!(command, AnchorCommand::Add(anchor) if anchor.id == placeholder_id));
    }
}
