//! Retargets the platform's 27-joint hand skeleton onto the fixed 28-slot
//! outbound layout: slot 0 is the palm root, 1..=25 are wrist and fingers,
//! 26/27 are forearm stand-ins.

use glam::{Mat4, Quat, Vec3};
use visor_link::{Pose, Side, Skeleton, SKELETON_JOINT_COUNT};
use visor_spatial::{HandJointId, HandSkeleton};

use crate::transform::{forearm_orientation_correction, output_transform, palm_pose};

pub const FOREARM_SLOT: usize = 26;
pub const ELBOW_SLOT: usize = 27;

/// Offset that moves the arm stand-ins from the bone line onto the arm
/// surface, along the joint's local up, meters.
const ARM_SURFACE_OFFSET_M: f32 = 0.025;

/// Outbound slot for a source joint. Slot 0 has no source; it carries the
/// palm root pose.
pub fn target_slot(joint: HandJointId) -> usize {
    use HandJointId::*;
    match joint {
        Wrist => 1,
        ThumbKnuckle => 2,
        ThumbIntermediateBase => 3,
        ThumbIntermediateTip => 4,
        ThumbTip => 5,
        IndexFingerMetacarpal => 6,
        IndexFingerKnuckle => 7,
        IndexFingerIntermediateBase => 8,
        IndexFingerIntermediateTip => 9,
        IndexFingerTip => 10,
        MiddleFingerMetacarpal => 11,
        MiddleFingerKnuckle => 12,
        MiddleFingerIntermediateBase => 13,
        MiddleFingerIntermediateTip => 14,
        MiddleFingerTip => 15,
        RingFingerMetacarpal => 16,
        RingFingerKnuckle => 17,
        RingFingerIntermediateBase => 18,
        RingFingerIntermediateTip => 19,
        RingFingerTip => 20,
        LittleFingerMetacarpal => 21,
        LittleFingerKnuckle => 22,
        LittleFingerIntermediateBase => 23,
        LittleFingerIntermediateTip => 24,
        LittleFingerTip => 25,
        ForearmWrist => FOREARM_SLOT,
        ForearmArm => ELBOW_SLOT,
    }
}

/// Build the outbound skeleton frame for one hand anchor. Returns `None`
/// when the anchor carries no skeleton. Every slot is seeded with the root
/// pose first, so a frame is complete even if source joints are missing.
pub fn retarget(
    reference: &Mat4,
    origin_from_hand: &Mat4,
    side: Side,
    skeleton: Option<&HandSkeleton>,
) -> Option<Skeleton> {
    let skeleton = skeleton?;
    let root = palm_pose(reference, origin_from_hand, side, Some(skeleton));
    let mut frame: Skeleton = [root; SKELETON_JOINT_COUNT];

    for joint in skeleton.joints() {
        let slot = target_slot(joint.id);
        let transform = output_transform(reference, &(*origin_from_hand * joint.anchor_from_joint));

        let mut orientation =
            Quat::from_mat4(&transform) * Quat::from_rotation_arc(Vec3::X, Vec3::Z);
        orientation = match side {
            Side::Right => orientation * Quat::from_rotation_arc(Vec3::Z, Vec3::NEG_Z),
            Side::Left => orientation * Quat::from_rotation_arc(Vec3::X, Vec3::NEG_X),
        };

        // The platform reports the elbow with the wrist's orientation, which
        // downstream IK handles badly; pin it level instead.
        if slot == ELBOW_SLOT {
            orientation = Quat::IDENTITY;
        }
        // Arm stand-ins face outward from the arm.
        if slot == FOREARM_SLOT || slot == ELBOW_SLOT {
            orientation *= forearm_orientation_correction();
        }

        let mut position = transform.w_axis.truncate();
        // Move the stand-ins onto the arm surface instead of inside it.
        if slot == FOREARM_SLOT || slot == ELBOW_SLOT {
            position += transform.y_axis.truncate() * (ARM_SURFACE_OFFSET_M * side.sign());
        }

        frame[slot] = Pose {
            orientation,
            position,
        };
    }

    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use visor_spatial::HandJoint;

    fn full_skeleton() -> HandSkeleton {
        let joints = HandJointId::ALL
            .iter()
            .enumerate()
            .map(|(i, &id)| HandJoint {
                id,
                anchor_from_joint: Mat4::from_translation(Vec3::new(0.0, 0.0, -0.01 * i as f32)),
            })
            .collect();
        HandSkeleton::new(joints)
    }

    #[test]
    fn no_source_skeleton_means_no_frame() {
        assert!(retarget(&Mat4::IDENTITY, &Mat4::IDENTITY, Side::Left, None).is_none());
    }

    #[test]
    fn frame_is_complete_and_finite() {
        let skeleton = full_skeleton();
        let raw = Mat4::from_translation(Vec3::new(0.1, 1.2, -0.4));
        for side in Side::BOTH {
            let frame = retarget(&Mat4::IDENTITY, &raw, side, Some(&skeleton)).unwrap();
            assert_eq!(frame.len(), SKELETON_JOINT_COUNT);
            for pose in &frame {
                assert!(pose.is_finite());
            }
        }
    }

    #[test]
    fn every_source_joint_lands_in_a_distinct_slot() {
        let mut seen = [false; SKELETON_JOINT_COUNT];
        for id in HandJointId::ALL {
            let slot = target_slot(id);
            assert!(slot > 0 && slot < SKELETON_JOINT_COUNT);
            assert!(!seen[slot], "slot {slot} mapped twice");
            seen[slot] = true;
        }
        // Exactly slot 0 is left for the root.
        assert_eq!(seen.iter().filter(|taken| !**taken).count(), 1);
        assert!(!seen[0]);
    }

    #[test]
    fn missing_joints_inherit_the_root_pose() {
        // Only enough joints for a palm pose, none of the fingers.
        let skeleton = HandSkeleton::new(vec![
            HandJoint {
                id: HandJointId::Wrist,
                anchor_from_joint: Mat4::IDENTITY,
            },
            HandJoint {
                id: HandJointId::MiddleFingerMetacarpal,
                anchor_from_joint: Mat4::from_translation(Vec3::new(0.0, 0.0, -0.03)),
            },
            HandJoint {
                id: HandJointId::MiddleFingerKnuckle,
                anchor_from_joint: Mat4::from_translation(Vec3::new(0.0, 0.0, -0.09)),
            },
        ]);
        let frame = retarget(
            &Mat4::IDENTITY,
            &Mat4::IDENTITY,
            Side::Right,
            Some(&skeleton),
        )
        .unwrap();
        let root = frame[0];
        assert_eq!(frame[10].position, root.position);
        assert_eq!(frame[25].position, root.position);
    }

    #[test]
    fn elbow_orientation_is_pinned() {
        let skeleton = full_skeleton();
        for side in Side::BOTH {
            let frame = retarget(&Mat4::IDENTITY, &Mat4::IDENTITY, side, Some(&skeleton)).unwrap();
            // Identity plus the outward correction, regardless of what the
            // source joint reported.
            assert!(
                frame[ELBOW_SLOT]
                    .orientation
                    .angle_between(forearm_orientation_correction())
                    < 1e-4
            );
        }
    }

    #[test]
    fn arm_stand_ins_offset_mirrors_by_side() {
        let skeleton = HandSkeleton::new(vec![
            HandJoint {
                id: HandJointId::ForearmWrist,
                anchor_from_joint: Mat4::IDENTITY,
            },
        ]);
        let left = retarget(&Mat4::IDENTITY, &Mat4::IDENTITY, Side::Left, Some(&skeleton)).unwrap();
        let right =
            retarget(&Mat4::IDENTITY, &Mat4::IDENTITY, Side::Right, Some(&skeleton)).unwrap();
        assert!(
            (right[FOREARM_SLOT].position - Vec3::new(0.0, ARM_SURFACE_OFFSET_M, 0.0)).length()
                < 1e-6
        );
        assert!(
            (left[FOREARM_SLOT].position - Vec3::new(0.0, -ARM_SURFACE_OFFSET_M, 0.0)).length()
                < 1e-6
        );
    }
}
