//! Coordinate conversion between the platform's origin-relative transforms
//! and the outbound convention, including the fixed chirality corrections
//! for hand poses.

use glam::{Mat4, Quat, Vec3};
use visor_link::{Pose, Side};
use visor_spatial::{HandJointId, HandSkeleton};

/// Orientation correction aligning the platform's palm-frame axes with the
/// outbound controller convention, per side.
pub fn hand_orientation_correction(side: Side) -> Quat {
    match side {
        Side::Left => {
            Quat::from_rotation_arc(Vec3::X, Vec3::NEG_X)
                * Quat::from_rotation_arc(Vec3::X, Vec3::NEG_Z)
        }
        Side::Right => {
            Quat::from_rotation_arc(Vec3::Z, Vec3::NEG_Z)
                * Quat::from_rotation_arc(Vec3::X, Vec3::Z)
        }
    }
}

/// Correction turning the forearm/elbow stand-in joints to face outward
/// from the arm. Identical for both sides.
pub fn forearm_orientation_correction() -> Quat {
    Quat::from_rotation_arc(Vec3::X, Vec3::Z) * Quat::from_rotation_arc(Vec3::Y, Vec3::Z)
}

/// Re-express a platform transform in output space.
pub fn output_transform(reference: &Mat4, origin_from_raw: &Mat4) -> Mat4 {
    reference.inverse() * *origin_from_raw
}

/// Output-space pose with no correction applied (head and eye paths).
pub fn output_pose(reference: &Mat4, origin_from_raw: &Mat4) -> Pose {
    Pose::from_transform(&output_transform(reference, origin_from_raw))
}

/// Wrist-only hand pose: the hand anchor transform plus the side's
/// orientation correction. Used when no skeleton is available.
pub fn wrist_pose(reference: &Mat4, origin_from_hand: &Mat4, side: Side) -> Pose {
    let transform = output_transform(reference, origin_from_hand);
    Pose {
        orientation: Quat::from_mat4(&transform) * hand_orientation_correction(side),
        position: transform.w_axis.truncate(),
    }
}

/// Controller-grip pose for a hand: positioned at the palm midpoint between
/// the middle-finger metacarpal and proximal joints, oriented from the
/// wrist. Falls back to the wrist pose when the skeleton or the needed
/// joints are missing.
pub fn palm_pose(
    reference: &Mat4,
    origin_from_hand: &Mat4,
    side: Side,
    skeleton: Option<&HandSkeleton>,
) -> Pose {
    let Some(skeleton) = skeleton else {
        return wrist_pose(reference, origin_from_hand, side);
    };
    let (Some(metacarpal), Some(proximal), Some(wrist)) = (
        skeleton.joint(HandJointId::MiddleFingerMetacarpal),
        skeleton.joint(HandJointId::MiddleFingerKnuckle),
        skeleton.joint(HandJointId::Wrist),
    ) else {
        return wrist_pose(reference, origin_from_hand, side);
    };

    let joint_transform = |joint: &visor_spatial::HandJoint| {
        output_transform(reference, &(*origin_from_hand * joint.anchor_from_joint))
    };
    let metacarpal_position = joint_transform(metacarpal).w_axis.truncate();
    let proximal_position = joint_transform(proximal).w_axis.truncate();
    let wrist_transform = joint_transform(wrist);

    Pose {
        orientation: Quat::from_mat4(&wrist_transform) * hand_orientation_correction(side),
        position: (metacarpal_position + proximal_position) / 2.0,
    }
}

/// View poses come back from the remote end in output space; map one back
/// to a platform-local transform. `eye_transform` is the device-to-eye
/// offset the pose was produced with.
pub fn remote_view_to_local(reference: &Mat4, eye_transform: &Mat4, view_pose: &Pose) -> Mat4 {
    let pose_matrix = Mat4::from_rotation_translation(view_pose.orientation, view_pose.position);
    *reference * (eye_transform.inverse() * pose_matrix)
}
