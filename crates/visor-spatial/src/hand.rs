//! Source-side hand skeletons: the 27 joints a hand anchor can carry, each
//! with its transform relative to the hand anchor (the wrist).

use glam::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandJointId {
    Wrist,
    ThumbKnuckle,
    ThumbIntermediateBase,
    ThumbIntermediateTip,
    ThumbTip,
    IndexFingerMetacarpal,
    IndexFingerKnuckle,
    IndexFingerIntermediateBase,
    IndexFingerIntermediateTip,
    IndexFingerTip,
    MiddleFingerMetacarpal,
    MiddleFingerKnuckle,
    MiddleFingerIntermediateBase,
    MiddleFingerIntermediateTip,
    MiddleFingerTip,
    RingFingerMetacarpal,
    RingFingerKnuckle,
    RingFingerIntermediateBase,
    RingFingerIntermediateTip,
    RingFingerTip,
    LittleFingerMetacarpal,
    LittleFingerKnuckle,
    LittleFingerIntermediateBase,
    LittleFingerIntermediateTip,
    LittleFingerTip,
    ForearmWrist,
    ForearmArm,
}

impl HandJointId {
    pub const ALL: [HandJointId; 27] = [
        HandJointId::Wrist,
        HandJointId::ThumbKnuckle,
        HandJointId::ThumbIntermediateBase,
        HandJointId::ThumbIntermediateTip,
        HandJointId::ThumbTip,
        HandJointId::IndexFingerMetacarpal,
        HandJointId::IndexFingerKnuckle,
        HandJointId::IndexFingerIntermediateBase,
        HandJointId::IndexFingerIntermediateTip,
        HandJointId::IndexFingerTip,
        HandJointId::MiddleFingerMetacarpal,
        HandJointId::MiddleFingerKnuckle,
        HandJointId::MiddleFingerIntermediateBase,
        HandJointId::MiddleFingerIntermediateTip,
        HandJointId::MiddleFingerTip,
        HandJointId::RingFingerMetacarpal,
        HandJointId::RingFingerKnuckle,
        HandJointId::RingFingerIntermediateBase,
        HandJointId::RingFingerIntermediateTip,
        HandJointId::RingFingerTip,
        HandJointId::LittleFingerMetacarpal,
        HandJointId::LittleFingerKnuckle,
        HandJointId::LittleFingerIntermediateBase,
        HandJointId::LittleFingerIntermediateTip,
        HandJointId::LittleFingerTip,
        HandJointId::ForearmWrist,
        HandJointId::ForearmArm,
    ];
}

#[derive(Debug, Clone, Copy)]
pub struct HandJoint {
    pub id: HandJointId,
    pub anchor_from_joint: Mat4,
}

/// The joint set reported with one hand anchor. Not guaranteed complete;
/// consumers look joints up by id.
#[derive(Debug, Clone, Default)]
pub struct HandSkeleton {
    joints: Vec<HandJoint>,
}

impl HandSkeleton {
    pub fn new(joints: Vec<HandJoint>) -> Self {
        Self { joints }
    }

    pub fn joint(&self, id: HandJointId) -> Option<&HandJoint> {
        self.joints.iter().find(|joint| joint.id == id)
    }

    pub fn joints(&self) -> &[HandJoint] {
        &self.joints
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}
