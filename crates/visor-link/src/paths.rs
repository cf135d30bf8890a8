//! Stable numeric ids for device and input paths. Both ends hash the same
//! strings, so ids can be baked as constants and compared cheaply.

use crate::Side;

/// 64-bit FNV-1a over the path string.
pub const fn path_id(path: &str) -> u64 {
    let bytes = path.as_bytes();
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

pub const HEAD: u64 = path_id("/user/head");
pub const LEFT_HAND: u64 = path_id("/user/hand/left");
pub const RIGHT_HAND: u64 = path_id("/user/hand/right");

// The upstream body role set has no forearm slots; the knee paths carry the
// forearm poses and the elbow paths carry the arm ends.
pub const LEFT_FOREARM: u64 = path_id("/user/body/left_knee");
pub const RIGHT_FOREARM: u64 = path_id("/user/body/right_knee");
pub const LEFT_ELBOW: u64 = path_id("/user/body/left_elbow");
pub const RIGHT_ELBOW: u64 = path_id("/user/body/right_elbow");

/// Input path ids for one hand's controller.
pub struct HandPaths {
    pub button_a: u64,
    pub button_b: u64,
    pub button_x: u64,
    pub button_y: u64,
    pub trigger_click: u64,
    pub trigger_value: u64,
    pub squeeze_click: u64,
    pub squeeze_value: u64,
    pub squeeze_force: u64,
    pub thumbstick_x: u64,
    pub thumbstick_y: u64,
    pub thumbstick_click: u64,
    pub system_click: u64,
    pub menu_click: u64,
}

pub const LEFT: HandPaths = HandPaths {
    button_a: path_id("/user/hand/left/input/a/click"),
    button_b: path_id("/user/hand/left/input/b/click"),
    button_x: path_id("/user/hand/left/input/x/click"),
    button_y: path_id("/user/hand/left/input/y/click"),
    trigger_click: path_id("/user/hand/left/input/trigger/click"),
    trigger_value: path_id("/user/hand/left/input/trigger/value"),
    squeeze_click: path_id("/user/hand/left/input/squeeze/click"),
    squeeze_value: path_id("/user/hand/left/input/squeeze/value"),
    squeeze_force: path_id("/user/hand/left/input/squeeze/force"),
    thumbstick_x: path_id("/user/hand/left/input/thumbstick/x"),
    thumbstick_y: path_id("/user/hand/left/input/thumbstick/y"),
    thumbstick_click: path_id("/user/hand/left/input/thumbstick/click"),
    system_click: path_id("/user/hand/left/input/system/click"),
    menu_click: path_id("/user/hand/left/input/menu/click"),
};

pub const RIGHT: HandPaths = HandPaths {
    button_a: path_id("/user/hand/right/input/a/click"),
    button_b: path_id("/user/hand/right/input/b/click"),
    button_x: path_id("/user/hand/right/input/x/click"),
    button_y: path_id("/user/hand/right/input/y/click"),
    trigger_click: path_id("/user/hand/right/input/trigger/click"),
    trigger_value: path_id("/user/hand/right/input/trigger/value"),
    squeeze_click: path_id("/user/hand/right/input/squeeze/click"),
    squeeze_value: path_id("/user/hand/right/input/squeeze/value"),
    squeeze_force: path_id("/user/hand/right/input/squeeze/force"),
    thumbstick_x: path_id("/user/hand/right/input/thumbstick/x"),
    thumbstick_y: path_id("/user/hand/right/input/thumbstick/y"),
    thumbstick_click: path_id("/user/hand/right/input/thumbstick/click"),
    system_click: path_id("/user/hand/right/input/system/click"),
    menu_click: path_id("/user/hand/right/input/menu/click"),
};

pub const fn hand(side: Side) -> &'static HandPaths {
    match side {
        Side::Left => &LEFT,
        Side::Right => &RIGHT,
    }
}

pub const fn hand_device(side: Side) -> u64 {
    match side {
        Side::Left => LEFT_HAND,
        Side::Right => RIGHT_HAND,
    }
}

pub const fn forearm_device(side: Side) -> u64 {
    match side {
        Side::Left => LEFT_FOREARM,
        Side::Right => RIGHT_FOREARM,
    }
}

pub const fn elbow_device(side: Side) -> u64 {
    match side {
        Side::Left => LEFT_ELBOW,
        Side::Right => RIGHT_ELBOW,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_stable() {
        assert_eq!(path_id("/user/head"), HEAD);
        assert_eq!(path_id("/user/head"), path_id("/user/head"));
        assert_eq!(path_id("/user/hand/left/input/a/click"), LEFT.button_a);
    }

    #[test]
    fn known_paths_do_not_collide() {
        let left = &LEFT;
        let right = &RIGHT;
        let ids = [
            HEAD,
            LEFT_HAND,
            RIGHT_HAND,
            LEFT_FOREARM,
            RIGHT_FOREARM,
            LEFT_ELBOW,
            RIGHT_ELBOW,
            left.button_a,
            left.button_b,
            left.button_x,
            left.button_y,
            left.trigger_click,
            left.trigger_value,
            left.squeeze_click,
            left.squeeze_value,
            left.squeeze_force,
            left.thumbstick_x,
            left.thumbstick_y,
            left.thumbstick_click,
            left.system_click,
            left.menu_click,
            right.button_a,
            right.button_b,
            right.button_x,
            right.button_y,
            right.trigger_click,
            right.trigger_value,
            right.squeeze_click,
            right.squeeze_value,
            right.squeeze_force,
            right.thumbstick_x,
            right.thumbstick_y,
            right.thumbstick_click,
            right.system_click,
            right.menu_click,
        ];
        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn side_lookups_match_constants() {
        assert_eq!(hand(Side::Left).button_a, LEFT.button_a);
        assert_eq!(hand(Side::Right).menu_click, RIGHT.menu_click);
        assert_eq!(hand_device(Side::Left), LEFT_HAND);
        assert_eq!(forearm_device(Side::Right), RIGHT_FOREARM);
        assert_eq!(elbow_device(Side::Left), LEFT_ELBOW);
    }
}
