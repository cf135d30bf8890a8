//! Maps physical pad events onto the canonical controller layout. The
//! mapper keeps no state; every physical event turns directly into one or
//! more fire-and-forget button emissions on the sink.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};
use visor_link::{paths, ButtonValue, Side, TrackingSink};

/// How a connected pad exposes its controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadProfile {
    /// Full dual-stick layout. One pad drives both logical hands.
    Extended,
    /// Minimal single-pad profile. Drives one hand, picked by vendor name.
    Unified,
}

/// Identity of the pad an event came from.
#[derive(Debug, Clone)]
pub struct PadInfo {
    pub vendor_name: String,
    pub profile: PadProfile,
}

impl PadInfo {
    pub fn unified(vendor_name: impl Into<String>) -> Self {
        Self {
            vendor_name: vendor_name.into(),
            profile: PadProfile::Unified,
        }
    }

    pub fn extended(vendor_name: impl Into<String>) -> Self {
        Self {
            vendor_name: vendor_name.into(),
            profile: PadProfile::Extended,
        }
    }

    /// Unified pads declare their side through the vendor string; an "(L)"
    /// marker means left, everything else is treated as right.
    pub fn side(&self) -> Side {
        if self.vendor_name.contains("(L)") {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// A physical control on a pad, named by position rather than meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadButton {
    FaceA,
    FaceB,
    FaceX,
    FaceY,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    TriggerLeft,
    TriggerRight,
    ShoulderLeft,
    ShoulderRight,
    ThumbstickClickLeft,
    ThumbstickClickRight,
    Home,
    Menu,
    Options,
}

/// One push-style controller callback, re-expressed as data.
#[derive(Debug, Clone)]
pub enum PadEvent {
    Button {
        button: PadButton,
        pressed: bool,
        value: f32,
    },
    Thumbstick {
        side: Side,
        x: f32,
        y: f32,
    },
}

/// A pad event together with the pad it came from.
#[derive(Debug, Clone)]
pub struct ControllerEvent {
    pub pad: PadInfo,
    pub event: PadEvent,
}

/// Stateless translator from physical pad events to logical emissions.
pub struct InputMapper;

impl InputMapper {
    pub fn map(&self, pad: &PadInfo, event: &PadEvent, sink: &dyn TrackingSink) {
        match event {
            PadEvent::Button {
                button,
                pressed,
                value,
            } => match pad.profile {
                PadProfile::Extended => map_extended(*button, *pressed, *value, sink),
                PadProfile::Unified => map_unified(pad.side(), *button, *pressed, sink),
            },
            PadEvent::Thumbstick { side, x, y } => {
                let hand = paths::hand(*side);
                sink.send_button(hand.thumbstick_x, ButtonValue::Scalar(*x));
                sink.send_button(hand.thumbstick_y, ButtonValue::Scalar(*y));
            }
        }
    }
}

/// The extended layout emulates both target controllers from one pad: face
/// buttons and right-side controls drive the right hand, the d-pad stands
/// in for the left hand's missing face buttons.
fn map_extended(button: PadButton, pressed: bool, value: f32, sink: &dyn TrackingSink) {
    let left = paths::hand(Side::Left);
    let right = paths::hand(Side::Right);
    match button {
        PadButton::FaceA => sink.send_button(right.button_a, ButtonValue::Binary(pressed)),
        PadButton::FaceB => sink.send_button(right.button_b, ButtonValue::Binary(pressed)),
        PadButton::FaceX => squeeze(Side::Right, pressed, value, sink),
        PadButton::FaceY => sink.send_button(right.button_y, ButtonValue::Binary(pressed)),

        PadButton::DpadRight => sink.send_button(left.button_y, ButtonValue::Binary(pressed)),
        PadButton::DpadDown => sink.send_button(left.button_x, ButtonValue::Binary(pressed)),
        PadButton::DpadUp => squeeze(Side::Left, pressed, value, sink),
        // The d-pad runs out of directions before the layout runs out of
        // buttons; left doubles up on X.
        PadButton::DpadLeft => sink.send_button(left.button_x, ButtonValue::Binary(pressed)),

        PadButton::TriggerLeft => trigger(Side::Left, pressed, value, sink),
        PadButton::TriggerRight => trigger(Side::Right, pressed, value, sink),
        PadButton::ShoulderLeft => squeeze(Side::Left, pressed, value, sink),
        PadButton::ShoulderRight => squeeze(Side::Right, pressed, value, sink),

        PadButton::ThumbstickClickLeft => {
            sink.send_button(left.thumbstick_click, ButtonValue::Binary(pressed))
        }
        PadButton::ThumbstickClickRight => {
            sink.send_button(right.thumbstick_click, ButtonValue::Binary(pressed))
        }

        // Whichever system-style button the pad actually has lands on the
        // right hand; options is the left hand's.
        PadButton::Home | PadButton::Menu => system(Side::Right, pressed, sink),
        PadButton::Options => system(Side::Left, pressed, sink),
    }
}

/// Unified pads carry only face buttons and options; everything maps onto
/// the pad's own side.
fn map_unified(side: Side, button: PadButton, pressed: bool, sink: &dyn TrackingSink) {
    let hand = paths::hand(side);
    match button {
        PadButton::FaceA => sink.send_button(hand.button_a, ButtonValue::Binary(pressed)),
        PadButton::FaceB => sink.send_button(hand.button_b, ButtonValue::Binary(pressed)),
        PadButton::FaceX => sink.send_button(hand.button_x, ButtonValue::Binary(pressed)),
        PadButton::FaceY => sink.send_button(hand.button_y, ButtonValue::Binary(pressed)),
        PadButton::Options => sink.send_button(hand.system_click, ButtonValue::Binary(pressed)),
        other => trace!(?other, ?side, "control not present on unified profile"),
    }
}

fn trigger(side: Side, pressed: bool, value: f32, sink: &dyn TrackingSink) {
    let hand = paths::hand(side);
    sink.send_button(hand.trigger_click, ButtonValue::Binary(pressed));
    sink.send_button(hand.trigger_value, ButtonValue::Scalar(value));
}

fn squeeze(side: Side, pressed: bool, value: f32, sink: &dyn TrackingSink) {
    let hand = paths::hand(side);
    sink.send_button(hand.squeeze_click, ButtonValue::Binary(pressed));
    sink.send_button(hand.squeeze_value, ButtonValue::Scalar(value));
    sink.send_button(hand.squeeze_force, ButtonValue::Scalar(value));
}

fn system(side: Side, pressed: bool, sink: &dyn TrackingSink) {
    let hand = paths::hand(side);
    sink.send_button(hand.system_click, ButtonValue::Binary(pressed));
    sink.send_button(hand.menu_click, ButtonValue::Binary(pressed));
}

/// Drains one session's controller event channel into the sink.
pub async fn run_input_loop(
    mut events: mpsc::UnboundedReceiver<ControllerEvent>,
    sink: Arc<dyn TrackingSink>,
) {
    let mapper = InputMapper;
    while let Some(event) = events.recv().await {
        mapper.map(&event.pad, &event.event, sink.as_ref());
    }
    debug!("controller event channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use visor_link::TrackingPacket;

    #[derive(Default)]
    struct RecordingSink {
        emissions: Mutex<Vec<(u64, ButtonValue)>>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<(u64, ButtonValue)> {
            std::mem::take(&mut self.emissions.lock().unwrap())
        }
    }

    impl TrackingSink for RecordingSink {
        fn send_tracking(&self, _packet: TrackingPacket) {}

        fn send_button(&self, path: u64, value: ButtonValue) {
            self.emissions.lock().unwrap().push((path, value));
        }
    }

    fn press(button: PadButton) -> PadEvent {
        PadEvent::Button {
            button,
            pressed: true,
            value: 1.0,
        }
    }

    #[test]
    fn extended_face_buttons_drive_the_right_hand() {
        let sink = RecordingSink::default();
        let pad = PadInfo::extended("Generic Pad");
        InputMapper.map(&pad, &press(PadButton::FaceA), &sink);
        assert_eq!(
            sink.take(),
            vec![(paths::RIGHT.button_a, ButtonValue::Binary(true))]
        );

        InputMapper.map(&pad, &press(PadButton::FaceY), &sink);
        assert_eq!(
            sink.take(),
            vec![(paths::RIGHT.button_y, ButtonValue::Binary(true))]
        );
    }

    #[test]
    fn dpad_emulates_left_hand_buttons_and_squeeze() {
        let sink = RecordingSink::default();
        let pad = PadInfo::extended("Generic Pad");

        InputMapper.map(&pad, &press(PadButton::DpadRight), &sink);
        assert_eq!(
            sink.take(),
            vec![(paths::LEFT.button_y, ButtonValue::Binary(true))]
        );

        InputMapper.map(&pad, &press(PadButton::DpadUp), &sink);
        assert_eq!(
            sink.take(),
            vec![
                (paths::LEFT.squeeze_click, ButtonValue::Binary(true)),
                (paths::LEFT.squeeze_value, ButtonValue::Scalar(1.0)),
                (paths::LEFT.squeeze_force, ButtonValue::Scalar(1.0)),
            ]
        );

        // Down and left both land on X.
        for button in [PadButton::DpadDown, PadButton::DpadLeft] {
            InputMapper.map(&pad, &press(button), &sink);
            assert_eq!(
                sink.take(),
                vec![(paths::LEFT.button_x, ButtonValue::Binary(true))]
            );
        }
    }

    #[test]
    fn triggers_emit_click_and_value_per_side() {
        let sink = RecordingSink::default();
        let pad = PadInfo::extended("Generic Pad");
        InputMapper.map(
            &pad,
            &PadEvent::Button {
                button: PadButton::TriggerLeft,
                pressed: true,
                value: 0.4,
            },
            &sink,
        );
        assert_eq!(
            sink.take(),
            vec![
                (paths::LEFT.trigger_click, ButtonValue::Binary(true)),
                (paths::LEFT.trigger_value, ButtonValue::Scalar(0.4)),
            ]
        );
    }

    #[test]
    fn thumbsticks_emit_both_axes() {
        let sink = RecordingSink::default();
        let pad = PadInfo::extended("Generic Pad");
        InputMapper.map(
            &pad,
            &PadEvent::Thumbstick {
                side: Side::Right,
                x: 0.25,
                y: -0.75,
            },
            &sink,
        );
        assert_eq!(
            sink.take(),
            vec![
                (paths::RIGHT.thumbstick_x, ButtonValue::Scalar(0.25)),
                (paths::RIGHT.thumbstick_y, ButtonValue::Scalar(-0.75)),
            ]
        );
    }

    #[test]
    fn system_buttons_split_by_kind() {
        let sink = RecordingSink::default();
        let pad = PadInfo::extended("Generic Pad");

        for button in [PadButton::Home, PadButton::Menu] {
            InputMapper.map(&pad, &press(button), &sink);
            assert_eq!(
                sink.take(),
                vec![
                    (paths::RIGHT.system_click, ButtonValue::Binary(true)),
                    (paths::RIGHT.menu_click, ButtonValue::Binary(true)),
                ]
            );
        }

        InputMapper.map(&pad, &press(PadButton::Options), &sink);
        assert_eq!(
            sink.take(),
            vec![
                (paths::LEFT.system_click, ButtonValue::Binary(true)),
                (paths::LEFT.menu_click, ButtonValue::Binary(true)),
            ]
        );
    }

    #[test]
    fn unified_pads_pick_their_side_by_vendor_name() {
        assert_eq!(PadInfo::unified("Joy-Con (L)").side(), Side::Left);
        assert_eq!(PadInfo::unified("Joy-Con (R)").side(), Side::Right);
        assert_eq!(PadInfo::unified("Some Pad").side(), Side::Right);

        let sink = RecordingSink::default();
        InputMapper.map(
            &PadInfo::unified("Joy-Con (L)"),
            &press(PadButton::FaceX),
            &sink,
        );
        assert_eq!(
            sink.take(),
            vec![(paths::LEFT.button_x, ButtonValue::Binary(true))]
        );

        // Controls the unified profile lacks are dropped, not misrouted.
        InputMapper.map(
            &PadInfo::unified("Joy-Con (L)"),
            &press(PadButton::DpadUp),
            &sink,
        );
        assert!(sink.take().is_empty());
    }

    #[tokio::test]
    async fn input_loop_drains_the_channel() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_input_loop(rx, sink.clone()));

        tx.send(ControllerEvent {
            pad: PadInfo::extended("Generic Pad"),
            event: press(PadButton::FaceB),
        })
        .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(
            sink.take(),
            vec![(paths::RIGHT.button_b, ButtonValue::Binary(true))]
        );
    }
}
