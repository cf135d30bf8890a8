//! Controller input and haptics: maps whatever physical pads are connected
//! onto the fixed logical controller layout, and shapes time-windowed
//! vibration requests into bounded haptic pulses. Both run event-driven on
//! their own cadence, fully independent of the pose path.

pub mod haptics;
pub mod mapper;

pub use haptics::{
    HapticEngine, HapticError, HapticProvider, HapticPulse, HapticRequest, HapticScheduler,
    LogHapticProvider,
};
pub use mapper::{ControllerEvent, InputMapper, PadButton, PadEvent, PadInfo, PadProfile};
