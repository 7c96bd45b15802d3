//! Button input: debouncing and hand-off to the control loop.

mod button;
mod debounce;

pub use button::{register_buttons, ButtonLatch, ButtonLatches, ButtonWatcher};
pub use debounce::{DebounceState, Debouncer, PressKind};
