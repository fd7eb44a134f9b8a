//! Run control: shared state, pause/cancel protocol, throttling and progress

pub mod controller;
pub mod progress;
pub mod throttle;

pub use controller::{Checkpoint, Phase, RunController, RunSnapshot, RunState};
pub use progress::{ProgressEvent, ProgressReporter};
pub use throttle::{RunMode, ThrottleSettings, ThrottleSpeed};
