//! The hold-to-warp state machine and its timers.

pub mod arrival;
pub mod controller;
pub mod fade;
pub mod state;
pub mod timer;

pub use arrival::ArrivalSequence;
pub use controller::{ControllerDeps, ControllerStats, WarpController};
pub use state::{COMMIT_THRESHOLD, Progress, RING_RADIUS, WarpSession, WarpSnapshot, WarpState};
pub use timer::ChargeTimer;
