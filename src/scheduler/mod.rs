//! Background schedulers
//!
//! Each scheduler is started explicitly and returns an owned handle;
//! dropping or stopping the handle ends the task. No global timer state.

mod expiry;
mod simulator;

pub use expiry::{ExpirySweeper, SweeperHandle};
pub use simulator::{SimulatorHandle, StatusSimulator};
