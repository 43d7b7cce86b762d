//! `signal-io` — adapters between the signal controller and the outside
//! world.
//!
//! # Architecture
//!
//! ```text
//! SignalCycleController (signal-core)
//!     │                         │
//!     ▼ PresenceOracle          ▼ LaneActuator
//! CameraOracle               ScriptActuator
//!     │ capture + detect        │ signal/orient
//!     ▼                         ▼
//! process::run_command      ← tokio subprocess, kill_on_drop
//! ```
//!
//! Both adapters are stateless: every call spawns its programs afresh, so a
//! wedged camera or driver never poisons the next query.

pub mod camera;
pub mod detection;
pub mod driver;
pub mod error;
pub mod process;

#[cfg(test)]
mod tests;

pub use camera::{CameraOracle, DetectionReport};
pub use detection::{parse_detections, Detection, VehicleMatcher};
pub use driver::ScriptActuator;
pub use error::IoError;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, IoError>;
