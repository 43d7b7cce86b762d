pub mod collaborator;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod io;
pub mod lane;
pub mod sim;

pub use collaborator::{LaneActuator, PresenceOracle};
pub use controller::{CyclePhase, PhaseOutcome, SignalCycleController};
pub use error::{Result, SignalError};
pub use event::{ControllerEvent, EventSink, PollOutcome, StopReason};
pub use lane::{Lane, Presence, SignalBoard, SignalState};

pub use tokio_util::sync::CancellationToken;
