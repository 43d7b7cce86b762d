use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::lane::Lane;

// ---------------------------------------------------------------------------
// ControllerEvent
// ---------------------------------------------------------------------------

/// Decision points of the control loop. Times are milliseconds since the
/// controller started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    PhaseStarted {
        lane: Lane,
        at_ms: u64,
    },
    PollPerformed {
        lane: Lane,
        at_ms: u64,
        elapsed_ms: u64,
        outcome: PollOutcome,
    },
    EarlyExit {
        lane: Lane,
        at_ms: u64,
        elapsed_ms: u64,
    },
    NormalExpiry {
        lane: Lane,
        at_ms: u64,
        elapsed_ms: u64,
    },
    ActuatorFailed {
        lane: Lane,
        command: String,
        attempts: u32,
        reason: String,
    },
    InvariantViolation {
        active: Lane,
        reason: String,
    },
    Stopped {
        at_ms: u64,
        reason: StopReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PollOutcome {
    Present,
    Absent,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    PhaseLimit,
    Fault,
}

impl ControllerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerEvent::PhaseStarted { .. } => "phase_started",
            ControllerEvent::PollPerformed { .. } => "poll_performed",
            ControllerEvent::EarlyExit { .. } => "early_exit",
            ControllerEvent::NormalExpiry { .. } => "normal_expiry",
            ControllerEvent::ActuatorFailed { .. } => "actuator_failed",
            ControllerEvent::InvariantViolation { .. } => "invariant_violation",
            ControllerEvent::Stopped { .. } => "stopped",
        }
    }
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Where the controller publishes its events. Sending never blocks the loop;
/// a dropped receiver just silences the sink.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ControllerEvent>>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: ControllerEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
