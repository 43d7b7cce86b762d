use thiserror::Error;

use crate::lane::Lane;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid lane '{0}': expected 1, 2, lane1 or lane2")]
    InvalidLane(String),

    #[error("invalid signal state '{0}': expected go or stop")]
    InvalidSignalState(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("signal invariant violated: lane1={lane1}, lane2={lane2} while {active} is active")]
    InvariantViolation {
        active: Lane,
        lane1: String,
        lane2: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SignalError {
    pub fn oracle(reason: impl Into<String>) -> Self {
        SignalError::CollaboratorUnavailable {
            collaborator: "presence oracle",
            reason: reason.into(),
        }
    }

    pub fn actuator(reason: impl Into<String>) -> Self {
        SignalError::CollaboratorUnavailable {
            collaborator: "lane actuator",
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;
