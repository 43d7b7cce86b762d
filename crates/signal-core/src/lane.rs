use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Lane
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Lane1,
    Lane2,
}

impl Lane {
    pub fn all() -> &'static [Lane] {
        &[Lane::Lane1, Lane::Lane2]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The lane that holds STOP while this one is GO.
    pub fn other(self) -> Lane {
        match self {
            Lane::Lane1 => Lane::Lane2,
            Lane::Lane2 => Lane::Lane1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Lane1 => "lane1",
            Lane::Lane2 => "lane2",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lane {
    type Err = crate::error::SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "lane1" => Ok(Lane::Lane1),
            "2" | "lane2" => Ok(Lane::Lane2),
            _ => Err(crate::error::SignalError::InvalidLane(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    Go,
    Stop,
}

impl SignalState {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalState::Go => "go",
            SignalState::Stop => "stop",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignalState {
    type Err = crate::error::SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "go" => Ok(SignalState::Go),
            "stop" => Ok(SignalState::Stop),
            _ => Err(crate::error::SignalError::InvalidSignalState(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Answer of a single presence query. A failed query is an `Err` at the
/// oracle boundary and never shows up here as `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub fn from_detected(detected: bool) -> Self {
        if detected {
            Presence::Present
        } else {
            Presence::Absent
        }
    }

    pub fn is_present(self) -> bool {
        self == Presence::Present
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Presence::Present => "present",
            Presence::Absent => "absent",
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SignalBoard
// ---------------------------------------------------------------------------

/// Last commanded state of both lanes, as tracked by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalBoard {
    states: [SignalState; 2],
}

impl Default for SignalBoard {
    fn default() -> Self {
        Self::all_stop()
    }
}

impl SignalBoard {
    pub fn all_stop() -> Self {
        Self {
            states: [SignalState::Stop, SignalState::Stop],
        }
    }

    pub fn get(&self, lane: Lane) -> SignalState {
        self.states[lane.index()]
    }

    pub(crate) fn set(&mut self, lane: Lane, state: SignalState) {
        self.states[lane.index()] = state;
    }

    /// The single GO lane, or `None` when zero or two lanes are GO.
    pub fn go_lane(&self) -> Option<Lane> {
        match (self.get(Lane::Lane1), self.get(Lane::Lane2)) {
            (SignalState::Go, SignalState::Stop) => Some(Lane::Lane1),
            (SignalState::Stop, SignalState::Go) => Some(Lane::Lane2),
            _ => None,
        }
    }

    pub fn is_all_stop(&self) -> bool {
        self.states.iter().all(|s| *s == SignalState::Stop)
    }

    /// Check that `active` is GO and its opposite is STOP.
    pub fn verify(&self, active: Lane) -> crate::Result<()> {
        if self.go_lane() == Some(active) {
            return Ok(());
        }
        Err(crate::SignalError::InvariantViolation {
            active,
            lane1: self.get(Lane::Lane1).to_string(),
            lane2: self.get(Lane::Lane2).to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_lane_is_involution() {
        for lane in Lane::all() {
            assert_ne!(lane.other(), *lane);
            assert_eq!(lane.other().other(), *lane);
        }
    }

    #[test]
    fn lane_parses_short_and_long_forms() {
        assert_eq!("1".parse::<Lane>().unwrap(), Lane::Lane1);
        assert_eq!("lane2".parse::<Lane>().unwrap(), Lane::Lane2);
        assert_eq!(" LANE1 ".parse::<Lane>().unwrap(), Lane::Lane1);
        assert!("3".parse::<Lane>().is_err());
    }

    #[test]
    fn lane_yaml_is_snake_case() {
        let yaml = serde_yaml::to_string(&Lane::Lane2).unwrap();
        assert_eq!(yaml.trim(), "lane2");
    }

    #[test]
    fn signal_state_parses() {
        assert_eq!("GO".parse::<SignalState>().unwrap(), SignalState::Go);
        assert_eq!("stop".parse::<SignalState>().unwrap(), SignalState::Stop);
        assert!("amber".parse::<SignalState>().is_err());
    }

    #[test]
    fn board_starts_all_stop() {
        let board = SignalBoard::default();
        assert!(board.is_all_stop());
        assert_eq!(board.go_lane(), None);
        assert!(board.verify(Lane::Lane1).is_err());
    }

    #[test]
    fn board_verify_accepts_single_go() {
        let mut board = SignalBoard::all_stop();
        board.set(Lane::Lane2, SignalState::Go);
        assert_eq!(board.go_lane(), Some(Lane::Lane2));
        assert!(board.verify(Lane::Lane2).is_ok());
        assert!(board.verify(Lane::Lane1).is_err());
    }

    #[test]
    fn board_verify_rejects_dual_go() {
        let mut board = SignalBoard::all_stop();
        board.set(Lane::Lane1, SignalState::Go);
        board.set(Lane::Lane2, SignalState::Go);
        assert_eq!(board.go_lane(), None);
        let err = board.verify(Lane::Lane1).unwrap_err();
        assert!(err.to_string().contains("lane1=go, lane2=go"));
    }

    #[test]
    fn presence_from_detected() {
        assert!(Presence::from_detected(true).is_present());
        assert_eq!(Presence::from_detected(false), Presence::Absent);
    }
}
