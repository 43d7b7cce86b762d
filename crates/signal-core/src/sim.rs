//! In-process collaborators for dry runs and tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::collaborator::{LaneActuator, PresenceOracle};
use crate::lane::{Lane, Presence, SignalBoard, SignalState};
use crate::{Result, SignalError};

// ---------------------------------------------------------------------------
// SimulatedActuator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    Signal {
        lane: Lane,
        state: SignalState,
        at: Duration,
    },
    Orient {
        lane: Lane,
        at: Duration,
    },
}

#[derive(Debug, Default)]
struct ActuatorLog {
    commands: Vec<ActuatorCommand>,
    board: SignalBoard,
    dual_go_seen: bool,
    skip_before_failure: u32,
    pending_failures: u32,
}

/// Records every command and the resulting per-lane outputs. Clones share
/// the same log, so a test can keep one handle while the controller owns
/// the other.
#[derive(Debug, Clone)]
pub struct SimulatedActuator {
    origin: Instant,
    log: Arc<Mutex<ActuatorLog>>,
}

impl Default for SimulatedActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            log: Arc::new(Mutex::new(ActuatorLog::default())),
        }
    }

    /// Make the next `n` `set_signal` calls fail without changing outputs.
    pub fn fail_next_signals(&self, n: u32) {
        self.fail_signals(0, n);
    }

    /// Let `skip` `set_signal` calls through, then fail the following `n`.
    pub fn fail_signals(&self, skip: u32, n: u32) {
        if let Ok(mut log) = self.log.lock() {
            log.skip_before_failure = skip;
            log.pending_failures = n;
        }
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.log
            .lock()
            .map(|l| l.commands.clone())
            .unwrap_or_default()
    }

    pub fn signal_commands(&self) -> Vec<(Lane, SignalState, Duration)> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                ActuatorCommand::Signal { lane, state, at } => Some((lane, state, at)),
                ActuatorCommand::Orient { .. } => None,
            })
            .collect()
    }

    pub fn board(&self) -> SignalBoard {
        self.log.lock().map(|l| l.board).unwrap_or_default()
    }

    /// True if both lanes were ever GO at the same time.
    pub fn dual_go_seen(&self) -> bool {
        self.log.lock().map(|l| l.dual_go_seen).unwrap_or(false)
    }
}

#[async_trait]
impl LaneActuator for SimulatedActuator {
    async fn set_signal(&self, lane: Lane, state: SignalState) -> Result<()> {
        let at = self.origin.elapsed();
        let mut log = self
            .log
            .lock()
            .map_err(|_| SignalError::actuator("simulated actuator log poisoned"))?;
        if log.pending_failures > 0 {
            if log.skip_before_failure > 0 {
                log.skip_before_failure -= 1;
            } else {
                log.pending_failures -= 1;
                return Err(SignalError::actuator(format!(
                    "simulated failure setting {lane} {state}"
                )));
            }
        }
        log.commands.push(ActuatorCommand::Signal { lane, state, at });
        log.board.set(lane, state);
        if log.board.get(Lane::Lane1) == SignalState::Go
            && log.board.get(Lane::Lane2) == SignalState::Go
        {
            log.dual_go_seen = true;
        }
        tracing::debug!(lane = %lane, state = %state, "sim: signal");
        Ok(())
    }

    async fn orient_sensor(&self, lane: Lane) -> Result<()> {
        let at = self.origin.elapsed();
        let mut log = self
            .log
            .lock()
            .map_err(|_| SignalError::actuator("simulated actuator log poisoned"))?;
        log.commands.push(ActuatorCommand::Orient { lane, at });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

/// One scripted oracle answer. `Fail` produces a collaborator error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Answer(Presence),
    Fail(String),
}

#[derive(Debug)]
struct OracleScript {
    steps: VecDeque<ScriptStep>,
    fallback: Presence,
    queries: Vec<(Lane, Duration)>,
}

/// Answers from a queue of scripted steps, then from a fixed fallback.
#[derive(Debug, Clone)]
pub struct ScriptedOracle {
    origin: Instant,
    latency: Duration,
    script: Arc<Mutex<OracleScript>>,
}

impl ScriptedOracle {
    pub fn new(fallback: Presence) -> Self {
        Self {
            origin: Instant::now(),
            latency: Duration::ZERO,
            script: Arc::new(Mutex::new(OracleScript {
                steps: VecDeque::new(),
                fallback,
                queries: Vec::new(),
            })),
        }
    }

    pub fn always_present() -> Self {
        Self::new(Presence::Present)
    }

    pub fn always_absent() -> Self {
        Self::new(Presence::Absent)
    }

    pub fn with_script(self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        if let Ok(mut s) = self.script.lock() {
            s.steps.extend(steps);
        }
        self
    }

    /// Every query sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Lanes queried and when each query started.
    pub fn queries(&self) -> Vec<(Lane, Duration)> {
        self.script
            .lock()
            .map(|s| s.queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PresenceOracle for ScriptedOracle {
    async fn query(&self, lane: Lane) -> Result<Presence> {
        let step = {
            let mut s = self
                .script
                .lock()
                .map_err(|_| SignalError::oracle("scripted oracle poisoned"))?;
            s.queries.push((lane, self.origin.elapsed()));
            let fallback = s.fallback;
            s.steps
                .pop_front()
                .unwrap_or(ScriptStep::Answer(fallback))
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match step {
            ScriptStep::Answer(p) => Ok(p),
            ScriptStep::Fail(reason) => Err(SignalError::oracle(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn actuator_tracks_board_and_dual_go() {
        let act = SimulatedActuator::new();
        act.set_signal(Lane::Lane2, SignalState::Stop).await.unwrap();
        act.set_signal(Lane::Lane1, SignalState::Go).await.unwrap();
        assert_eq!(act.board().go_lane(), Some(Lane::Lane1));
        assert!(!act.dual_go_seen());

        act.set_signal(Lane::Lane2, SignalState::Go).await.unwrap();
        assert!(act.dual_go_seen());
        assert_eq!(act.signal_commands().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_injected_failures_leave_outputs_untouched() {
        let act = SimulatedActuator::new();
        act.fail_next_signals(1);
        assert!(act.set_signal(Lane::Lane1, SignalState::Go).await.is_err());
        assert!(act.board().is_all_stop());
        act.set_signal(Lane::Lane1, SignalState::Go).await.unwrap();
        assert_eq!(act.board().go_lane(), Some(Lane::Lane1));
    }

    #[tokio::test(start_paused = true)]
    async fn oracle_plays_script_then_fallback() {
        let oracle = ScriptedOracle::always_present().with_script([
            ScriptStep::Fail("camera offline".into()),
            ScriptStep::Answer(Presence::Absent),
        ]);
        let err = oracle.query(Lane::Lane1).await.unwrap_err();
        assert!(err.to_string().contains("camera offline"));
        assert_eq!(oracle.query(Lane::Lane2).await.unwrap(), Presence::Absent);
        assert_eq!(oracle.query(Lane::Lane1).await.unwrap(), Presence::Present);
        assert_eq!(oracle.queries().len(), 3);
        assert_eq!(oracle.queries()[1].0, Lane::Lane2);
    }

    #[tokio::test(start_paused = true)]
    async fn oracle_latency_advances_clock() {
        let oracle = ScriptedOracle::always_absent().with_latency(Duration::from_secs(3));
        let start = Instant::now();
        oracle.query(Lane::Lane1).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
