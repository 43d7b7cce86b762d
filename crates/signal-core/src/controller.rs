//! The two-lane signal cycle.
//!
//! ```text
//!            normal expiry / early exit
//!   Lane1Active ────────────────────────▶ Lane2Active
//!        ▲                                    │
//!        └────────────────────────────────────┘
//!            normal expiry / early exit
//! ```
//!
//! Each phase gives one lane GO for up to `cycle_time`. Once the remaining
//! time drops to `check_window`, the sensor is turned to the active lane and
//! the oracle is polled every `poll_interval`. An `Absent` answer ends the
//! phase early: the old lane keeps GO for `settle_delay`, the lanes flip,
//! and the new lane holds GO for another `settle_delay` before its own phase
//! timer starts. Oracle failures and timeouts count as "keep going".

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collaborator::{LaneActuator, PresenceOracle};
use crate::config::Timing;
use crate::event::{ControllerEvent, EventSink, PollOutcome, StopReason};
use crate::lane::{Lane, Presence, SignalBoard, SignalState};
use crate::{Result, SignalError};

// ---------------------------------------------------------------------------
// CyclePhase
// ---------------------------------------------------------------------------

/// Run-time record of the phase in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePhase {
    pub active_lane: Lane,
    pub phase_start: Instant,
    pub phase_duration: Duration,
    pub check_window: Duration,
}

impl CyclePhase {
    pub fn new(active_lane: Lane, phase_start: Instant, timing: &Timing) -> Self {
        Self {
            active_lane,
            phase_start,
            phase_duration: timing.cycle_time,
            check_window: timing.check_window.min(timing.cycle_time),
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.phase_start)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.phase_duration.saturating_sub(self.elapsed(now))
    }

    pub fn deadline(&self) -> Instant {
        self.phase_start + self.phase_duration
    }

    pub fn window_opens_at(&self) -> Instant {
        self.phase_start + (self.phase_duration - self.check_window)
    }

    pub fn in_check_window(&self, now: Instant) -> bool {
        !self.check_window.is_zero() && self.remaining(now) <= self.check_window
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline()
    }
}

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    NormalExpiry,
    EarlyExit,
    Cancelled,
}

// ---------------------------------------------------------------------------
// SignalCycleController
// ---------------------------------------------------------------------------

pub struct SignalCycleController<O, A> {
    oracle: O,
    actuator: A,
    timing: Timing,
    events: EventSink,
    board: SignalBoard,
    phase_limit: Option<u64>,
    origin: Instant,
}

impl<O, A> SignalCycleController<O, A>
where
    O: PresenceOracle,
    A: LaneActuator,
{
    pub fn new(oracle: O, actuator: A, timing: Timing) -> Result<Self> {
        timing.check()?;
        Ok(Self {
            oracle,
            actuator,
            timing,
            events: EventSink::disabled(),
            board: SignalBoard::all_stop(),
            phase_limit: None,
            origin: Instant::now(),
        })
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Stop cleanly (all lanes STOP) after this many phases.
    pub fn with_phase_limit(mut self, phases: u64) -> Self {
        self.phase_limit = Some(phases);
        self
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn board(&self) -> SignalBoard {
        self.board
    }

    /// Run the cycle until `cancel` fires or the phase limit is reached.
    ///
    /// Every exit path leaves both lanes commanded to STOP. Collaborator
    /// failures never end the loop: while the actuator is down the lanes
    /// stay STOP and the handover is retried. The only error is an
    /// invariant violation, returned after the lanes have been stopped.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<StopReason> {
        self.origin = Instant::now();
        let mut completed: u64 = 0;

        info!(
            cycle_time = ?self.timing.cycle_time,
            check_window = ?self.timing.check_window,
            poll_interval = ?self.timing.poll_interval,
            "signal controller starting"
        );

        let Some(mut lane) = self.establish(Lane::Lane1, &cancel).await? else {
            return Ok(self.shutdown(StopReason::Cancelled).await);
        };

        loop {
            let phase = self.begin_phase(lane).await?;
            let outcome = self.run_phase(&phase, &cancel).await;
            completed += 1;

            if outcome == PhaseOutcome::Cancelled {
                return Ok(self.shutdown(StopReason::Cancelled).await);
            }

            if outcome == PhaseOutcome::EarlyExit
                && !self.pause(self.timing.settle_delay, &cancel).await
            {
                return Ok(self.shutdown(StopReason::Cancelled).await);
            }

            if self.phase_limit.is_some_and(|limit| completed >= limit) {
                return Ok(self.shutdown(StopReason::PhaseLimit).await);
            }

            let next = lane.other();
            match self.switch_to(next).await? {
                Some(holder) if holder == next => {
                    lane = next;
                    if outcome == PhaseOutcome::EarlyExit
                        && !self.pause(self.timing.settle_delay, &cancel).await
                    {
                        return Ok(self.shutdown(StopReason::Cancelled).await);
                    }
                }
                Some(holder) => {
                    warn!(lane = %holder, "lane switch aborted; current lane keeps right-of-way");
                    lane = holder;
                }
                None => {
                    warn!(lane = %next, "lane switch left every lane at STOP; retrying");
                    if !self.pause(self.timing.poll_interval, &cancel).await {
                        return Ok(self.shutdown(StopReason::Cancelled).await);
                    }
                    match self.establish(next, &cancel).await? {
                        Some(holder) => lane = holder,
                        None => return Ok(self.shutdown(StopReason::Cancelled).await),
                    }
                }
            }
        }
    }

    /// Retry the handover to `target` every `poll_interval` until some lane
    /// holds GO. Lanes stay STOP in between. `None` if cancelled first.
    async fn establish(&mut self, target: Lane, cancel: &CancellationToken) -> Result<Option<Lane>> {
        loop {
            if let Some(holder) = self.switch_to(target).await? {
                return Ok(Some(holder));
            }
            warn!(lane = %target, "no lane has right-of-way; retrying");
            if !self.pause(self.timing.poll_interval, cancel).await {
                return Ok(None);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase execution
    // -----------------------------------------------------------------------

    async fn begin_phase(&mut self, lane: Lane) -> Result<CyclePhase> {
        if let Err(e) = self.board.verify(lane) {
            return Err(self.fault(lane, e).await);
        }
        let phase = CyclePhase::new(lane, Instant::now(), &self.timing);
        info!(lane = %lane, "phase started");
        self.events.emit(ControllerEvent::PhaseStarted {
            lane,
            at_ms: self.at_ms(),
        });
        Ok(phase)
    }

    /// Drive one phase for `phase.active_lane`. Both lanes use this routine.
    async fn run_phase(&mut self, phase: &CyclePhase, cancel: &CancellationToken) -> PhaseOutcome {
        let lane = phase.active_lane;

        loop {
            let now = Instant::now();
            if phase.is_expired(now) {
                let elapsed_ms = millis(phase.elapsed(now));
                info!(lane = %lane, elapsed_ms, "phase expired");
                self.events.emit(ControllerEvent::NormalExpiry {
                    lane,
                    at_ms: self.at_ms(),
                    elapsed_ms,
                });
                return PhaseOutcome::NormalExpiry;
            }

            if !phase.in_check_window(now) {
                let wake = if phase.check_window.is_zero() {
                    phase.deadline()
                } else {
                    phase.window_opens_at()
                };
                if !self.pause_until(wake, cancel).await {
                    return PhaseOutcome::Cancelled;
                }
                continue;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PhaseOutcome::Cancelled,
                outcome = self.poll(phase) => outcome,
            };

            let elapsed_ms = millis(phase.elapsed(Instant::now()));
            self.events.emit(ControllerEvent::PollPerformed {
                lane,
                at_ms: self.at_ms(),
                elapsed_ms,
                outcome: outcome.clone(),
            });

            if outcome == PollOutcome::Absent {
                info!(lane = %lane, elapsed_ms, "no vehicle waiting; ending phase early");
                self.events.emit(ControllerEvent::EarlyExit {
                    lane,
                    at_ms: self.at_ms(),
                    elapsed_ms,
                });
                return PhaseOutcome::EarlyExit;
            }

            let next_tick = (Instant::now() + self.timing.poll_interval).min(phase.deadline());
            if !self.pause_until(next_tick, cancel).await {
                return PhaseOutcome::Cancelled;
            }
        }
    }

    /// Orient the sensor and ask the oracle about the active lane. The query
    /// is cut off at `oracle_timeout` or at the phase deadline, whichever
    /// comes first.
    async fn poll(&self, phase: &CyclePhase) -> PollOutcome {
        let lane = phase.active_lane;

        match tokio::time::timeout(self.timing.actuator_timeout, self.actuator.orient_sensor(lane))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(lane = %lane, error = %e, "sensor orientation failed; skipping poll");
                return PollOutcome::Failed {
                    reason: e.to_string(),
                };
            }
            Err(_) => {
                warn!(lane = %lane, "sensor orientation timed out; skipping poll");
                return PollOutcome::Failed {
                    reason: format!(
                        "sensor orientation timed out after {:?}",
                        self.timing.actuator_timeout
                    ),
                };
            }
        }

        let started = Instant::now();
        let cutoff = (started + self.timing.oracle_timeout).min(phase.deadline());
        match tokio::time::timeout_at(cutoff, self.oracle.query(lane)).await {
            Ok(Ok(Presence::Present)) => {
                debug!(lane = %lane, "vehicle present");
                PollOutcome::Present
            }
            Ok(Ok(Presence::Absent)) => PollOutcome::Absent,
            Ok(Err(e)) => {
                warn!(lane = %lane, error = %e, "presence query failed; continuing phase");
                PollOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                let waited = Instant::now().saturating_duration_since(started);
                warn!(lane = %lane, waited_ms = millis(waited), "presence query timed out; continuing phase");
                PollOutcome::Failed {
                    reason: SignalError::oracle(format!("no answer within {waited:?}")).to_string(),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Actuation
    // -----------------------------------------------------------------------

    /// Give `target` right-of-way: STOP the other lane, then GO `target`.
    ///
    /// Returns the lane holding GO afterwards: `target` on success, the
    /// previous lane when the switch was abandoned, or `None` when every
    /// lane is left at STOP.
    ///
    /// A failed GO may still have reached the light (an acknowledgement can
    /// time out after the output changed), so `target` is commanded back to
    /// STOP before the previous lane is restored. If that STOP is not
    /// acknowledged either, nothing is restored.
    async fn switch_to(&mut self, target: Lane) -> Result<Option<Lane>> {
        let previous = self.board.go_lane();

        if !self.command(target.other(), SignalState::Stop).await {
            return Ok(previous);
        }

        if !self.command(target, SignalState::Go).await {
            if !self.command(target, SignalState::Stop).await {
                warn!(lane = %target, "activation and rollback both failed; holding all lanes at STOP");
                return Ok(None);
            }
            let Some(prev) = previous else {
                return Ok(None);
            };
            warn!(lane = %prev, "restoring previous lane after failed activation");
            if self.command(prev, SignalState::Go).await {
                return Ok(Some(prev));
            }
            return Ok(None);
        }

        if let Err(e) = self.board.verify(target) {
            return Err(self.fault(target, e).await);
        }
        debug!(lane = %target, "right-of-way switched");
        Ok(Some(target))
    }

    /// Issue one signal command with bounded retries. The board only records
    /// states the actuator acknowledged.
    async fn command(&mut self, lane: Lane, state: SignalState) -> bool {
        let attempts = self.timing.actuator_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result =
                tokio::time::timeout(self.timing.actuator_timeout, self.actuator.set_signal(lane, state))
                    .await;
            match result {
                Ok(Ok(())) => {
                    self.board.set(lane, state);
                    return true;
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = SignalError::actuator(format!(
                        "no acknowledgement within {:?}",
                        self.timing.actuator_timeout
                    ))
                    .to_string()
                }
            }
            warn!(lane = %lane, state = %state, attempt, error = %last_error, "actuator command failed");
        }

        error!(lane = %lane, state = %state, attempts, "actuator command gave up");
        self.events.emit(ControllerEvent::ActuatorFailed {
            lane,
            command: format!("set {state}"),
            attempts,
            reason: last_error,
        });
        false
    }

    /// Command both lanes to STOP, the currently-GO one first.
    async fn all_stop(&mut self) {
        let first = self.board.go_lane().unwrap_or(Lane::Lane1);
        for lane in [first, first.other()] {
            if !self.command(lane, SignalState::Stop).await {
                error!(lane = %lane, "could not force STOP during shutdown");
            }
        }
    }

    async fn shutdown(&mut self, reason: StopReason) -> StopReason {
        info!(?reason, "signal controller stopping; all lanes to STOP");
        self.all_stop().await;
        self.events.emit(ControllerEvent::Stopped {
            at_ms: self.at_ms(),
            reason,
        });
        reason
    }

    async fn fault(&mut self, active: Lane, err: SignalError) -> SignalError {
        error!(lane = %active, error = %err, "signal invariant violated; forcing all lanes to STOP");
        self.events.emit(ControllerEvent::InvariantViolation {
            active,
            reason: err.to_string(),
        });
        self.shutdown(StopReason::Fault).await;
        err
    }

    // -----------------------------------------------------------------------
    // Time helpers
    // -----------------------------------------------------------------------

    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        self.pause_until(Instant::now() + duration, cancel).await
    }

    /// Sleep until `deadline`; `false` if cancelled first.
    async fn pause_until(&self, deadline: Instant, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep_until(deadline) => true,
        }
    }

    fn at_ms(&self) -> u64 {
        millis(self.origin.elapsed())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
