use crate::output::print_json_line;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use signal_core::config::Config;
use signal_core::sim::{ScriptStep, ScriptedOracle, SimulatedActuator};
use signal_core::{
    CancellationToken, ControllerEvent, EventSink, LaneActuator, PollOutcome, Presence,
    PresenceOracle, SignalCycleController, StopReason,
};
use signal_io::{CameraOracle, ScriptActuator};
use std::path::Path;

#[derive(Args)]
pub struct RunArgs {
    /// Use in-process collaborators instead of the camera and light driver
    #[arg(long)]
    pub simulate: bool,

    /// Stop with all lanes red after this many phases
    #[arg(long, value_name = "N")]
    pub max_phases: Option<u64>,

    /// With --simulate: report a vehicle for the first N polls, then empty lanes
    #[arg(long, value_name = "N", requires = "simulate")]
    pub absent_after: Option<usize>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: Option<&Path>, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path).context("failed to load config")?;
    let timing = config.timing.resolve().context("invalid timing config")?;

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let reason = rt.block_on(async {
        let (oracle, actuator) = collaborators(&config, &args)?;
        let (events, mut rx) = EventSink::channel();

        let mut controller = SignalCycleController::new(oracle, actuator, timing)?
            .with_events(events);
        if let Some(n) = args.max_phases {
            controller = controller.with_phase_limit(n);
        }

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received; stopping all lanes");
                interrupt.cancel();
            }
        });

        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = report(&event, json) {
                    tracing::warn!(error = %e, "failed to write event");
                }
            }
        });

        let result = controller.run(cancel).await;
        // Closing the sink lets the printer drain and finish.
        drop(controller);
        finish_printer(printer).await;

        result.context("signal controller halted")
    })?;

    tracing::info!(reason = ?reason, "signal controller stopped");
    Ok(())
}

/// Wait for the event printer to drain. `false` if it panicked or was
/// aborted, in which case some events were not written.
async fn finish_printer(printer: tokio::task::JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "event printer task failed; some events may be missing");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

type Collaborators = (Box<dyn PresenceOracle>, Box<dyn LaneActuator>);

fn collaborators(config: &Config, args: &RunArgs) -> anyhow::Result<Collaborators> {
    if args.simulate {
        let oracle: Box<dyn PresenceOracle> = match args.absent_after {
            Some(n) => Box::new(
                ScriptedOracle::always_absent()
                    .with_script(std::iter::repeat(ScriptStep::Answer(Presence::Present)).take(n)),
            ),
            None => Box::new(ScriptedOracle::always_present()),
        };
        tracing::info!("running with simulated camera and lights");
        let actuator: Box<dyn LaneActuator> = Box::new(SimulatedActuator::new());
        return Ok((oracle, actuator));
    }

    let driver = config.actuator.driver.clone().context(
        "no light driver configured: set actuator.driver in signal.yaml or pass --simulate",
    )?;
    let oracle: Box<dyn PresenceOracle> = Box::new(
        CameraOracle::from_config(&config.detector).context("invalid detector config")?,
    );
    let actuator: Box<dyn LaneActuator> = Box::new(ScriptActuator::new(driver));
    Ok((oracle, actuator))
}

// ---------------------------------------------------------------------------
// Event output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EventLine<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a ControllerEvent,
}

fn report(event: &ControllerEvent, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json_line(&EventLine {
            timestamp: Utc::now(),
            event,
        });
    }
    println!(
        "{}  {:<20} {}",
        Utc::now().format("%H:%M:%S%.3f"),
        event.kind(),
        describe(event)
    );
    Ok(())
}

fn describe(event: &ControllerEvent) -> String {
    match event {
        ControllerEvent::PhaseStarted { lane, .. } => format!("{lane} GO"),
        ControllerEvent::PollPerformed {
            lane,
            elapsed_ms,
            outcome,
            ..
        } => {
            let result = match outcome {
                PollOutcome::Present => "vehicle present".to_string(),
                PollOutcome::Absent => "lane empty".to_string(),
                PollOutcome::Failed { reason } => format!("poll failed ({reason})"),
            };
            format!("{lane} at {:.1}s: {result}", *elapsed_ms as f64 / 1000.0)
        }
        ControllerEvent::EarlyExit {
            lane, elapsed_ms, ..
        } => format!("{lane} released after {:.1}s", *elapsed_ms as f64 / 1000.0),
        ControllerEvent::NormalExpiry {
            lane, elapsed_ms, ..
        } => format!("{lane} expired after {:.1}s", *elapsed_ms as f64 / 1000.0),
        ControllerEvent::ActuatorFailed {
            lane,
            command,
            attempts,
            reason,
        } => format!("{lane} {command} failed after {attempts} attempt(s): {reason}"),
        ControllerEvent::InvariantViolation { active, reason } => {
            format!("active {active}: {reason}")
        }
        ControllerEvent::Stopped { reason, .. } => match reason {
            StopReason::Cancelled => "all lanes STOP (interrupted)".to_string(),
            StopReason::PhaseLimit => "all lanes STOP (phase limit reached)".to_string(),
            StopReason::Fault => "all lanes STOP (fault)".to_string(),
        },
    }
}
