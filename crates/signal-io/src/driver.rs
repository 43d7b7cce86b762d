use async_trait::async_trait;

use signal_core::config::CommandSpec;
use signal_core::{Lane, LaneActuator, SignalError, SignalState};

use crate::process::run_command;

/// Lane actuator that shells out to a hardware driver program:
///
/// - `<program> <args..> signal <lane> <go|stop>`
/// - `<program> <args..> orient <lane>`
///
/// The program owns pin numbering and servo positions; a non-zero exit is
/// reported as an actuator failure.
#[derive(Debug, Clone)]
pub struct ScriptActuator {
    driver: CommandSpec,
}

impl ScriptActuator {
    pub fn new(driver: CommandSpec) -> Self {
        Self { driver }
    }

    async fn invoke(&self, extra: &[&str]) -> signal_core::Result<()> {
        let mut args = self.driver.args.clone();
        args.extend(extra.iter().map(|s| s.to_string()));
        run_command(&self.driver.program, &args)
            .await
            .map(|_| ())
            .map_err(|e| SignalError::actuator(e.to_string()))
    }
}

#[async_trait]
impl LaneActuator for ScriptActuator {
    async fn set_signal(&self, lane: Lane, state: SignalState) -> signal_core::Result<()> {
        tracing::debug!(lane = %lane, state = %state, "driver: signal");
        self.invoke(&["signal", lane.as_str(), state.as_str()]).await
    }

    async fn orient_sensor(&self, lane: Lane) -> signal_core::Result<()> {
        tracing::debug!(lane = %lane, "driver: orient");
        self.invoke(&["orient", lane.as_str()]).await
    }
}
