use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use signal_core::config::Config;
use signal_core::{Lane, LaneActuator};
use signal_io::{CameraOracle, ScriptActuator, VehicleMatcher};
use std::path::Path;

#[derive(Args)]
pub struct DetectArgs {
    /// Lane to inspect: 1, 2, lane1 or lane2
    pub lane: Lane,

    /// Point the camera at the lane through the light driver first
    #[arg(long)]
    pub orient: bool,
}

pub fn run(config_path: Option<&Path>, args: DetectArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path).context("failed to load config")?;
    let timing = config.timing.resolve().context("invalid timing config")?;
    let oracle = CameraOracle::from_config(&config.detector).context("invalid detector config")?;

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let report = rt.block_on(async {
        if args.orient {
            let driver = config
                .actuator
                .driver
                .clone()
                .context("--orient needs actuator.driver in signal.yaml")?;
            tokio::time::timeout(
                timing.actuator_timeout,
                ScriptActuator::new(driver).orient_sensor(args.lane),
            )
            .await
            .context("camera orientation timed out")??;
        }

        let report = tokio::time::timeout(timing.oracle_timeout, oracle.inspect(args.lane))
            .await
            .with_context(|| {
                format!(
                    "detection timed out after {}s",
                    timing.oracle_timeout.as_secs_f64()
                )
            })??;
        anyhow::Ok(report)
    })?;

    if json {
        return print_json(&report);
    }

    let matcher = VehicleMatcher::new(
        &config.detector.vehicle_labels,
        config.detector.min_confidence,
    );
    if report.detections.is_empty() {
        println!("No objects detected in {}.", report.image);
    } else {
        let rows: Vec<Vec<String>> = report
            .detections
            .iter()
            .map(|d| {
                vec![
                    d.label.clone(),
                    format!("{}%", d.confidence),
                    if matcher.is_vehicle(d) { "yes" } else { "" }.to_string(),
                ]
            })
            .collect();
        print_table(&["LABEL", "CONFIDENCE", "VEHICLE"], &rows);
        println!();
    }
    println!("{}: {}", report.lane, report.presence);
    Ok(())
}
