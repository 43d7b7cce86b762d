use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use signal_core::config::{CommandSpec, DetectorConfig};
use signal_core::{Lane, Presence, PresenceOracle, SignalError};

use crate::detection::{parse_detections, Detection, VehicleMatcher};
use crate::process::run_spec;

// ─── DetectionReport ──────────────────────────────────────────────────────

/// Everything one capture-and-detect pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub lane: Lane,
    pub image: String,
    pub detections: Vec<Detection>,
    pub presence: Presence,
}

// ─── CameraOracle ─────────────────────────────────────────────────────────

/// Presence oracle backed by a still-capture program and an object
/// detector, both run as subprocesses.
///
/// ```text
/// capture <args {image} {lane}>   ← e.g. fswebcam, writes the frame
///     │
///     ▼ (capture_settle)
/// detect <args {image}>           ← e.g. darknet detect, prints `label: NN%`
///     │
///     ▼
/// VehicleMatcher                  ← whole-label match + confidence floor
/// ```
///
/// No state survives between queries. Dropping a query future kills any
/// child process still running.
#[derive(Debug, Clone)]
pub struct CameraOracle {
    capture: CommandSpec,
    detect: CommandSpec,
    image_path: String,
    matcher: VehicleMatcher,
    capture_settle: Duration,
}

impl CameraOracle {
    pub fn from_config(config: &DetectorConfig) -> signal_core::Result<Self> {
        Ok(Self {
            capture: config.capture.clone(),
            detect: config.detect.clone(),
            image_path: config.image_path.clone(),
            matcher: VehicleMatcher::new(&config.vehicle_labels, config.min_confidence),
            capture_settle: config.capture_settle()?,
        })
    }

    /// Capture a frame for `lane`, run the detector on it and report.
    pub async fn inspect(&self, lane: Lane) -> signal_core::Result<DetectionReport> {
        let vars = [("image", self.image_path.as_str()), ("lane", lane.as_str())];

        run_spec(&self.capture, &vars)
            .await
            .map_err(|e| SignalError::oracle(format!("capture failed: {e}")))?;

        if !self.capture_settle.is_zero() {
            tokio::time::sleep(self.capture_settle).await;
        }

        let output = run_spec(&self.detect, &vars)
            .await
            .map_err(|e| SignalError::oracle(format!("detector failed: {e}")))?;

        let detections = parse_detections(&output.stdout);
        let presence = Presence::from_detected(self.matcher.any_vehicle(&detections));
        tracing::debug!(
            lane = %lane,
            detections = detections.len(),
            presence = %presence,
            "detection pass complete"
        );

        Ok(DetectionReport {
            lane,
            image: self.image_path.clone(),
            detections,
            presence,
        })
    }
}

#[async_trait]
impl PresenceOracle for CameraOracle {
    async fn query(&self, lane: Lane) -> signal_core::Result<Presence> {
        Ok(self.inspect(lane).await?.presence)
    }
}
