/// End-to-end adapter tests against small `sh` scripts standing in for the
/// camera, the detector and the light driver.
#[cfg(test)]
mod adapters {
    use std::path::Path;
    use std::time::Duration;

    use signal_core::config::{CommandSpec, DetectorConfig};
    use signal_core::{Lane, LaneActuator, Presence, PresenceOracle, SignalState};
    use tempfile::TempDir;

    use crate::{CameraOracle, ScriptActuator};

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", &["-c", script])
    }

    /// Capture writes the detector output the test wants into `{image}`;
    /// detection just prints the file back.
    fn detector_config(dir: &Path, frame: &str) -> DetectorConfig {
        let image = dir.join("frame.txt");
        DetectorConfig {
            capture: CommandSpec::new(
                "sh",
                &["-c", &format!("printf '%b' '{frame}' > \"$0\""), "{image}"],
            ),
            detect: CommandSpec::new("sh", &["-c", "cat \"$0\"", "{image}"]),
            image_path: image.to_string_lossy().into_owned(),
            ..DetectorConfig::default()
        }
    }

    #[tokio::test]
    async fn camera_reports_present_for_car() {
        let dir = TempDir::new().unwrap();
        let cfg = detector_config(dir.path(), "Predicted in 0.1 seconds.\\ncar: 91%\\n");
        let oracle = CameraOracle::from_config(&cfg).unwrap();

        assert_eq!(oracle.query(Lane::Lane1).await.unwrap(), Presence::Present);

        let report = oracle.inspect(Lane::Lane2).await.unwrap();
        assert_eq!(report.lane, Lane::Lane2);
        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].confidence, 91);
    }

    #[tokio::test]
    async fn camera_reports_absent_without_vehicle_labels() {
        let dir = TempDir::new().unwrap();
        let cfg = detector_config(dir.path(), "person: 80%\\nscar: 70%\\n");
        let oracle = CameraOracle::from_config(&cfg).unwrap();
        assert_eq!(oracle.query(Lane::Lane1).await.unwrap(), Presence::Absent);
    }

    #[tokio::test]
    async fn camera_passes_lane_to_capture() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("frame.txt");
        let cfg = DetectorConfig {
            capture: CommandSpec::new(
                "sh",
                &[
                    "-c",
                    "if [ \"$1\" = lane2 ]; then echo 'car: 99%' > \"$0\"; else : > \"$0\"; fi",
                    "{image}",
                    "{lane}",
                ],
            ),
            detect: CommandSpec::new("sh", &["-c", "cat \"$0\"", "{image}"]),
            image_path: image.to_string_lossy().into_owned(),
            ..DetectorConfig::default()
        };
        let oracle = CameraOracle::from_config(&cfg).unwrap();
        assert_eq!(oracle.query(Lane::Lane1).await.unwrap(), Presence::Absent);
        assert_eq!(oracle.query(Lane::Lane2).await.unwrap(), Presence::Present);
    }

    #[tokio::test]
    async fn capture_failure_is_an_error_not_absent() {
        let cfg = DetectorConfig {
            capture: sh("echo 'no such device /dev/video0' >&2; exit 1"),
            detect: sh("echo 'car: 90%'"),
            ..DetectorConfig::default()
        };
        let oracle = CameraOracle::from_config(&cfg).unwrap();
        let err = oracle.query(Lane::Lane1).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("capture failed"), "{msg}");
        assert!(msg.contains("/dev/video0"), "{msg}");
    }

    #[tokio::test]
    async fn detector_failure_is_an_error_not_absent() {
        let cfg = DetectorConfig {
            capture: sh("true"),
            detect: sh("exit 2"),
            ..DetectorConfig::default()
        };
        let oracle = CameraOracle::from_config(&cfg).unwrap();
        let err = oracle.query(Lane::Lane1).await.unwrap_err();
        assert!(err.to_string().contains("detector failed"));
    }

    #[tokio::test]
    async fn slow_detector_can_be_timed_out() {
        let cfg = DetectorConfig {
            capture: sh("true"),
            detect: sh("sleep 30; echo 'car: 90%'"),
            ..DetectorConfig::default()
        };
        let oracle = CameraOracle::from_config(&cfg).unwrap();
        let result =
            tokio::time::timeout(Duration::from_millis(300), oracle.query(Lane::Lane1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invalid_capture_settle_is_rejected() {
        let cfg = DetectorConfig {
            capture_settle: -2.0,
            ..DetectorConfig::default()
        };
        assert!(CameraOracle::from_config(&cfg).is_err());
    }

    #[tokio::test]
    async fn script_actuator_passes_lane_and_state() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("driver.log");
        let driver = CommandSpec::new(
            "sh",
            &[
                "-c",
                "echo \"$*\" >> \"$0\"",
                log.to_str().unwrap(),
            ],
        );
        let act = ScriptActuator::new(driver);
        act.set_signal(Lane::Lane2, SignalState::Stop).await.unwrap();
        act.set_signal(Lane::Lane1, SignalState::Go).await.unwrap();
        act.orient_sensor(Lane::Lane1).await.unwrap();

        let written = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec!["signal lane2 stop", "signal lane1 go", "orient lane1"]
        );
    }

    #[tokio::test]
    async fn script_actuator_failure_surfaces() {
        let act = ScriptActuator::new(sh("echo 'gpio busy' >&2; exit 1"));
        let err = act
            .set_signal(Lane::Lane1, SignalState::Go)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("lane actuator unavailable"), "{msg}");
        assert!(msg.contains("gpio busy"), "{msg}");
    }
}
