use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

// ─── Detection ────────────────────────────────────────────────────────────

/// One object reported by the detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub label: String,
    /// Percent, 0-100.
    pub confidence: u8,
}

static DETECTION_RE: OnceLock<Regex> = OnceLock::new();

fn detection_re() -> &'static Regex {
    DETECTION_RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _-]*?)\s*:\s*(\d{1,3})%\s*$").unwrap()
    })
}

/// Extract `label: NN%` lines from detector stdout. Anything else (timing
/// banners, layer dumps) is skipped.
pub fn parse_detections(output: &str) -> Vec<Detection> {
    output
        .lines()
        .filter_map(|line| {
            let caps = detection_re().captures(line)?;
            let confidence: u8 = caps[2].parse().ok()?;
            if confidence > 100 {
                return None;
            }
            Some(Detection {
                label: caps[1].to_string(),
                confidence,
            })
        })
        .collect()
}

// ─── VehicleMatcher ───────────────────────────────────────────────────────

/// Decides whether a detection list means "vehicle waiting".
///
/// Labels are compared whole and case-insensitively: `car` matches `Car`
/// but never `scar` or `carton`.
#[derive(Debug, Clone)]
pub struct VehicleMatcher {
    labels: Vec<String>,
    min_confidence: u8,
}

impl VehicleMatcher {
    pub fn new<I, S>(labels: I, min_confidence: u8) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|l| l.as_ref().trim().to_ascii_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
            min_confidence,
        }
    }

    pub fn is_vehicle(&self, detection: &Detection) -> bool {
        detection.confidence >= self.min_confidence
            && self
                .labels
                .iter()
                .any(|l| detection.label.eq_ignore_ascii_case(l))
    }

    pub fn any_vehicle(&self, detections: &[Detection]) -> bool {
        detections.iter().any(|d| self.is_vehicle(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DARKNET_OUTPUT: &str = "\
layer     filters    size              input                output
    0 conv     16  3 x 3 / 1   416 x 416 x   3   ->   416 x 416 x  16  0.150 BFLOPs
Loading weights from yolov3-tiny.weights...Done!
lane_pic.jpg: Predicted in 0.812000 seconds.
car: 87%
truck: 54%
person: 31%
";

    #[test]
    fn parses_label_lines_only() {
        let dets = parse_detections(DARKNET_OUTPUT);
        assert_eq!(
            dets,
            vec![
                Detection {
                    label: "car".into(),
                    confidence: 87
                },
                Detection {
                    label: "truck".into(),
                    confidence: 54
                },
                Detection {
                    label: "person".into(),
                    confidence: 31
                },
            ]
        );
    }

    #[test]
    fn multi_word_labels() {
        let dets = parse_detections("traffic light: 66%\nfire hydrant:12%");
        assert_eq!(dets[0].label, "traffic light");
        assert_eq!(dets[1].label, "fire hydrant");
        assert_eq!(dets[1].confidence, 12);
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        assert!(parse_detections("car: 250%").is_empty());
    }

    #[test]
    fn matcher_is_whole_label_and_case_insensitive() {
        let m = VehicleMatcher::new(["car"], 0);
        let det = |label: &str| Detection {
            label: label.into(),
            confidence: 90,
        };
        assert!(m.is_vehicle(&det("Car")));
        assert!(!m.is_vehicle(&det("scar")));
        assert!(!m.is_vehicle(&det("carton")));
        assert!(!m.is_vehicle(&det("truck")));
    }

    #[test]
    fn matcher_respects_min_confidence() {
        let m = VehicleMatcher::new(["car", "truck"], 60);
        let dets = parse_detections(DARKNET_OUTPUT);
        assert!(m.any_vehicle(&dets));
        let weak = parse_detections("car: 40%\ntruck: 59%");
        assert!(!m.any_vehicle(&weak));
    }

    #[test]
    fn banner_mentioning_car_is_not_a_detection() {
        let m = VehicleMatcher::new(["car"], 0);
        let dets = parse_detections("Loading weights from car-model.weights...Done!\n");
        assert!(!m.any_vehicle(&dets));
    }

    #[test]
    fn empty_labels_never_match() {
        let m = VehicleMatcher::new(Vec::<String>::new(), 0);
        assert!(!m.any_vehicle(&parse_detections(DARKNET_OUTPUT)));
    }
}
