use std::io::Write;

use serde::{Serialize, de::DeserializeOwned};

use crate::analyzer::SequenceResult;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &str, object: &T) {
    let j = serde_json::to_string_pretty(object).unwrap();
    let mut file = std::fs::File::create(output_path).unwrap();
    file.write_all(j.as_bytes()).unwrap();
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &str) -> T {
    let contents =
        std::fs::read_to_string(file_path).expect("Should have been able to read the file");
    serde_json::from_str(&contents).unwrap()
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// Renders the per-pair table and the aggregated index sets as plain text.
pub fn render_report(result: &SequenceResult) -> String {
    let mut s = String::new();
    s += "frame  matches  inliers  translation  flow%   verdict\n";
    for (i, m) in result.metrics.iter().enumerate() {
        s += format!(
            "{:>5}  {:>7}  {:>7}  {:>11}  {:>5.2}   {}\n",
            i + 1,
            m.match_count,
            fmt_opt(m.inlier_ratio),
            fmt_opt(m.translation_px),
            m.moving_pixel_pct,
            result.verdicts[i].label()
        )
        .as_str();
    }
    s += format!(
        "\ncamera movement frames: {:?}\nobject movement frames: {:?}\nflow-only detections:   {:?}\n",
        result.camera_movement_indices, result.object_movement_indices, result.flow_object_indices
    )
    .as_str();
    s
}

/// Writes the plain-text report to a file.
pub fn write_report(output_path: &str, result: &SequenceResult) {
    let mut file = std::fs::File::create(output_path).unwrap();
    file.write_all(render_report(result).as_bytes()).unwrap();
}
