use std::fs;
use std::path::Path;

use hmm_train_rs::{ReestimationReport, TrainerConfig};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub iterations: Vec<IterationSummary>,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub started_at: String,
    pub model_path: String,
    pub label_path: String,
    pub utterance_count: usize,
    pub config: TrainerConfig,
}

#[derive(Debug, Serialize)]
pub struct IterationSummary {
    pub iteration: usize,
    pub scored: usize,
    pub skipped: Vec<SkippedUtterance>,
    pub total_log_likelihood: f64,
    pub mean_frame_log_likelihood: Option<f64>,
    pub reestimation: ReestimationReport,
}

#[derive(Debug, Serialize)]
pub struct SkippedUtterance {
    pub id: String,
    pub reason: String,
}

/// Writes `report` as pretty JSON, creating the parent directory when missing.
pub fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    let mut json = serde_json::to_string_pretty(report).map_err(|err| {
        format!(
            "Failed to serialize training report ({} iterations): {err}",
            report.iterations.len()
        )
    })?;
    json.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create training report directory '{}': {err}",
                parent.display()
            )
        })?;
    }
    fs::write(path, json)
        .map_err(|err| format!("Failed to write training report '{}': {err}", path.display()))
}
