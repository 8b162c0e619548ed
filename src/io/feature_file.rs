//! Plain-text feature files: a header line, then one frame per line.

use std::path::Path;

use crate::error::TrainingError;
use crate::types::FeatureMatrix;

pub fn read_features(path: &Path) -> Result<FeatureMatrix, TrainingError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| TrainingError::io("read feature file", e))?;
    parse_features(&text)
}

pub fn parse_features(text: &str) -> Result<FeatureMatrix, TrainingError> {
    let frames = text
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            line.split_whitespace()
                .map(|value| {
                    value.parse::<f64>().map_err(|_| {
                        TrainingError::parse(
                            "feature file",
                            format!("line {}: invalid value `{value}`", number + 1),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    FeatureMatrix::from_frames(frames)
}
