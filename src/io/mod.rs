//! File formats around the training core: model definitions, label files and
//! feature files. Nothing in `training` depends on this module.

pub mod feature_file;
pub mod label_file;
pub mod model_file;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::TrainingError;
use crate::pipeline::traits::Utterance;
use crate::types::FeatureMatrix;

pub use feature_file::{parse_features, read_features};
pub use label_file::{parse_labels, read_labels, LabelEntry};
pub use model_file::{parse_models, read_models, write_models, write_models_to};

/// A labelled utterance whose frames stay on disk until the trainer asks for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledUtterance {
    id: String,
    units: Vec<String>,
    feature_path: PathBuf,
}

impl LabelledUtterance {
    pub fn new(
        id: impl Into<String>,
        units: Vec<String>,
        feature_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            units,
            feature_path: feature_path.into(),
        }
    }

    pub fn feature_path(&self) -> &Path {
        &self.feature_path
    }
}

impl Utterance for LabelledUtterance {
    fn id(&self) -> &str {
        &self.id
    }

    fn units(&self) -> &[String] {
        &self.units
    }

    fn features(&self) -> Result<Cow<'_, FeatureMatrix>, TrainingError> {
        read_features(&self.feature_path).map(Cow::Owned)
    }
}

/// Reads a label file and pairs every entry with its feature file under `data_root`.
pub fn load_utterances(
    label_path: &Path,
    data_root: &Path,
) -> Result<Vec<LabelledUtterance>, TrainingError> {
    let utterances: Vec<LabelledUtterance> = read_labels(label_path)?
        .into_iter()
        .map(|entry| {
            let feature_path = entry.feature_path(data_root);
            LabelledUtterance::new(entry.label_path, entry.units, feature_path)
        })
        .collect();
    tracing::info!(
        labels = %label_path.display(),
        data_root = %data_root.display(),
        utterances = utterances.len(),
        "io: utterances listed"
    );
    Ok(utterances)
}
