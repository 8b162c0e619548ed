use std::borrow::Cow;

use crate::error::TrainingError;
use crate::pipeline::traits::{TrainingObserver, Utterance};
use crate::types::{FeatureMatrix, IterationReport, Transcript, UtteranceOutcome};

impl Utterance for Transcript {
    fn id(&self) -> &str {
        &self.id
    }

    fn units(&self) -> &[String] {
        &self.units
    }

    fn features(&self) -> Result<Cow<'_, FeatureMatrix>, TrainingError> {
        Ok(Cow::Borrowed(&self.features))
    }
}

pub struct SilentObserver;

impl TrainingObserver for SilentObserver {
    fn utterance_finished(&self, _iteration: usize, _outcome: &UtteranceOutcome) {}

    fn iteration_finished(&self, _report: &IterationReport) {}
}
