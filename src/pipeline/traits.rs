use std::borrow::Cow;

use crate::error::TrainingError;
use crate::types::{FeatureMatrix, IterationReport, UtteranceOutcome};

/// One training utterance: its unit names and a way to obtain its feature frames.
pub trait Utterance: Send + Sync {
    fn id(&self) -> &str;

    fn units(&self) -> &[String];

    /// Frames are requested once per iteration; implementations may load them lazily.
    fn features(&self) -> Result<Cow<'_, FeatureMatrix>, TrainingError>;
}

impl<T: Utterance + ?Sized> Utterance for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn units(&self) -> &[String] {
        (**self).units()
    }

    fn features(&self) -> Result<Cow<'_, FeatureMatrix>, TrainingError> {
        (**self).features()
    }
}

/// Receives progress from a running [`Trainer`](crate::pipeline::runtime::Trainer).
pub trait TrainingObserver: Send + Sync {
    fn utterance_finished(&self, iteration: usize, outcome: &UtteranceOutcome);

    fn iteration_finished(&self, report: &IterationReport);
}
