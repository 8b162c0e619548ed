use std::path::PathBuf;

use crate::config::TrainerConfig;
use crate::error::TrainingError;
use crate::io::model_file::read_models;
use crate::model::ModelDictionary;
use crate::pipeline::defaults::SilentObserver;
use crate::pipeline::runtime::{Trainer, TrainerParts};
use crate::pipeline::traits::TrainingObserver;

#[derive(Default)]
pub struct TrainerBuilder {
    models: Option<ModelDictionary>,
    model_path: Option<PathBuf>,
    config: Option<TrainerConfig>,
    config_path: Option<PathBuf>,
    observer: Option<Box<dyn TrainingObserver>>,
}

impl TrainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory models take precedence over [`with_model_path`](Self::with_model_path).
    pub fn with_models(mut self, models: ModelDictionary) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// An explicit config takes precedence over [`with_config_path`](Self::with_config_path).
    pub fn with_config(mut self, config: TrainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn TrainingObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<Trainer, TrainingError> {
        let models = match (self.models, self.model_path) {
            (Some(models), _) => models,
            (None, Some(path)) => read_models(&path)?,
            (None, None) => {
                return Err(TrainingError::parse(
                    "trainer builder",
                    "no models given; call with_models or with_model_path",
                ))
            }
        };
        if models.is_empty() {
            return Err(TrainingError::parse("trainer builder", "model set has no units"));
        }

        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => TrainerConfig::load(&path)?,
            (None, None) => TrainerConfig::default(),
        };
        config.validate()?;

        tracing::info!(
            units = models.len(),
            dim = models.dim().unwrap_or(0),
            max_iterations = config.max_iterations,
            variance_floor = config.variance_floor,
            "trainer: ready"
        );

        Ok(Trainer::from_parts(TrainerParts {
            models,
            config,
            observer: self.observer.unwrap_or_else(|| Box::new(SilentObserver)),
        }))
    }
}
