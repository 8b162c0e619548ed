//! Baum-Welch training of HMM unit models with diagonal Gaussian-mixture emissions.
//!
//! Each utterance's units are chained into a [`CompositeLattice`], scored with log-domain
//! forward-backward, and folded into a [`StatisticsAccumulator`]; once every utterance of
//! an iteration has been folded, [`reestimate`] replaces the model parameters.

pub mod config;
pub mod error;
pub mod io;
pub mod logmath;
pub mod model;
pub mod pipeline;
pub mod training;
pub mod types;

pub use config::TrainerConfig;
pub use error::TrainingError;
pub use model::{Gaussian, Mixture, ModelDictionary, State, TransitionTable, UnitId, UnitModel};
pub use pipeline::builder::TrainerBuilder;
pub use pipeline::defaults::SilentObserver;
pub use pipeline::runtime::{run_iteration, Trainer};
pub use pipeline::traits::{TrainingObserver, Utterance};
pub use training::{
    forward_backward, reestimate, CompositeLattice, ObservationTable, OccupancyTable, Posteriors,
    StatisticsAccumulator,
};
pub use types::{
    FeatureMatrix, IterationReport, ReestimationReport, Transcript, UtteranceOutcome,
};
