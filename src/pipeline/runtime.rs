use crate::config::TrainerConfig;
use crate::error::TrainingError;
use crate::model::{ModelDictionary, UnitId};
use crate::pipeline::defaults::SilentObserver;
use crate::pipeline::traits::{TrainingObserver, Utterance};
use crate::training::{
    forward_backward, reestimate, CompositeLattice, ObservationTable, OccupancyTable,
    StatisticsAccumulator,
};
use crate::types::{IterationReport, ReestimationReport, UtteranceOutcome};

/// Drives Baum-Welch iterations over a model set it owns.
pub struct Trainer {
    models: ModelDictionary,
    config: TrainerConfig,
    observer: Box<dyn TrainingObserver>,
    iterations_run: usize,
}

pub(crate) struct TrainerParts {
    pub models: ModelDictionary,
    pub config: TrainerConfig,
    pub observer: Box<dyn TrainingObserver>,
}

impl Trainer {
    pub fn new(models: ModelDictionary, config: TrainerConfig) -> Self {
        Self::from_parts(TrainerParts {
            models,
            config,
            observer: Box::new(SilentObserver),
        })
    }

    pub(crate) fn from_parts(parts: TrainerParts) -> Self {
        Self {
            models: parts.models,
            config: parts.config,
            observer: parts.observer,
            iterations_run: 0,
        }
    }

    pub fn models(&self) -> &ModelDictionary {
        &self.models
    }

    pub fn into_models(self) -> ModelDictionary {
        self.models
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn iterations_run(&self) -> usize {
        self.iterations_run
    }

    /// Scores every utterance under the current parameters, then re-estimates them.
    ///
    /// Returns an error only for run-level failures (an invalid config or an unknown
    /// unit); per-utterance problems are reported as [`UtteranceOutcome::Skipped`].
    pub fn run_iteration<U: Utterance>(
        &mut self,
        utterances: &[U],
    ) -> Result<IterationReport, TrainingError> {
        self.iterations_run += 1;
        let report = iterate(
            &mut self.models,
            utterances,
            &self.config,
            self.iterations_run,
            self.observer.as_ref(),
        )?;
        self.observer.iteration_finished(&report);
        Ok(report)
    }

    /// Runs up to `max_iterations` iterations, stopping once the mean per-frame
    /// log-likelihood improves by less than `convergence_tolerance`.
    pub fn train<U: Utterance>(
        &mut self,
        utterances: &[U],
    ) -> Result<Vec<IterationReport>, TrainingError> {
        let mut reports = Vec::with_capacity(self.config.max_iterations);
        let mut previous: Option<f64> = None;

        for _ in 0..self.config.max_iterations {
            let report = self.run_iteration(utterances)?;
            let current = report.mean_frame_log_likelihood();
            reports.push(report);

            let Some(current) = current else {
                tracing::warn!("train: no utterance could be scored, stopping");
                break;
            };
            if let Some(previous) = previous {
                let gain = current - previous;
                if gain < self.config.convergence_tolerance {
                    tracing::info!(
                        iterations = self.iterations_run,
                        gain,
                        mean_frame_log_likelihood = current,
                        "train: converged"
                    );
                    break;
                }
            }
            previous = Some(current);
        }
        Ok(reports)
    }
}

/// One Baum-Welch iteration over `models` without a [`Trainer`].
///
/// The returned report's [`likelihoods`](IterationReport::likelihoods) hold one natural
/// log-likelihood per utterance, in order, scored under the parameters that were current
/// when the call started.
pub fn run_iteration<U: Utterance>(
    models: &mut ModelDictionary,
    utterances: &[U],
    config: &TrainerConfig,
) -> Result<IterationReport, TrainingError> {
    iterate(models, utterances, config, 1, &SilentObserver)
}

fn iterate<U: Utterance>(
    models: &mut ModelDictionary,
    utterances: &[U],
    config: &TrainerConfig,
    iteration: usize,
    observer: &dyn TrainingObserver,
) -> Result<IterationReport, TrainingError> {
    config.validate()?;
    let resolved = utterances
        .iter()
        .map(|u| models.resolve(u.units()))
        .collect::<Result<Vec<_>, _>>()?;
    let dim = models.dim().unwrap_or(0);

    let mut accumulator = StatisticsAccumulator::new(models);
    let mut outcomes = Vec::with_capacity(utterances.len());
    for (utterance, units) in utterances.iter().zip(&resolved) {
        let outcome = match accumulate_utterance(models, utterance, units, dim, &mut accumulator) {
            Ok((frames, log_likelihood)) => UtteranceOutcome::Scored {
                id: utterance.id().to_string(),
                frames,
                log_likelihood,
            },
            Err(reason) => {
                tracing::warn!(
                    iteration,
                    utterance = utterance.id(),
                    error = %reason,
                    "iteration: skipping utterance"
                );
                UtteranceOutcome::Skipped {
                    id: utterance.id().to_string(),
                    reason,
                }
            }
        };
        observer.utterance_finished(iteration, &outcome);
        outcomes.push(outcome);
    }

    let reestimation = if accumulator.utterances() == 0 {
        tracing::warn!(iteration, "iteration: nothing accumulated, parameters unchanged");
        ReestimationReport::default()
    } else {
        reestimate(models, &accumulator, config)
    };

    let report = IterationReport {
        iteration,
        outcomes,
        reestimation,
    };
    tracing::info!(
        iteration,
        scored = report.scored_count(),
        skipped = report.skipped_count(),
        frames = accumulator.frames(),
        total_log_likelihood = report.total_log_likelihood(),
        mean_frame_log_likelihood = report.mean_frame_log_likelihood().unwrap_or(f64::NAN),
        "iteration: done"
    );
    Ok(report)
}

/// E-step for one utterance; returns its frame count and log-likelihood.
fn accumulate_utterance<U: Utterance>(
    models: &ModelDictionary,
    utterance: &U,
    units: &[UnitId],
    dim: usize,
    accumulator: &mut StatisticsAccumulator,
) -> Result<(usize, f64), TrainingError> {
    let features = utterance.features()?;
    if units.is_empty() || features.is_empty() {
        return Err(TrainingError::EmptyTranscript {
            id: utterance.id().to_string(),
            units: units.len(),
            frames: features.num_frames(),
        });
    }
    // Frames are rectangular, so frame 0 is the first one of the wrong width.
    if features.dim() != dim {
        return Err(TrainingError::DimensionMismatch {
            expected: dim,
            actual: features.dim(),
            frame: 0,
        });
    }

    let lattice = CompositeLattice::build(models, units);
    let observations = ObservationTable::build(models, &lattice, &features);
    let posteriors = forward_backward(&lattice, &observations);
    let log_likelihood = posteriors.log_likelihood();
    if !log_likelihood.is_finite() {
        return Err(TrainingError::NumericalOverflow {
            id: utterance.id().to_string(),
        });
    }

    let occupancy = OccupancyTable::compute(models, &lattice, &observations, &posteriors);
    accumulator.fold(&lattice, &observations, &posteriors, &occupancy, &features);

    tracing::debug!(
        utterance = utterance.id(),
        frames = features.num_frames(),
        states = lattice.num_states(),
        log_likelihood,
        "iteration: utterance accumulated"
    );
    Ok((features.num_frames(), log_likelihood))
}
