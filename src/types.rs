use serde::Serialize;

use crate::error::TrainingError;
use crate::logmath::LOG_ZERO;

/// Row-major feature frames of one utterance, stored contiguously.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    dim: usize,
    num_frames: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Builds a matrix from ragged rows; every row must match the first one's length.
    pub fn from_frames(frames: Vec<Vec<f64>>) -> Result<Self, TrainingError> {
        let dim = frames.first().map(Vec::len).unwrap_or(0);
        let num_frames = frames.len();
        let mut data = Vec::with_capacity(dim * num_frames);
        for (frame, row) in frames.into_iter().enumerate() {
            if row.len() != dim {
                return Err(TrainingError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                    frame,
                });
            }
            data.extend(row);
        }
        Ok(Self {
            dim,
            num_frames,
            data,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames == 0
    }

    pub fn frame(&self, t: usize) -> &[f64] {
        &self.data[t * self.dim..(t + 1) * self.dim]
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.num_frames).map(move |t| self.frame(t))
    }
}

/// An utterance held fully in memory: its unit names and feature frames.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub id: String,
    pub units: Vec<String>,
    pub features: FeatureMatrix,
}

/// What happened to one utterance during an iteration.
#[derive(Debug)]
pub enum UtteranceOutcome {
    Scored {
        id: String,
        frames: usize,
        log_likelihood: f64,
    },
    Skipped {
        id: String,
        reason: TrainingError,
    },
}

impl UtteranceOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Scored { id, .. } | Self::Skipped { id, .. } => id,
        }
    }

    /// Natural log-likelihood; skipped utterances report [`LOG_ZERO`].
    pub fn log_likelihood(&self) -> f64 {
        match self {
            Self::Scored { log_likelihood, .. } => *log_likelihood,
            Self::Skipped { .. } => LOG_ZERO,
        }
    }
}

/// Side effects of one M-step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReestimationReport {
    pub units_updated: usize,
    pub units_unseen: usize,
    pub states_kept: usize,
    /// Transition rows whose internal mass exceeded one and had their exit clamped.
    pub clamped_rows: usize,
    pub floored_variances: usize,
}

#[derive(Debug)]
pub struct IterationReport {
    pub iteration: usize,
    pub outcomes: Vec<UtteranceOutcome>,
    pub reestimation: ReestimationReport,
}

impl IterationReport {
    /// One log-likelihood per utterance, in input order.
    pub fn likelihoods(&self) -> Vec<f64> {
        self.outcomes.iter().map(UtteranceOutcome::log_likelihood).collect()
    }

    pub fn scored_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UtteranceOutcome::Scored { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.scored_count()
    }

    pub fn total_log_likelihood(&self) -> f64 {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                UtteranceOutcome::Scored { log_likelihood, .. } => Some(*log_likelihood),
                UtteranceOutcome::Skipped { .. } => None,
            })
            .sum()
    }

    /// Average log-likelihood per scored frame, or `None` when nothing was scored.
    pub fn mean_frame_log_likelihood(&self) -> Option<f64> {
        let frames: usize = self
            .outcomes
            .iter()
            .map(|o| match o {
                UtteranceOutcome::Scored { frames, .. } => *frames,
                UtteranceOutcome::Skipped { .. } => 0,
            })
            .sum();
        if frames == 0 {
            return None;
        }
        Some(self.total_log_likelihood() / frames as f64)
    }
}
