//! Diagonal-covariance Gaussian-mixture emission densities.
//!
//! `variance` always holds σ², both in the normaliser and in the quadratic term.

use std::f64::consts::PI;

use crate::logmath::{log_sum_exp, safe_log, LOG_ZERO};
use crate::types::FeatureMatrix;

/// One feature dimension of a mixture component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    pub mean: f64,
    pub variance: f64,
}

impl Gaussian {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }

    pub fn log_density(&self, x: f64) -> f64 {
        let diff = x - self.mean;
        -0.5 * ((2.0 * PI).ln() + self.variance.ln() + diff * diff / self.variance)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mixture {
    log_weight: f64,
    gaussians: Vec<Gaussian>,
    /// `-0.5 * (D ln 2π + Σ ln σ²)`, refreshed whenever the Gaussians change.
    log_norm: f64,
}

impl Mixture {
    pub fn new(log_weight: f64, gaussians: Vec<Gaussian>) -> Self {
        let log_norm = log_normaliser(&gaussians);
        Self {
            log_weight,
            gaussians,
            log_norm,
        }
    }

    /// Builds a component from a linear weight and per-dimension moments.
    pub fn from_moments(weight: f64, means: &[f64], variances: &[f64]) -> Self {
        let gaussians = means
            .iter()
            .zip(variances)
            .map(|(&mean, &variance)| Gaussian::new(mean, variance))
            .collect();
        Self::new(safe_log(weight), gaussians)
    }

    pub fn log_weight(&self) -> f64 {
        self.log_weight
    }

    pub fn gaussians(&self) -> &[Gaussian] {
        &self.gaussians
    }

    pub fn dim(&self) -> usize {
        self.gaussians.len()
    }

    pub fn log_norm(&self) -> f64 {
        self.log_norm
    }

    /// Log density of one frame, excluding the mixture weight.
    pub fn log_density(&self, frame: &[f64]) -> f64 {
        let quad: f64 = self
            .gaussians
            .iter()
            .zip(frame)
            .map(|(g, &x)| {
                let diff = x - g.mean;
                diff * diff / g.variance
            })
            .sum();
        self.log_norm - 0.5 * quad
    }

    /// Fills `out[t]` with [`Self::log_density`] for every frame.
    pub fn log_densities(&self, features: &FeatureMatrix, out: &mut [f64]) {
        for (slot, frame) in out.iter_mut().zip(features.frames()) {
            *slot = self.log_density(frame);
        }
    }

    pub(crate) fn set_log_weight(&mut self, log_weight: f64) {
        self.log_weight = log_weight;
    }

    pub(crate) fn set_gaussians(&mut self, gaussians: Vec<Gaussian>) {
        self.log_norm = log_normaliser(&gaussians);
        self.gaussians = gaussians;
    }
}

fn log_normaliser(gaussians: &[Gaussian]) -> f64 {
    let log_det: f64 = gaussians.iter().map(|g| g.variance.ln()).sum();
    -0.5 * (gaussians.len() as f64 * (2.0 * PI).ln() + log_det)
}

/// An emitting HMM state: a weighted sum of [`Mixture`] components.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: usize,
    mixtures: Vec<Mixture>,
}

impl State {
    pub fn new(id: usize, mixtures: Vec<Mixture>) -> Self {
        Self { id, mixtures }
    }

    pub fn mixtures(&self) -> &[Mixture] {
        &self.mixtures
    }

    pub(crate) fn mixtures_mut(&mut self) -> &mut [Mixture] {
        &mut self.mixtures
    }

    pub fn num_mixtures(&self) -> usize {
        self.mixtures.len()
    }

    /// Feature dimension, taken from the first component.
    pub fn dim(&self) -> Option<usize> {
        self.mixtures.first().map(Mixture::dim)
    }

    /// Scores every frame once so forward and backward passes can share the results.
    pub fn emissions(&self, features: &FeatureMatrix) -> StateEmissions {
        let num_frames = features.num_frames();
        let num_mixtures = self.mixtures.len();
        let mut mixture = vec![LOG_ZERO; num_mixtures * num_frames];
        for (m, mix) in self.mixtures.iter().enumerate() {
            mix.log_densities(features, &mut mixture[m * num_frames..(m + 1) * num_frames]);
        }

        let mut weighted = vec![LOG_ZERO; num_mixtures];
        let observation = (0..num_frames)
            .map(|t| {
                for (m, mix) in self.mixtures.iter().enumerate() {
                    weighted[m] = mix.log_weight + mixture[m * num_frames + t];
                }
                log_sum_exp(&weighted)
            })
            .collect();

        StateEmissions {
            num_frames,
            observation,
            mixture,
        }
    }
}

/// Per-utterance emission scores of one state.
#[derive(Debug, Clone)]
pub struct StateEmissions {
    num_frames: usize,
    observation: Vec<f64>,
    /// Mixture-major: `mixture[m * num_frames + t]`.
    mixture: Vec<f64>,
}

impl StateEmissions {
    /// `ln p(x_t | state)`.
    #[inline]
    pub fn observation(&self, t: usize) -> f64 {
        self.observation[t]
    }

    /// `ln N(x_t; component m)`, weight excluded.
    #[inline]
    pub fn mixture(&self, m: usize, t: usize) -> f64 {
        self.mixture[m * self.num_frames + t]
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }
}
