//! Log-domain forward-backward over a [`CompositeLattice`].
//!
//! Tables are flat `frame * num_states + state` buffers. Only finite transitions are
//! visited, so the cost is `O(T · arcs)` rather than `O(T · N²)` for sparse topologies.

use std::collections::HashMap;

use crate::logmath::{log_sum_exp, LOG_ZERO};
use crate::model::{ModelDictionary, StateEmissions, UnitId};
use crate::training::lattice::CompositeLattice;
use crate::types::FeatureMatrix;

/// Emission scores of every lattice state for one utterance.
///
/// A unit state that occurs several times in the transcript is scored once.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    num_frames: usize,
    scores: Vec<StateEmissions>,
    state_scores: Vec<usize>,
}

impl ObservationTable {
    pub fn build(
        dictionary: &ModelDictionary,
        lattice: &CompositeLattice,
        features: &FeatureMatrix,
    ) -> Self {
        let mut seen: HashMap<(UnitId, usize), usize> = HashMap::new();
        let mut scores = Vec::new();
        let state_scores = lattice
            .states()
            .iter()
            .map(|s| {
                *seen.entry((s.unit, s.local)).or_insert_with(|| {
                    let state = &dictionary.unit(s.unit).states()[s.local - 1];
                    scores.push(state.emissions(features));
                    scores.len() - 1
                })
            })
            .collect();
        Self {
            num_frames: features.num_frames(),
            scores,
            state_scores,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Scores of lattice state `i`.
    #[inline]
    pub fn state(&self, i: usize) -> &StateEmissions {
        &self.scores[self.state_scores[i]]
    }

    /// `ln p(x_t | state i)`.
    #[inline]
    pub fn observation(&self, i: usize, t: usize) -> f64 {
        self.state(i).observation(t)
    }
}

/// Forward and backward tables plus the total utterance likelihood.
#[derive(Debug, Clone)]
pub struct Posteriors {
    num_frames: usize,
    num_states: usize,
    forward: Vec<f64>,
    backward: Vec<f64>,
    log_likelihood: f64,
}

impl Posteriors {
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    #[inline]
    pub fn forward(&self, t: usize, i: usize) -> f64 {
        self.forward[t * self.num_states + i]
    }

    #[inline]
    pub fn backward(&self, t: usize, i: usize) -> f64 {
        self.backward[t * self.num_states + i]
    }

    /// `ln P(X | model)`; [`LOG_ZERO`] when no path explains the utterance.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// `ln Σ_i α_t(i) β_t(i)`, which equals the likelihood at every frame.
    pub fn frame_log_likelihood(&self, t: usize) -> f64 {
        let values: Vec<f64> = (0..self.num_states)
            .map(|i| self.forward(t, i) + self.backward(t, i))
            .collect();
        log_sum_exp(&values)
    }

    /// γ_t(i): posterior log-probability of occupying state `i` at frame `t`.
    #[inline]
    pub fn state_occupancy(&self, t: usize, i: usize) -> f64 {
        self.forward(t, i) + self.backward(t, i) - self.log_likelihood
    }

    /// ξ_t(i, j) for a transition of log-probability `transition` from `i` at `t` to `j`
    /// at `t + 1`.
    #[inline]
    pub fn transition_occupancy(
        &self,
        observations: &ObservationTable,
        t: usize,
        i: usize,
        j: usize,
        transition: f64,
    ) -> f64 {
        self.forward(t, i) + transition + observations.observation(j, t + 1)
            + self.backward(t + 1, j)
            - self.log_likelihood
    }
}

/// Runs the forward and backward recursions for one utterance.
pub fn forward_backward(lattice: &CompositeLattice, observations: &ObservationTable) -> Posteriors {
    let num_frames = observations.num_frames();
    let num_states = lattice.num_states();
    let mut forward = vec![LOG_ZERO; num_frames * num_states];
    let mut backward = vec![LOG_ZERO; num_frames * num_states];
    if num_frames == 0 || num_states == 0 {
        return Posteriors {
            num_frames,
            num_states,
            forward,
            backward,
            log_likelihood: LOG_ZERO,
        };
    }

    let mut scratch = Vec::with_capacity(num_states);

    for j in 0..num_states {
        forward[j] = lattice.entry(j) + observations.observation(j, 0);
    }
    for t in 1..num_frames {
        let (done, rest) = forward.split_at_mut(t * num_states);
        let prev = &done[(t - 1) * num_states..];
        let curr = &mut rest[..num_states];
        for (j, slot) in curr.iter_mut().enumerate() {
            let (from, log_probs) = lattice.predecessors(j);
            scratch.clear();
            scratch.extend(from.iter().zip(log_probs).map(|(&i, &p)| prev[i] + p));
            *slot = log_sum_exp(&scratch) + observations.observation(j, t);
        }
    }

    let last = (num_frames - 1) * num_states;
    for i in 0..num_states {
        backward[last + i] = lattice.exit(i);
    }
    for t in (0..num_frames - 1).rev() {
        let (head, done) = backward.split_at_mut((t + 1) * num_states);
        let next = &done[..num_states];
        let curr = &mut head[t * num_states..];
        for (i, slot) in curr.iter_mut().enumerate() {
            let (to, log_probs) = lattice.successors(i);
            scratch.clear();
            scratch.extend(
                to.iter()
                    .zip(log_probs)
                    .map(|(&j, &p)| p + observations.observation(j, t + 1) + next[j]),
            );
            *slot = log_sum_exp(&scratch);
        }
    }

    scratch.clear();
    scratch.extend((0..num_states).map(|i| forward[last + i] + lattice.exit(i)));
    let log_likelihood = log_sum_exp(&scratch);

    Posteriors {
        num_frames,
        num_states,
        forward,
        backward,
        log_likelihood,
    }
}

/// Per-frame state and mixture occupancy of one utterance.
///
/// For lattice state `i`, row 0 is the whole-state occupancy and row `m + 1` the
/// occupancy of mixture `m`; each row is `num_frames` long.
#[derive(Debug, Clone)]
pub struct OccupancyTable {
    num_frames: usize,
    mixtures: Vec<usize>,
    offsets: Vec<usize>,
    data: Vec<f64>,
}

impl OccupancyTable {
    pub fn compute(
        dictionary: &ModelDictionary,
        lattice: &CompositeLattice,
        observations: &ObservationTable,
        posteriors: &Posteriors,
    ) -> Self {
        let num_frames = posteriors.num_frames();
        let mixtures: Vec<usize> = lattice
            .states()
            .iter()
            .map(|s| dictionary.unit(s.unit).states()[s.local - 1].num_mixtures())
            .collect();
        let mut offsets = Vec::with_capacity(mixtures.len() + 1);
        offsets.push(0);
        for &count in &mixtures {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + (count + 1) * num_frames);
        }
        let mut data = vec![LOG_ZERO; offsets[offsets.len() - 1]];

        for (i, s) in lattice.states().iter().enumerate() {
            let state = &dictionary.unit(s.unit).states()[s.local - 1];
            let scores = observations.state(i);
            let block = &mut data[offsets[i]..offsets[i + 1]];
            for t in 0..num_frames {
                let gamma = posteriors.state_occupancy(t, i);
                block[t] = gamma;
                if gamma == LOG_ZERO {
                    continue;
                }
                let observation = scores.observation(t);
                for (m, mixture) in state.mixtures().iter().enumerate() {
                    block[(m + 1) * num_frames + t] =
                        gamma + mixture.log_weight() + scores.mixture(m, t) - observation;
                }
            }
        }

        Self {
            num_frames,
            mixtures,
            offsets,
            data,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_mixtures(&self, i: usize) -> usize {
        self.mixtures[i]
    }

    /// γ_t(i) for every frame.
    pub fn state_row(&self, i: usize) -> &[f64] {
        self.row(i, 0)
    }

    /// Occupancy of mixture `m` of state `i` for every frame.
    pub fn mixture_row(&self, i: usize, m: usize) -> &[f64] {
        self.row(i, m + 1)
    }

    #[inline]
    pub fn state(&self, i: usize, t: usize) -> f64 {
        self.state_row(i)[t]
    }

    #[inline]
    pub fn mixture(&self, i: usize, m: usize, t: usize) -> f64 {
        self.mixture_row(i, m)[t]
    }

    fn row(&self, i: usize, r: usize) -> &[f64] {
        let start = self.offsets[i] + r * self.num_frames;
        &self.data[start..start + self.num_frames]
    }
}
