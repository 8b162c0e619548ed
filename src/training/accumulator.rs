//! Corpus-wide sufficient statistics for one training iteration.
//!
//! Statistics live outside the model so the parameters being scored never alias the
//! sums being collected. Log-domain sums are combined with log-sum-exp, Gaussian
//! moments with plain addition; both are associative, so partial accumulators from
//! independent workers can be merged in any order.

use crate::logmath::{log_add, log_sum_exp, LOG_ZERO};
use crate::model::{ModelDictionary, TransitionTable, UnitId};
use crate::training::forward_backward::{ObservationTable, OccupancyTable, Posteriors};
use crate::training::lattice::CompositeLattice;
use crate::types::FeatureMatrix;

/// Statistics of one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitStatistics {
    dim: usize,
    /// Row 0: entry counts; rows `1..=n`: internal transition counts (log domain).
    transitions: TransitionTable,
    /// Σ_t γ_t(state), log domain.
    state_occupancy: Vec<f64>,
    /// Index of each state's first mixture in the flat mixture arrays.
    mixture_offsets: Vec<usize>,
    /// Σ_t γ_t(state, m), log domain.
    mixture_occupancy: Vec<f64>,
    /// Σ_t γ_t(state, m) · x_t, per dimension (linear).
    mean_sums: Vec<f64>,
    /// Σ_t γ_t(state, m) · x_t², per dimension (linear).
    square_sums: Vec<f64>,
}

impl UnitStatistics {
    fn new(num_states: usize, mixtures_per_state: &[usize], dim: usize) -> Self {
        let mut mixture_offsets = Vec::with_capacity(num_states + 1);
        mixture_offsets.push(0);
        for &count in mixtures_per_state {
            let last = mixture_offsets[mixture_offsets.len() - 1];
            mixture_offsets.push(last + count);
        }
        let mixtures = mixture_offsets[num_states];
        Self {
            dim,
            transitions: TransitionTable::new(num_states),
            state_occupancy: vec![LOG_ZERO; num_states],
            mixture_offsets,
            mixture_occupancy: vec![LOG_ZERO; mixtures],
            mean_sums: vec![0.0; mixtures * dim],
            square_sums: vec![0.0; mixtures * dim],
        }
    }

    fn reset(&mut self) {
        self.transitions = TransitionTable::new(self.transitions.num_states());
        self.state_occupancy.fill(LOG_ZERO);
        self.mixture_occupancy.fill(LOG_ZERO);
        self.mean_sums.fill(0.0);
        self.square_sums.fill(0.0);
    }

    fn merge(&mut self, other: &Self) {
        let size = self.transitions.size();
        for from in 0..size {
            for to in 0..size {
                let merged =
                    log_add(self.transitions.get(from, to), other.transitions.get(from, to));
                self.transitions.set(from, to, merged);
            }
        }
        for (a, &b) in self.state_occupancy.iter_mut().zip(&other.state_occupancy) {
            *a = log_add(*a, b);
        }
        for (a, &b) in self.mixture_occupancy.iter_mut().zip(&other.mixture_occupancy) {
            *a = log_add(*a, b);
        }
        for (a, &b) in self.mean_sums.iter_mut().zip(&other.mean_sums) {
            *a += b;
        }
        for (a, &b) in self.square_sums.iter_mut().zip(&other.square_sums) {
            *a += b;
        }
    }

    pub fn num_states(&self) -> usize {
        self.state_occupancy.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Accumulated transition counts; entry row 0, exit column unused.
    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Log of the number of times the unit was entered.
    pub fn entry_log_mass(&self) -> f64 {
        log_sum_exp(&self.transitions.row(0)[1..=self.num_states()])
    }

    /// Log of the total occupancy of state `s` (0-based).
    pub fn state_occupancy(&self, s: usize) -> f64 {
        self.state_occupancy[s]
    }

    pub fn num_mixtures(&self, s: usize) -> usize {
        self.mixture_offsets[s + 1] - self.mixture_offsets[s]
    }

    pub fn mixture_occupancy(&self, s: usize, m: usize) -> f64 {
        self.mixture_occupancy[self.mixture_offsets[s] + m]
    }

    /// Occupancy-weighted first moments of mixture `m` of state `s`.
    pub fn mean_sums(&self, s: usize, m: usize) -> &[f64] {
        let k = self.mixture_offsets[s] + m;
        &self.mean_sums[k * self.dim..(k + 1) * self.dim]
    }

    /// Occupancy-weighted second moments of mixture `m` of state `s`.
    pub fn square_sums(&self, s: usize, m: usize) -> &[f64] {
        let k = self.mixture_offsets[s] + m;
        &self.square_sums[k * self.dim..(k + 1) * self.dim]
    }

    /// Whether anything at all was observed for this unit.
    pub fn is_empty(&self) -> bool {
        self.entry_log_mass() == LOG_ZERO
            && self.state_occupancy.iter().all(|&occ| occ == LOG_ZERO)
    }

    fn add_moments(&mut self, s: usize, m: usize, weight: f64, frame: &[f64]) {
        let k = self.mixture_offsets[s] + m;
        let range = k * self.dim..(k + 1) * self.dim;
        for ((mean, square), &x) in self.mean_sums[range.clone()]
            .iter_mut()
            .zip(&mut self.square_sums[range])
            .zip(frame)
        {
            *mean += weight * x;
            *square += weight * x * x;
        }
    }
}

#[cfg(test)]
impl UnitStatistics {
    pub(crate) fn transitions_mut(&mut self) -> &mut TransitionTable {
        &mut self.transitions
    }
}

/// Running statistics for every unit of a [`ModelDictionary`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsAccumulator {
    units: Vec<UnitStatistics>,
    utterances: usize,
    frames: usize,
    log_likelihood: f64,
}

impl StatisticsAccumulator {
    /// Empty statistics shaped after `dictionary`.
    pub fn new(dictionary: &ModelDictionary) -> Self {
        let units = dictionary
            .iter()
            .map(|(_, unit)| {
                let mixtures: Vec<usize> = unit.states().iter().map(|s| s.num_mixtures()).collect();
                UnitStatistics::new(unit.num_states(), &mixtures, unit.dim())
            })
            .collect();
        Self {
            units,
            utterances: 0,
            frames: 0,
            log_likelihood: 0.0,
        }
    }

    /// Clears every sum; call once before the first utterance of an iteration.
    pub fn reset(&mut self) {
        for unit in &mut self.units {
            unit.reset();
        }
        self.utterances = 0;
        self.frames = 0;
        self.log_likelihood = 0.0;
    }

    pub fn unit(&self, id: UnitId) -> &UnitStatistics {
        &self.units[id.index()]
    }

    #[cfg(test)]
    pub(crate) fn unit_mut(&mut self, id: UnitId) -> &mut UnitStatistics {
        &mut self.units[id.index()]
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &UnitStatistics)> + '_ {
        self.units.iter().enumerate().map(|(i, u)| (UnitId(i), u))
    }

    /// Utterances folded in since the last reset.
    pub fn utterances(&self) -> usize {
        self.utterances
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Sum of the folded utterances' log-likelihoods.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Folds one utterance's posteriors into the corpus statistics.
    ///
    /// Transitions inside one unit occurrence count towards that unit's transition row;
    /// transitions that cross into another occurrence, and first-frame occupancy, count
    /// towards the entered unit's entry row.
    pub fn fold(
        &mut self,
        lattice: &CompositeLattice,
        observations: &ObservationTable,
        posteriors: &Posteriors,
        occupancy: &OccupancyTable,
        features: &FeatureMatrix,
    ) {
        let num_frames = posteriors.num_frames();
        let states = lattice.states();
        let mut scratch = Vec::with_capacity(num_frames);

        for (i, s) in states.iter().enumerate() {
            let unit = &mut self.units[s.unit.index()];
            let local = s.local - 1;

            let gamma = log_sum_exp(occupancy.state_row(i));
            unit.state_occupancy[local] = log_add(unit.state_occupancy[local], gamma);

            let first = occupancy.state(i, 0);
            let entry = log_add(unit.transitions.get(0, s.local), first);
            unit.transitions.set(0, s.local, entry);

            for m in 0..occupancy.num_mixtures(i) {
                let row = occupancy.mixture_row(i, m);
                let k = unit.mixture_offsets[local] + m;
                unit.mixture_occupancy[k] = log_add(unit.mixture_occupancy[k], log_sum_exp(row));
                for (t, &log_weight) in row.iter().enumerate() {
                    if log_weight == LOG_ZERO {
                        continue;
                    }
                    unit.add_moments(local, m, log_weight.exp(), features.frame(t));
                }
            }

            let (targets, log_probs) = lattice.successors(i);
            for (&j, &transition) in targets.iter().zip(log_probs) {
                scratch.clear();
                scratch.extend((0..num_frames.saturating_sub(1)).map(|t| {
                    posteriors.transition_occupancy(observations, t, i, j, transition)
                }));
                let xi = log_sum_exp(&scratch);
                if xi == LOG_ZERO {
                    continue;
                }
                let target = states[j];
                let target_unit = &mut self.units[target.unit.index()];
                let from = if target.occurrence == s.occurrence {
                    s.local
                } else {
                    0
                };
                let merged = log_add(target_unit.transitions.get(from, target.local), xi);
                target_unit.transitions.set(from, target.local, merged);
            }
        }

        self.utterances += 1;
        self.frames += num_frames;
        self.log_likelihood += posteriors.log_likelihood();
    }

    /// Adds another accumulator's statistics to this one.
    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.units.iter_mut().zip(&other.units) {
            mine.merge(theirs);
        }
        self.utterances += other.utterances;
        self.frames += other.frames;
        self.log_likelihood += other.log_likelihood;
    }
}
