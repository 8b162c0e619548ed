//! Concatenation of unit HMMs into one left-to-right chain per utterance.

use crate::logmath::LOG_ZERO;
use crate::model::{ModelDictionary, TransitionTable, UnitId};

/// Where a composite state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeState {
    pub unit: UnitId,
    /// Position of the owning unit in the transcript.
    pub occurrence: usize,
    /// Row of the state in its unit's transition table (1-based).
    pub local: usize,
}

/// Sparse adjacency of finite transitions between emitting states (CSR layout).
#[derive(Debug, Clone, Default)]
struct Arcs {
    offsets: Vec<usize>,
    nodes: Vec<usize>,
    log_probs: Vec<f64>,
}

impl Arcs {
    fn build(num_states: usize, mut weight: impl FnMut(usize, usize) -> f64) -> Self {
        let mut arcs = Self {
            offsets: Vec::with_capacity(num_states + 1),
            ..Self::default()
        };
        arcs.offsets.push(0);
        for a in 0..num_states {
            for b in 0..num_states {
                let log_prob = weight(a, b);
                if log_prob != LOG_ZERO {
                    arcs.nodes.push(b);
                    arcs.log_probs.push(log_prob);
                }
            }
            arcs.offsets.push(arcs.nodes.len());
        }
        arcs
    }

    #[inline]
    fn of(&self, node: usize) -> (&[usize], &[f64]) {
        let range = self.offsets[node]..self.offsets[node + 1];
        (&self.nodes[range.clone()], &self.log_probs[range])
    }
}

/// The per-utterance state graph: all emitting states of the transcript's units in order,
/// one shared entry and one shared exit.
#[derive(Debug, Clone)]
pub struct CompositeLattice {
    states: Vec<LatticeState>,
    transitions: TransitionTable,
    predecessors: Arcs,
    successors: Arcs,
}

impl CompositeLattice {
    /// Chains the units in transcript order.
    ///
    /// Every state of one unit with a finite exit probability is joined to each entry
    /// state of the next unit with probability `exit · entry`. The last state of the
    /// final unit leaves the chain with certainty.
    pub fn build(dictionary: &ModelDictionary, units: &[UnitId]) -> Self {
        let num_states: usize = units.iter().map(|&id| dictionary.unit(id).num_states()).sum();
        let mut transitions = TransitionTable::new(num_states);
        let mut states = Vec::with_capacity(num_states);

        // Rows that leave the previous unit, with their exit log-probability.
        let mut pending: Vec<(usize, f64)> = vec![(0, 0.0)];
        let mut cursor = 0;
        for (occurrence, &unit_id) in units.iter().enumerate() {
            let unit = dictionary.unit(unit_id);
            let table = unit.transitions();
            let unit_states = unit.num_states();
            let unit_exit = table.exit_index();

            for j in 1..=unit_states {
                let entry = table.get(0, j);
                if entry == LOG_ZERO {
                    continue;
                }
                for &(row, exit) in &pending {
                    transitions.set(row, cursor + j, exit + entry);
                }
            }

            for i in 1..=unit_states {
                for j in 1..=unit_states {
                    transitions.set(cursor + i, cursor + j, table.get(i, j));
                }
                states.push(LatticeState {
                    unit: unit_id,
                    occurrence,
                    local: i,
                });
            }

            pending = (1..=unit_states)
                .map(|i| (cursor + i, table.get(i, unit_exit)))
                .filter(|&(_, exit)| exit != LOG_ZERO)
                .collect();
            cursor += unit_states;
        }

        let exit = transitions.exit_index();
        for (row, log_prob) in pending {
            transitions.set(row, exit, log_prob);
        }
        if num_states > 0 {
            transitions.set(num_states, exit, 0.0);
        }

        let predecessors = Arcs::build(num_states, |j, i| transitions.get(i + 1, j + 1));
        let successors = Arcs::build(num_states, |i, j| transitions.get(i + 1, j + 1));

        tracing::debug!(
            units = units.len(),
            states = num_states,
            arcs = successors.nodes.len(),
            "lattice: composed"
        );

        Self {
            states,
            transitions,
            predecessors,
            successors,
        }
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[LatticeState] {
        &self.states
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Entry log-probability of emitting state `j` (0-based).
    #[inline]
    pub fn entry(&self, j: usize) -> f64 {
        self.transitions.get(0, j + 1)
    }

    /// Exit log-probability of emitting state `i` (0-based).
    #[inline]
    pub fn exit(&self, i: usize) -> f64 {
        self.transitions.get(i + 1, self.transitions.exit_index())
    }

    /// States with a finite transition into `j`, and those transitions' log-probabilities.
    #[inline]
    pub fn predecessors(&self, j: usize) -> (&[usize], &[f64]) {
        self.predecessors.of(j)
    }

    /// States reachable from `i` in one step, and those transitions' log-probabilities.
    #[inline]
    pub fn successors(&self, i: usize) -> (&[usize], &[f64]) {
        self.successors.of(i)
    }
}
