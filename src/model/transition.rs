use crate::error::TrainingError;
use crate::logmath::{log_sum_exp, safe_log, LOG_ZERO};

/// Square log-probability matrix over `num_states` emitting states plus a
/// non-emitting entry (index 0) and exit (index `num_states + 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionTable {
    num_states: usize,
    data: Vec<f64>,
}

impl TransitionTable {
    /// A table in which every transition is impossible.
    pub fn new(num_states: usize) -> Self {
        let size = num_states + 2;
        Self {
            num_states,
            data: vec![LOG_ZERO; size * size],
        }
    }

    /// Builds a table from square rows of log-probabilities.
    pub fn from_log_rows(rows: &[Vec<f64>]) -> Result<Self, TrainingError> {
        let size = rows.len();
        if size < 2 {
            return Err(TrainingError::parse(
                "transition table",
                format!("need at least entry and exit rows, got {size}"),
            ));
        }
        let mut table = Self::new(size - 2);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(TrainingError::parse(
                    "transition table",
                    format!("row {i} has {} columns, expected {size}", row.len()),
                ));
            }
            table.row_mut(i).copy_from_slice(row);
        }
        Ok(table)
    }

    /// Builds a table from square rows of linear probabilities.
    pub fn from_linear_rows(rows: &[Vec<f64>]) -> Result<Self, TrainingError> {
        let logs: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| row.iter().map(|&p| safe_log(p)).collect())
            .collect();
        Self::from_log_rows(&logs)
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Rows (and columns) including entry and exit.
    pub fn size(&self) -> usize {
        self.num_states + 2
    }

    pub fn exit_index(&self) -> usize {
        self.num_states + 1
    }

    #[inline]
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.size() + to]
    }

    #[inline]
    pub fn set(&mut self, from: usize, to: usize, log_prob: f64) {
        let size = self.size();
        self.data[from * size + to] = log_prob;
    }

    pub fn row(&self, from: usize) -> &[f64] {
        let size = self.size();
        &self.data[from * size..(from + 1) * size]
    }

    pub(crate) fn row_mut(&mut self, from: usize) -> &mut [f64] {
        let size = self.size();
        &mut self.data[from * size..(from + 1) * size]
    }

    /// `ln Σ_j P(from → j)` over every state reachable from `from`.
    pub fn row_log_mass(&self, from: usize) -> f64 {
        log_sum_exp(&self.row(from)[1..])
    }

    /// Checks that the entry row and every emitting row sum to one within `tolerance`
    /// (in log space) and that nothing leads back into the entry state.
    pub fn is_stochastic(&self, tolerance: f64) -> bool {
        let incoming_entry = (0..self.size()).any(|i| self.get(i, 0) != LOG_ZERO);
        !incoming_entry
            && (0..=self.num_states).all(|i| self.row_log_mass(i).abs() <= tolerance)
    }
}
