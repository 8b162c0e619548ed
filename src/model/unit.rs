use crate::error::TrainingError;
use crate::logmath::LOG_ZERO;
use crate::model::emission::State;
use crate::model::transition::TransitionTable;

/// One trainable acoustic unit: emitting states plus their transition table.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitModel {
    name: String,
    states: Vec<State>,
    transitions: TransitionTable,
}

impl UnitModel {
    pub fn new(
        name: impl Into<String>,
        states: Vec<State>,
        transitions: TransitionTable,
    ) -> Result<Self, TrainingError> {
        let unit = Self {
            name: name.into(),
            states,
            transitions,
        };
        unit.validate()?;
        Ok(unit)
    }

    fn validate(&self) -> Result<(), TrainingError> {
        let fail = |message: String| Err(TrainingError::invalid_model(&self.name, message));
        if self.states.is_empty() {
            return fail("no emitting states".to_string());
        }
        if self.transitions.num_states() != self.states.len() {
            return fail(format!(
                "transition table covers {} states but the unit has {}",
                self.transitions.num_states(),
                self.states.len()
            ));
        }
        if self.transitions.get(0, self.transitions.exit_index()) != LOG_ZERO {
            return fail("entry-to-exit transitions are not supported".to_string());
        }
        let dim = self.dim();
        for state in &self.states {
            if state.num_mixtures() == 0 {
                return fail(format!("state {} has no mixture components", state.id));
            }
            for mixture in state.mixtures() {
                if mixture.dim() != dim || dim == 0 {
                    return fail(format!(
                        "state {} mixes feature dimensions {} and {}",
                        state.id,
                        dim,
                        mixture.dim()
                    ));
                }
                let bad_variance = mixture
                    .gaussians()
                    .iter()
                    .find(|g| g.variance <= 0.0 || g.variance.is_nan());
                if let Some(g) = bad_variance {
                    return fail(format!(
                        "state {} has non-positive variance {}",
                        state.id, g.variance
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub(crate) fn states_mut(&mut self) -> &mut [State] {
        &mut self.states
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    pub(crate) fn set_transitions(&mut self, transitions: TransitionTable) {
        self.transitions = transitions;
    }

    pub fn dim(&self) -> usize {
        self.states.first().and_then(State::dim).unwrap_or(0)
    }
}
