pub mod dictionary;
pub mod emission;
pub mod transition;
pub mod unit;

pub use dictionary::{ModelDictionary, UnitId};
pub use emission::{Gaussian, Mixture, State, StateEmissions};
pub use transition::TransitionTable;
pub use unit::UnitModel;
