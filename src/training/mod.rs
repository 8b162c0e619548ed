pub mod accumulator;
pub mod forward_backward;
pub mod lattice;
pub mod reestimate;
#[cfg(test)]
mod tests;

pub use accumulator::{StatisticsAccumulator, UnitStatistics};
pub use forward_backward::{forward_backward, ObservationTable, OccupancyTable, Posteriors};
pub use lattice::{CompositeLattice, LatticeState};
pub use reestimate::reestimate;
