//! M-step: closed-form parameter updates from accumulated statistics.

use crate::config::TrainerConfig;
use crate::logmath::{log_complement, log_sum_exp, safe_log, LOG_ZERO};
use crate::model::{Gaussian, ModelDictionary};
use crate::training::accumulator::StatisticsAccumulator;
use crate::types::ReestimationReport;

/// Log-mass above which a transition row counts as exceeding probability one.
const MASS_TOLERANCE: f64 = 1e-9;

/// Replaces every observed unit's transitions, mixture weights, means and variances.
///
/// Exit probabilities are never estimated directly: each emitting row's exit is the
/// complement of its internal transitions, so rows stay stochastic. States or mixtures
/// whose occupancy is below `config.min_occupancy` keep their previous parameters.
pub fn reestimate(
    dictionary: &mut ModelDictionary,
    statistics: &StatisticsAccumulator,
    config: &TrainerConfig,
) -> ReestimationReport {
    let mut report = ReestimationReport::default();
    let min_occupancy = safe_log(config.min_occupancy);
    let variance_floor = config.variance_floor.max(f64::MIN_POSITIVE);

    for (id, stats) in statistics.units() {
        let unit = dictionary.unit_mut(id);
        if stats.is_empty() {
            tracing::debug!(unit = unit.name(), "reestimate: unit unseen, keeping parameters");
            report.units_unseen += 1;
            continue;
        }

        let name = unit.name().to_string();
        let num_states = unit.num_states();
        let mut transitions = unit.transitions().clone();
        let exit = transitions.exit_index();

        let entry_mass = stats.entry_log_mass();
        if entry_mass != LOG_ZERO {
            for s in 1..=num_states {
                transitions.set(0, s, stats.transitions().get(0, s) - entry_mass);
            }
        }

        for (s, state) in unit.states_mut().iter_mut().enumerate() {
            let occupancy = stats.state_occupancy(s);
            if occupancy == LOG_ZERO || occupancy < min_occupancy {
                report.states_kept += 1;
                continue;
            }

            let row = s + 1;
            for to in 1..=num_states {
                transitions.set(row, to, stats.transitions().get(row, to) - occupancy);
            }
            let internal_mass = log_sum_exp(&transitions.row(row)[1..=num_states]);
            if internal_mass > MASS_TOLERANCE {
                tracing::warn!(
                    unit = name.as_str(),
                    state = s,
                    log_mass = internal_mass,
                    "reestimate: transition mass exceeds one, clamping exit"
                );
                report.clamped_rows += 1;
                for to in 1..=num_states {
                    transitions.set(row, to, transitions.get(row, to) - internal_mass);
                }
                transitions.set(row, exit, LOG_ZERO);
            } else {
                let exit_prob = log_complement(&transitions.row(row)[1..=num_states]);
                transitions.set(row, exit, exit_prob);
            }

            for (m, mixture) in state.mixtures_mut().iter_mut().enumerate() {
                let mixture_occupancy = stats.mixture_occupancy(s, m);
                mixture.set_log_weight(mixture_occupancy - occupancy);
                if mixture_occupancy == LOG_ZERO || mixture_occupancy < min_occupancy {
                    continue;
                }

                let count = mixture_occupancy.exp();
                let gaussians = stats
                    .mean_sums(s, m)
                    .iter()
                    .zip(stats.square_sums(s, m))
                    .map(|(&sum, &square)| {
                        let mean = sum / count;
                        let mut variance = square / count - mean * mean;
                        if variance < variance_floor || variance.is_nan() {
                            variance = variance_floor;
                            report.floored_variances += 1;
                        }
                        Gaussian::new(mean, variance)
                    })
                    .collect();
                mixture.set_gaussians(gaussians);
            }
        }

        unit.set_transitions(transitions);
        report.units_updated += 1;
    }

    tracing::debug!(
        units_updated = report.units_updated,
        units_unseen = report.units_unseen,
        states_kept = report.states_kept,
        clamped_rows = report.clamped_rows,
        floored_variances = report.floored_variances,
        "reestimate: done"
    );
    report
}
