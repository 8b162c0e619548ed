use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{
    forward_backward, reestimate, CompositeLattice, ObservationTable, OccupancyTable, Posteriors,
    StatisticsAccumulator,
};
use crate::config::TrainerConfig;
use crate::logmath::{log_sum_exp, LOG_ZERO};
use crate::model::{Mixture, ModelDictionary, State, TransitionTable, UnitModel};
use crate::types::FeatureMatrix;

/// Left-to-right unit: each state loops or moves on, the last one moves to the exit.
fn make_unit(
    rng: &mut StdRng,
    name: &str,
    num_states: usize,
    num_mixtures: usize,
    dim: usize,
) -> UnitModel {
    let size = num_states + 2;
    let mut rows = vec![vec![0.0; size]; size];
    rows[0][1] = 1.0;
    for i in 1..=num_states {
        let stay = rng.gen_range(0.1..0.9);
        rows[i][i] = stay;
        rows[i][i + 1] = 1.0 - stay;
    }
    let table = TransitionTable::from_linear_rows(&rows).unwrap();

    let states = (0..num_states)
        .map(|s| {
            let raw: Vec<f64> = (0..num_mixtures).map(|_| rng.gen_range(0.2..1.0)).collect();
            let total: f64 = raw.iter().sum();
            let mixtures = raw
                .iter()
                .map(|w| {
                    let means: Vec<f64> = (0..dim).map(|_| rng.gen_range(-2.0..2.0)).collect();
                    let variances: Vec<f64> = (0..dim).map(|_| rng.gen_range(0.5..2.0)).collect();
                    Mixture::from_moments(w / total, &means, &variances)
                })
                .collect();
            State::new(s + 2, mixtures)
        })
        .collect();
    UnitModel::new(name, states, table).unwrap()
}

fn make_dictionary(rng: &mut StdRng, dim: usize) -> ModelDictionary {
    ModelDictionary::from_units([
        make_unit(rng, "sil", 1, 2, dim),
        make_unit(rng, "ah", 3, 2, dim),
        make_unit(rng, "k", 2, 1, dim),
        make_unit(rng, "t", 3, 3, dim),
    ])
    .unwrap()
}

fn random_features(rng: &mut StdRng, frames: usize, dim: usize) -> FeatureMatrix {
    FeatureMatrix::from_frames(
        (0..frames)
            .map(|_| (0..dim).map(|_| rng.gen_range(-3.0..3.0)).collect())
            .collect(),
    )
    .unwrap()
}

fn scalar_features(values: &[f64]) -> FeatureMatrix {
    FeatureMatrix::from_frames(values.iter().map(|&v| vec![v]).collect()).unwrap()
}

fn score(
    dict: &ModelDictionary,
    names: &[&str],
    features: &FeatureMatrix,
) -> (CompositeLattice, ObservationTable, Posteriors) {
    let ids = dict.resolve(names).unwrap();
    let lattice = CompositeLattice::build(dict, &ids);
    let observations = ObservationTable::build(dict, &lattice, features);
    let posteriors = forward_backward(&lattice, &observations);
    (lattice, observations, posteriors)
}

fn fold_corpus(
    dict: &ModelDictionary,
    corpus: &[(Vec<&str>, FeatureMatrix)],
) -> StatisticsAccumulator {
    let mut acc = StatisticsAccumulator::new(dict);
    for (names, features) in corpus {
        let (lattice, observations, posteriors) = score(dict, names, features);
        let occupancy = OccupancyTable::compute(dict, &lattice, &observations, &posteriors);
        acc.fold(&lattice, &observations, &posteriors, &occupancy, features);
    }
    acc
}

fn random_corpus(
    rng: &mut StdRng,
    dict: &ModelDictionary,
    dim: usize,
) -> Vec<(Vec<&'static str>, FeatureMatrix)> {
    let transcripts: [&[&'static str]; 4] = [
        &["sil", "ah", "sil"],
        &["k", "ah", "t"],
        &["sil", "t", "ah", "k", "sil"],
        &["ah"],
    ];
    transcripts
        .iter()
        .map(|names| {
            let states: usize = names.iter().map(|n| dict.get(n).unwrap().num_states()).sum();
            let frames = states + rng.gen_range(0..6);
            (names.to_vec(), random_features(rng, frames, dim))
        })
        .collect()
}

#[test]
fn forward_backward_consistency_on_random_models() {
    for seed in 0..8 {
        let mut rng = StdRng::seed_from_u64(seed);
        let dim = rng.gen_range(1..4);
        let dict = make_dictionary(&mut rng, dim);
        for (names, features) in random_corpus(&mut rng, &dict, dim) {
            let (_, _, posteriors) = score(&dict, &names, &features);
            let total = posteriors.log_likelihood();
            assert!(total.is_finite(), "seed {seed}: {names:?} unreachable");
            for t in 0..features.num_frames() {
                let at_t = posteriors.frame_log_likelihood(t);
                assert!((at_t - total).abs() < 1e-6, "seed {seed}, frame {t}: {at_t} vs {total}");
            }
        }
    }
}

#[test]
fn occupancy_is_a_distribution_per_frame() {
    let mut rng = StdRng::seed_from_u64(11);
    let dict = make_dictionary(&mut rng, 2);
    let features = random_features(&mut rng, 12, 2);
    let names = ["sil", "ah", "t"];
    let (lattice, observations, posteriors) = score(&dict, &names, &features);
    let occupancy = OccupancyTable::compute(&dict, &lattice, &observations, &posteriors);

    for t in 0..features.num_frames() {
        let states: Vec<f64> = (0..lattice.num_states()).map(|i| occupancy.state(i, t)).collect();
        assert!(log_sum_exp(&states).abs() < 1e-9, "frame {t}");
        for i in 0..lattice.num_states() {
            let mixtures: Vec<f64> = (0..occupancy.num_mixtures(i))
                .map(|m| occupancy.mixture(i, m, t))
                .collect();
            let state = occupancy.state(i, t);
            if state == LOG_ZERO {
                continue;
            }
            assert!((log_sum_exp(&mixtures) - state).abs() < 1e-9);
        }
    }
}

#[test]
fn left_to_right_chain_pins_first_and_last_frames() {
    let mut rng = StdRng::seed_from_u64(5);
    let dict = make_dictionary(&mut rng, 1);
    let features = random_features(&mut rng, 9, 1);
    let (lattice, _, posteriors) = score(&dict, &["k", "ah"], &features);
    let last = lattice.num_states() - 1;
    assert!(posteriors.state_occupancy(0, 0).abs() < 1e-9);
    assert!(posteriors.state_occupancy(features.num_frames() - 1, last).abs() < 1e-9);
}

#[test]
fn too_few_frames_is_unreachable() {
    let mut rng = StdRng::seed_from_u64(9);
    let dict = make_dictionary(&mut rng, 1);
    // "t" alone needs three frames.
    let (_, _, posteriors) = score(&dict, &["t"], &scalar_features(&[0.0, 1.0]));
    assert_eq!(posteriors.log_likelihood(), LOG_ZERO);
}

#[test]
fn reestimated_rows_are_stochastic_and_variances_positive() {
    for seed in 20..26 {
        let mut rng = StdRng::seed_from_u64(seed);
        let dim = 2;
        let mut dict = make_dictionary(&mut rng, dim);
        let corpus = random_corpus(&mut rng, &dict, dim);
        let acc = fold_corpus(&dict, &corpus);
        reestimate(&mut dict, &acc, &TrainerConfig::default());

        for (_, unit) in dict.iter() {
            let table = unit.transitions();
            for row in 0..=unit.num_states() {
                let mass = table.row_log_mass(row);
                assert!(mass.abs() < 1e-6, "seed {seed}: `{}` row {row} mass {mass}", unit.name());
            }
            for state in unit.states() {
                let weights: Vec<f64> = state.mixtures().iter().map(Mixture::log_weight).collect();
                assert!(log_sum_exp(&weights).abs() < 1e-6);
                for mixture in state.mixtures() {
                    assert!(mixture.gaussians().iter().all(|g| g.variance > 0.0));
                }
            }
        }
    }
}

#[test]
fn merged_partials_match_one_pass() {
    let mut rng = StdRng::seed_from_u64(42);
    let dict = make_dictionary(&mut rng, 2);
    let corpus = random_corpus(&mut rng, &dict, 2);

    let whole = fold_corpus(&dict, &corpus);
    let (left, right) = corpus.split_at(2);
    let mut merged = fold_corpus(&dict, right);
    merged.merge(&fold_corpus(&dict, left));

    assert_eq!(merged.utterances(), whole.utterances());
    assert_eq!(merged.frames(), whole.frames());
    for ((_, a), (_, b)) in merged.units().zip(whole.units()) {
        for s in 0..a.num_states() {
            let (x, y) = (a.state_occupancy(s), b.state_occupancy(s));
            assert!(x == y || (x - y).abs() < 1e-9);
            for m in 0..a.num_mixtures(s) {
                for (p, q) in a.mean_sums(s, m).iter().zip(b.mean_sums(s, m)) {
                    assert!((p - q).abs() < 1e-9);
                }
            }
        }
    }
}
