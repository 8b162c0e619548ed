use std::env;
use std::path::PathBuf;

use hmm_train_rs::io::{read_models, write_models};
use hmm_train_rs::logmath::log_sum_exp;
use hmm_train_rs::{
    forward_backward, run_iteration, CompositeLattice, FeatureMatrix, Mixture, ModelDictionary,
    ObservationTable, State, TrainerConfig, Transcript, TransitionTable, UnitModel,
};
use libtest_mimic::{Arguments, Failed, Trial};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_SEED_COUNT: u64 = 12;
const CONSISTENCY_TOLERANCE: f64 = 1e-6;
/// Name, emitting states and mixtures per state of every generated unit.
const UNITS: [(&str, usize, usize); 5] = [
    ("sil", 1, 2),
    ("aa", 3, 2),
    ("k", 2, 1),
    ("t", 3, 3),
    ("iy", 2, 2),
];

fn main() {
    let args = Arguments::from_args();
    let seed_count = env_u64("HMM_TRAIN_IT_SEEDS", DEFAULT_SEED_COUNT);

    let mut tests = vec![
        Trial::test("io::trained_models_survive_a_round_trip", trained_models_round_trip),
    ];
    for seed in 0..seed_count {
        tests.push(Trial::test(format!("consistency::seed::{seed}"), move || {
            forward_backward_consistency(seed)
        }));
        tests.push(Trial::test(format!("reestimation::stochastic::seed::{seed}"), move || {
            reestimation_stays_stochastic(seed)
        }));
        tests.push(Trial::test(
            format!("reestimation::order_independent::seed::{seed}"),
            move || corpus_order_does_not_matter(seed),
        ));
    }

    libtest_mimic::run(&args, tests).exit();
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), Failed> {
    if condition {
        Ok(())
    } else {
        Err(message().into())
    }
}

fn random_unit(
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
        // loop, advance, and occasionally skip a state
        let stay = rng.gen_range(0.1..0.8);
        let skip = if i + 2 <= num_states {
            rng.gen_range(0.0..0.1)
        } else {
            0.0
        };
        rows[i][i] = stay;
        rows[i][i + 1] = 1.0 - stay - skip;
        if skip > 0.0 {
            rows[i][i + 2] = skip;
        }
    }
    let states = (0..num_states)
        .map(|s| {
            let mixtures = (0..num_mixtures)
                .map(|_| {
                    let means: Vec<f64> = (0..dim).map(|_| rng.gen_range(-2.0..2.0)).collect();
                    let variances: Vec<f64> = (0..dim).map(|_| rng.gen_range(0.4..2.5)).collect();
                    Mixture::from_moments(1.0 / num_mixtures as f64, &means, &variances)
                })
                .collect();
            State::new(s + 2, mixtures)
        })
        .collect();
    UnitModel::new(name, states, TransitionTable::from_linear_rows(&rows).unwrap()).unwrap()
}

fn random_models(rng: &mut StdRng, dim: usize) -> ModelDictionary {
    ModelDictionary::from_units(
        UNITS
            .iter()
            .map(|&(name, states, mixtures)| random_unit(rng, name, states, mixtures, dim))
            .collect::<Vec<_>>(),
    )
    .unwrap()
}

fn random_corpus(rng: &mut StdRng, models: &ModelDictionary, count: usize) -> Vec<Transcript> {
    let dim = models.dim().unwrap();
    (0..count)
        .map(|n| {
            let length = rng.gen_range(1..5);
            let units: Vec<String> = (0..length)
                .map(|_| UNITS[rng.gen_range(0..UNITS.len())].0.to_string())
                .collect();
            let states: usize = units.iter().map(|u| models.get(u).unwrap().num_states()).sum();
            let frames = states + rng.gen_range(0..8);
            let features = (0..frames)
                .map(|_| (0..dim).map(|_| rng.gen_range(-3.0..3.0)).collect())
                .collect();
            Transcript {
                id: format!("utt{n:03}"),
                units,
                features: FeatureMatrix::from_frames(features).unwrap(),
            }
        })
        .collect()
}

fn forward_backward_consistency(seed: u64) -> Result<(), Failed> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dim = rng.gen_range(1..5);
    let models = random_models(&mut rng, dim);
    for transcript in random_corpus(&mut rng, &models, 6) {
        let lattice = CompositeLattice::build(&models, &models.resolve(&transcript.units)?);
        let observations = ObservationTable::build(&models, &lattice, &transcript.features);
        let posteriors = forward_backward(&lattice, &observations);
        let total = posteriors.log_likelihood();
        ensure(total.is_finite(), || format!("{}: unreachable", transcript.id))?;
        for t in 0..transcript.features.num_frames() {
            let at_t = posteriors.frame_log_likelihood(t);
            ensure((at_t - total).abs() < CONSISTENCY_TOLERANCE, || {
                format!("{} frame {t}: {at_t} vs {total}", transcript.id)
            })?;
        }
    }
    Ok(())
}

fn reestimation_stays_stochastic(seed: u64) -> Result<(), Failed> {
    let mut rng = StdRng::seed_from_u64(1_000 + seed);
    let dim = rng.gen_range(1..4);
    let mut models = random_models(&mut rng, dim);
    let corpus = random_corpus(&mut rng, &models, 10);
    let config = TrainerConfig::default();

    for _ in 0..3 {
        let report = run_iteration(&mut models, &corpus, &config)?;
        ensure(report.skipped_count() == 0, || format!("{} skipped", report.skipped_count()))?;
        for (_, unit) in models.iter() {
            for row in 0..=unit.num_states() {
                let mass = unit.transitions().row_log_mass(row);
                ensure(mass.abs() < 1e-6, || format!("`{}` row {row}: mass {mass}", unit.name()))?;
            }
            for state in unit.states() {
                for mixture in state.mixtures() {
                    ensure(mixture.gaussians().iter().all(|g| g.variance > 0.0), || {
                        format!("`{}` state {}: non-positive variance", unit.name(), state.id)
                    })?;
                }
                let weights: Vec<f64> = state.mixtures().iter().map(Mixture::log_weight).collect();
                let mass = log_sum_exp(&weights);
                ensure(mass.abs() < 1e-6, || format!("`{}` weights mass {mass}", unit.name()))?;
            }
        }
    }
    Ok(())
}

fn corpus_order_does_not_matter(seed: u64) -> Result<(), Failed> {
    let mut rng = StdRng::seed_from_u64(2_000 + seed);
    let models = random_models(&mut rng, 2);
    let corpus = random_corpus(&mut rng, &models, 8);
    let mut shuffled = corpus.clone();
    shuffled.shuffle(&mut rng);

    let config = TrainerConfig::default();
    let (mut first, mut second) = (models.clone(), models);
    run_iteration(&mut first, &corpus, &config)?;
    run_iteration(&mut second, &shuffled, &config)?;

    for ((_, a), (_, b)) in first.iter().zip(second.iter()) {
        for (s, t) in a.states().iter().zip(b.states()) {
            for (m, n) in s.mixtures().iter().zip(t.mixtures()) {
                for (g, h) in m.gaussians().iter().zip(n.gaussians()) {
                    ensure(
                        (g.mean - h.mean).abs() < 1e-9 && (g.variance - h.variance).abs() < 1e-9,
                        || format!("`{}` state {}: {g:?} vs {h:?}", a.name(), s.id),
                    )?;
                }
            }
        }
        let size = a.transitions().size();
        for from in 0..size {
            for to in 0..size {
                let (x, y) = (a.transitions().get(from, to), b.transitions().get(from, to));
                ensure(x == y || (x - y).abs() < 1e-9, || {
                    format!("`{}` [{from}][{to}]: {x} vs {y}", a.name())
                })?;
            }
        }
    }
    Ok(())
}

fn trained_models_round_trip() -> Result<(), Failed> {
    let mut rng = StdRng::seed_from_u64(99);
    let mut models = random_models(&mut rng, 3);
    let corpus = random_corpus(&mut rng, &models, 6);
    run_iteration(&mut models, &corpus, &TrainerConfig::default())?;

    let path: PathBuf = env::temp_dir().join("hmm_train_rs_round_trip_hmmdefs.txt");
    write_models(&models, &path)?;
    let reread = read_models(&path)?;
    let _ = std::fs::remove_file(&path);

    ensure(reread.len() == models.len(), || format!("{} units read back", reread.len()))?;
    for (_, unit) in models.iter() {
        let other = reread
            .get(unit.name())
            .ok_or_else(|| format!("`{}` missing after round trip", unit.name()))?;
        for (s, t) in unit.states().iter().zip(other.states()) {
            for (m, n) in s.mixtures().iter().zip(t.mixtures()) {
                ensure(m.gaussians() == n.gaussians(), || {
                    format!("`{}` gaussians differ", unit.name())
                })?;
                ensure((m.log_weight() - n.log_weight()).abs() < 1e-9, || {
                    format!("`{}` weight differs", unit.name())
                })?;
            }
        }
    }
    Ok(())
}
