use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use hmm_train_rs::io::{load_utterances, write_models};
use hmm_train_rs::{
    IterationReport, TrainerBuilder, TrainerConfig, TrainingObserver, UtteranceOutcome,
};

#[path = "hmm_train/json_report_formatter.rs"]
mod json_report_formatter;

use json_report_formatter::{IterationSummary, Meta, Report, SkippedUtterance};

#[derive(Debug, Parser)]
#[command(name = "hmm-train")]
#[command(about = "Re-estimate HMM unit models with Baum-Welch training")]
struct Args {
    /// Model definitions to start from.
    #[arg(long, env = "HMM_PATH", default_value = "./data/hmm.txt")]
    hmm_path: PathBuf,
    /// Master label file listing each utterance's units.
    #[arg(long, env = "MONOPHONE_PATH", default_value = "./data/trn_mono.txt")]
    monophone_path: PathBuf,
    /// Directory the label file's paths are resolved against.
    #[arg(long, env = "TRAIN_DATA_PATH", default_value = "./data")]
    train_data_path: PathBuf,
    /// JSON trainer config; defaults apply to any missing field.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `max_iterations` from the config.
    #[arg(long)]
    iterations: Option<usize>,
    /// Where to write the re-estimated models.
    #[arg(long, default_value = "hmm.out.txt")]
    out: PathBuf,
    /// Optional JSON report of every iteration.
    #[arg(long)]
    report: Option<PathBuf>,
}

struct ProgressObserver {
    progress: ProgressBar,
}

impl TrainingObserver for ProgressObserver {
    fn utterance_finished(&self, iteration: usize, outcome: &UtteranceOutcome) {
        self.progress
            .set_message(format!("iteration {iteration}: {}", outcome.id()));
        self.progress.inc(1);
    }

    fn iteration_finished(&self, report: &IterationReport) {
        self.progress.println(format!(
            "iteration {}: {} scored, {} skipped, mean frame log-likelihood {}",
            report.iteration,
            report.scored_count(),
            report.skipped_count(),
            report
                .mean_frame_log_likelihood()
                .map_or_else(|| "n/a".to_string(), |l| format!("{l:.4}")),
        ));
    }
}

fn main() {
    if let Err(err) = run() {
        tracing::error!(error = %err, "hmm-train failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrainerConfig::load(path).map_err(|e| e.to_string())?,
        None => TrainerConfig::default(),
    };
    if let Some(iterations) = args.iterations {
        config.max_iterations = iterations;
    }

    let utterances = load_utterances(&args.monophone_path, &args.train_data_path)
        .map_err(|e| e.to_string())?;
    if utterances.is_empty() {
        return Err(format!(
            "no utterances listed in {}",
            args.monophone_path.display()
        ));
    }

    let progress = ProgressBar::new((utterances.len() * config.max_iterations) as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let mut trainer = TrainerBuilder::new()
        .with_model_path(&args.hmm_path)
        .with_config(config)
        .with_observer(Box::new(ProgressObserver {
            progress: progress.clone(),
        }))
        .build()
        .map_err(|e| e.to_string())?;

    let started = Utc::now();
    let reports = trainer.train(&utterances).map_err(|e| e.to_string())?;
    // Early convergence leaves iterations unrun; shrink the bar to the work done.
    progress.set_length(progress.position());
    progress.finish_with_message(format!("done after {} iterations", reports.len()));

    write_models(trainer.models(), &args.out).map_err(|e| e.to_string())?;
    tracing::info!(
        out = %args.out.display(),
        iterations = reports.len(),
        "hmm-train: models written"
    );

    if let Some(path) = &args.report {
        let report = Report {
            schema_version: 1,
            meta: Meta {
                generated_at: Utc::now().to_rfc3339(),
                started_at: started.to_rfc3339(),
                model_path: args.hmm_path.to_string_lossy().into_owned(),
                label_path: args.monophone_path.to_string_lossy().into_owned(),
                utterance_count: utterances.len(),
                config: trainer.config().clone(),
            },
            iterations: reports.iter().map(summarize).collect(),
        };
        json_report_formatter::write_report(path, &report)?;
        tracing::info!(report = %path.display(), "hmm-train: report written");
    }
    Ok(())
}

fn summarize(report: &IterationReport) -> IterationSummary {
    IterationSummary {
        iteration: report.iteration,
        scored: report.scored_count(),
        skipped: report
            .outcomes
            .iter()
            .filter_map(|o| match o {
                UtteranceOutcome::Skipped { id, reason } => Some(SkippedUtterance {
                    id: id.clone(),
                    reason: reason.to_string(),
                }),
                UtteranceOutcome::Scored { .. } => None,
            })
            .collect(),
        total_log_likelihood: report.total_log_likelihood(),
        mean_frame_log_likelihood: report.mean_frame_log_likelihood(),
        reestimation: report.reestimation,
    }
}
