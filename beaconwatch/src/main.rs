use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use beaconwatch::config::Config;
use beaconwatch::{evaluator, generator, logging, pipeline, trainer};

#[derive(Parser)]
#[command(name = "beaconwatch", about = "C2 beaconing detection over web-proxy logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Optional TOML config file overlaying the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full detection pipeline and print ranked findings.
    Detect {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "models")]
        model: PathBuf,
    },
    /// Fit the scaler and isolation forest on clean logs.
    Train {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "models")]
        model: PathBuf,
    },
    /// Produce a synthetic labelled dataset.
    Generate {
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 25)]
        num_users: usize,
        #[arg(long, default_value_t = 14)]
        num_days: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Score the pipeline against ground truth.
    Evaluate {
        #[arg(long)]
        logs: PathBuf,
        #[arg(long)]
        ground_truth: PathBuf,
        #[arg(long, default_value = "models")]
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Detect { input, model } => {
            let (scaler, forest) = trainer::load_artifacts(&model)
                .with_context(|| format!("loading model artifacts from {}", model.display()))?;
            let result = pipeline::run_pipeline(&input, &scaler, &forest, &cfg)?;
            print_result(&result);
        }
        Command::Train { input, model } => {
            let trained = trainer::train(&input, &cfg)?;
            trainer::persist(&trained, &model)?;
            println!(
                "trained on {} vectors ({} excluded as known-bad), artifacts written to {}",
                trained.vectors_used,
                trained.vectors_excluded,
                model.display()
            );
        }
        Command::Generate { out_dir, num_users, num_days, seed } => {
            std::fs::create_dir_all(&out_dir)?;
            let gen_cfg = generator::GeneratorConfig {
                num_users,
                num_days,
                seed,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            };
            let rows = generator::generate(&gen_cfg);
            generator::export_logs(&rows, &out_dir.join("logs.csv"))?;
            generator::export_ground_truth(&rows, &out_dir.join("ground_truth.csv"))?;
            println!("wrote {} rows to {}", rows.len(), out_dir.display());
        }
        Command::Evaluate { logs, ground_truth, model } => {
            let (scaler, forest) = trainer::load_artifacts(&model)
                .with_context(|| format!("loading model artifacts from {}", model.display()))?;
            let report = evaluator::run_evaluation(&logs, &ground_truth, &scaler, &forest, &cfg)?;
            evaluator::print_report(&report);
        }
    }

    Ok(())
}

fn print_result(result: &pipeline::PipelineResult) {
    println!(
        "parsed {} logs in {:.1}ms — tier1: {}, tier2: {}, tier3: {} (total {:.1}ms)",
        result.total_logs,
        result.parse_time_ms,
        result.tier1_flagged,
        result.tier2_flagged,
        result.tier3_explained,
        result.total_time_ms
    );
    for finding in &result.findings {
        println!(
            "[{}] {} ({}) confidence={:.2} severity={}",
            finding.key, finding.username, finding.threat_summary, finding.confidence, finding.severity
        );
    }
}
