//! stackwise CLI module
//!
//! Benchmarks the default base models, the averaging ensemble and the
//! stacking regressor on a synthetic dataset.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;

use crate::config::{CvConfig, EnsembleConfig};
use crate::datasets::{make_friedman1, make_regression};
use crate::ensemble::{AveragingRegressor, StackingRegressor};
use crate::evaluation::cross_val_metrics;
use crate::metrics::RegressionMetrics;
use crate::training::{CVResults, Regressor};
use crate::utils::Timer;
use ndarray::{Array1, Array2};
use tracing::info;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "stackwise")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Averaging and stacking ensembles for regression")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Synthetic dataset family
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetKind {
    /// Gaussian features, linear target
    Linear,
    /// Friedman #1 nonlinear target
    Friedman,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cross-validate the base models and both ensembles
    Benchmark {
        /// Number of rows to generate
        #[arg(long, default_value = "300")]
        rows: usize,

        /// Number of feature columns
        #[arg(long, default_value = "8")]
        features: usize,

        /// Standard deviation of the target noise
        #[arg(long, default_value = "1.0")]
        noise: f64,

        /// Dataset seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Dataset family
        #[arg(long, value_enum, default_value = "friedman")]
        dataset: DatasetKind,

        /// Ensemble configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print or write the default configuration
    Config {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// One benchmark table row
#[derive(Debug, Clone)]
pub struct ModelScore {
    pub name: String,
    pub cv: CVResults,
    pub pooled: RegressionMetrics,
    pub secs: f64,
}

/// Score every model on the same splits of `cv`
pub fn score_models(
    models: &[&dyn Regressor],
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CvConfig,
) -> crate::Result<Vec<ModelScore>> {
    let validator = cv.validator();
    models
        .iter()
        .map(|model| {
            let timer = Timer::start();
            let (results, pooled) = cross_val_metrics(*model, x, y, &validator)?;
            info!(
                model = model.name(),
                n_splits = results.n_folds,
                shuffle = cv.shuffle,
                "mean RMSE = {:.4} +/- {:.4}",
                results.mean_score,
                results.std_score
            );
            Ok(ModelScore {
                name: model.name().to_string(),
                cv: results,
                pooled,
                secs: timer.elapsed_secs(),
            })
        })
        .collect()
}

fn print_row(score: &ModelScore) {
    println!(
        "  {:<28} {:>10.4} {:>10.4} {:>8.4} {:>8.4} {:>8}",
        score.name,
        score.cv.mean_score,
        score.cv.std_score,
        score.pooled.mae,
        score.pooled.r2,
        format!("{:.2}s", score.secs)
    );
}

pub fn cmd_benchmark(
    rows: usize,
    features: usize,
    noise: f64,
    seed: u64,
    dataset: DatasetKind,
    config_path: Option<&PathBuf>,
) -> anyhow::Result<()> {
    section("Benchmark");

    let config = match config_path {
        Some(path) => EnsembleConfig::from_json_file(path)?,
        None => EnsembleConfig::default(),
    };

    step_run("Generating data");
    let (x, y) = match dataset {
        DatasetKind::Linear => {
            let (x, y, _) = make_regression(rows, features, noise, seed)?;
            (x, y)
        }
        DatasetKind::Friedman => make_friedman1(rows, features, noise, seed)?,
    };
    step_done(&format!("{} rows × {} cols", x.nrows(), x.ncols()));

    let base_models = config.models.build();
    let mut averaging = AveragingRegressor::new(base_models.clone());
    if let Some(weights) = &config.averaging_weights {
        averaging = averaging.with_weights(weights.clone());
    }
    let stacking =
        StackingRegressor::new(base_models.clone(), config.models.build_meta_model()).with_config(config.stacking.clone());

    let mut models: Vec<&dyn Regressor> = base_models.iter().map(|m| m.as_ref()).collect();
    models.push(&averaging);
    models.push(&stacking);

    step_run(&format!("Scoring {} models on {} folds", models.len(), config.cv.n_splits));
    let timer = Timer::start();
    let scores = score_models(&models, &x, &y, &config.cv)?;
    step_done(&format!("{:.2}s", timer.elapsed_secs()));

    println!();
    println!(
        "  {:<28} {:>10} {:>10} {:>8} {:>8} {:>8}",
        muted("Model"),
        muted("RMSE"),
        muted("± std"),
        muted("MAE"),
        muted("R²"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(78)));

    for score in &scores {
        print_row(score);
    }

    println!("  {}", dim(&"─".repeat(78)));

    if let Some(best) = scores.iter().min_by(|a, b| {
        a.cv.mean_score
            .partial_cmp(&b.cv.mean_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    }) {
        println!();
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            best.name.white().bold(),
            muted("RMSE:"),
            best.cv.mean_score
        );
    }

    println!();
    Ok(())
}

pub fn cmd_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let config = EnsembleConfig::default();
    match output {
        Some(path) => {
            config.save(path)?;
            println!("  {} wrote {}", ok("✓"), path.display());
        }
        None => println!("{}", config.to_json_string()?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_benchmark_defaults() {
        let cli = Cli::try_parse_from(["stackwise", "benchmark"]).unwrap();
        match cli.command {
            Commands::Benchmark { rows, features, dataset, config, .. } => {
                assert_eq!(rows, 300);
                assert_eq!(features, 8);
                assert_eq!(dataset, DatasetKind::Friedman);
                assert!(config.is_none());
            }
            _ => panic!("expected benchmark"),
        }
    }

    #[test]
    fn test_parse_benchmark_overrides() {
        let cli = Cli::try_parse_from([
            "stackwise", "benchmark", "--rows", "50", "--dataset", "linear", "--config", "ens.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Benchmark { rows, dataset, config, .. } => {
                assert_eq!(rows, 50);
                assert_eq!(dataset, DatasetKind::Linear);
                assert_eq!(config, Some(PathBuf::from("ens.json")));
            }
            _ => panic!("expected benchmark"),
        }
    }

    #[test]
    fn test_score_models_uses_configured_splits() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| v * v);
        let model = crate::training::LinearRegression::new();
        let models: Vec<&dyn Regressor> = vec![&model];

        let ordered = CvConfig {
            n_splits: 3,
            shuffle: false,
            seed: None,
        };
        let shuffled = CvConfig {
            shuffle: true,
            seed: Some(3),
            ..ordered.clone()
        };

        let a = score_models(&models, &x, &y, &ordered).unwrap();
        let b = score_models(&models, &x, &y, &shuffled).unwrap();
        assert_eq!(a[0].cv.n_folds, 3);
        assert_eq!(b[0].cv.n_folds, 3);
        assert_ne!(a[0].cv.scores, b[0].cv.scores);

        let expected = crate::evaluation::cross_val_rmse(&model, &x, &y, &shuffled.validator()).unwrap();
        assert_eq!(b[0].cv.scores, expected.scores);
    }

    #[test]
    fn test_config_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        cmd_config(Some(&path)).unwrap();

        let loaded = EnsembleConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, EnsembleConfig::default());
    }
}
