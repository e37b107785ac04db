//! cvboost CLI Module
//!
//! `prepare` splits a raw wine-review table into train/test CSVs;
//! `train` cross-validates the regressor, reports the final RMSE and
//! saves a model fitted on the full training table.
//!
//! Stdout carries exactly one line, `rmse: <value>`, which metric
//! scrapers match. It is written after the model is saved, so a failed
//! job prints nothing there. Progress output and logs go to stderr.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::export::{metadata_path, ModelArtifact, ModelMetadata};
use crate::preprocessing::{DatasetPreparer, PreparerConfig};
use crate::training::{
    rmse_log_line, FeatureSpec, Hyperparameters, TrainEngine, TrainingConfig,
};
use crate::utils::{split_names, DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    eprint!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    eprintln!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    eprintln!();
    eprintln!("  {}", title.white().bold());
    eprintln!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    eprintln!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cvboost")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wine-review dataset preparation and cross-validated gradient boosting")]
#[command(long_about = None)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive features, fill missing values and split into train/test CSVs
    Prepare(PrepareArgs),

    /// Cross-validate, report RMSE and save a model fitted on the full train set
    Train(TrainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    /// Raw table (CSV, JSON, or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the training split
    #[arg(long)]
    pub train_output: PathBuf,

    /// Where to write the test split
    #[arg(long)]
    pub test_output: PathBuf,

    /// Space-separated categorical columns
    #[arg(long, default_value = "")]
    pub categorical: String,

    /// Space-separated free-text columns (get a `len_<name>` feature)
    #[arg(long, default_value = "")]
    pub text: String,

    #[arg(long, default_value = "price")]
    pub price_column: String,

    /// Space-separated columns to discard first
    #[arg(long, default_value = "")]
    pub drop: String,

    /// Share of rows held out for testing
    #[arg(long, default_value = "0.3")]
    pub test_fraction: f64,

    #[arg(long, default_value = "42")]
    pub seed: u64,
}

impl PrepareArgs {
    pub fn preparer_config(&self) -> PreparerConfig {
        PreparerConfig::new()
            .with_categorical(split_names(&self.categorical))
            .with_text(split_names(&self.text))
            .with_drop(split_names(&self.drop))
            .with_price_column(self.price_column.clone())
            .with_test_fraction(self.test_fraction)
            .with_random_state(self.seed)
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Directory the model is saved to
    #[arg(long = "model_dir", alias = "model-dir", env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Directory holding the training table
    #[arg(long = "train", env = "SM_CHANNEL_TRAIN")]
    pub train: PathBuf,

    /// Directory holding the test table
    #[arg(long = "test", env = "SM_CHANNEL_TEST")]
    pub test: PathBuf,

    #[arg(long = "train_file", alias = "train-file")]
    pub train_file: String,

    #[arg(long = "test_file", alias = "test-file")]
    pub test_file: String,

    /// File name of the saved model inside the model directory
    #[arg(long = "model_name", alias = "model-name")]
    pub model_name: String,

    /// Space-separated feature columns
    #[arg(long)]
    pub features: String,

    /// Space-separated categorical subset of the features
    #[arg(long = "cat_features", alias = "cat-features", default_value = "")]
    pub cat_features: String,

    #[arg(long)]
    pub target: String,

    #[arg(long = "learning_rate", alias = "learning-rate", allow_negative_numbers = true)]
    pub learning_rate: f64,

    #[arg(long)]
    pub depth: usize,

    #[arg(long = "l2_leaf_reg", alias = "l2-leaf-reg", allow_negative_numbers = true)]
    pub l2_leaf_reg: f64,

    /// Cross-validation folds
    #[arg(long, default_value = "3")]
    pub folds: usize,

    #[arg(long, default_value = "1000")]
    pub iterations: usize,

    #[arg(long, default_value = "0")]
    pub seed: u64,

    #[arg(long = "border_count", alias = "border-count", default_value = "254")]
    pub border_count: usize,

    /// Stop the final fit after this many rounds without test improvement
    #[arg(long = "early_stopping_rounds", alias = "early-stopping-rounds")]
    pub early_stopping_rounds: Option<usize>,

    #[arg(long = "metric_period", alias = "metric-period", default_value = "100")]
    pub metric_period: usize,

    /// Worker threads (defaults to all cores)
    #[arg(long = "n_jobs", alias = "n-jobs")]
    pub n_jobs: Option<usize>,

    /// Write the per-iteration cross-validation curve to this CSV
    #[arg(long = "cv_output", alias = "cv-output")]
    pub cv_output: Option<PathBuf>,
}

impl TrainArgs {
    /// Validated training configuration
    pub fn training_config(&self) -> crate::error::Result<TrainingConfig> {
        let spec = FeatureSpec::parse(&self.features, &self.cat_features)?;
        let hp = Hyperparameters::new(self.learning_rate, self.depth, self.l2_leaf_reg);

        let config = TrainingConfig::new(self.target.clone(), spec, hp)
            .with_iterations(self.iterations)
            .with_fold_count(self.folds)
            .with_random_seed(self.seed)
            .with_border_count(self.border_count)
            .with_early_stopping_rounds(self.early_stopping_rounds)
            .with_metric_period(self.metric_period)
            .with_n_jobs_opt(self.n_jobs);

        config.validate()?;
        Ok(config)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_name)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_prepare(args: &PrepareArgs) -> anyhow::Result<()> {
    section("Prepare");

    let config = args.preparer_config();
    config.validate()?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_auto(&args.input)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run("Preparing");
    let start = Instant::now();
    let mut prepared = DatasetPreparer::new(config).prepare(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    prepared.write_csv(&args.train_output, &args.test_output)?;

    eprintln!();
    kv("Train rows", &prepared.train.height().to_string());
    kv("Test rows", &prepared.test.height().to_string());
    kv("Train file", &args.train_output.display().to_string());
    kv("Test file", &args.test_output.display().to_string());
    eprintln!();

    Ok(())
}

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = args.training_config()?;
    let loader = DataLoader::new();

    step_run("Loading data");
    let start = Instant::now();
    let train = loader.load_from_dir(&args.train, &args.train_file)?;
    let test = loader.load_from_dir(&args.test, &args.test_file)?;
    step_done(&format!(
        "{} train / {} test rows in {:?}",
        train.height(),
        test.height(),
        start.elapsed()
    ));

    let mut engine = TrainEngine::new(config);
    // schema problems in either table must surface before any training
    engine.pool(&train)?;
    engine.pool(&test)?;

    step_run(&format!("Cross-validating ({} folds)", args.folds));
    let start = Instant::now();
    let cv = engine.cross_validate(&train)?.clone();
    step_done(&format!("{:?}", start.elapsed()));

    let cv_rmse = cv
        .final_rmse()
        .context("cross-validation produced an empty curve")?;

    if let Some(path) = &args.cv_output {
        DataSaver::save_csv(&mut cv.to_dataframe()?, path)?;
        info!(path = %path.display(), "Wrote cross-validation curve");
    }

    step_run("Fitting final model");
    let start = Instant::now();
    engine.fit(&train, Some(&test))?;
    step_done(&format!("{:?}", start.elapsed()));

    let metrics = engine.evaluate(&test)?;
    info!(
        rmse = metrics.rmse,
        mae = metrics.mae,
        r2 = metrics.r2,
        rows = metrics.n_samples,
        "Hold-out evaluation"
    );

    let config = engine.config().clone();
    let model = engine
        .into_model()
        .context("final fit did not produce a model")?;
    let metadata = ModelMetadata::new(&config, &model).with_cv_rmse(Some(cv_rmse));
    let artifact = ModelArtifact::new(model, metadata);

    let path = artifact.save(&args.model_path())?;
    artifact.save_metadata_json(&metadata_path(&path))?;
    info!(path = %path.display(), trees = artifact.metadata.tree_count, "Saved model");

    eprintln!();
    kv("CV test RMSE", &format!("{:.4}", cv_rmse));
    kv("Hold-out RMSE", &format!("{:.4}", metrics.rmse));
    kv("Hold-out R²", &format!("{:.4}", metrics.r2));
    kv("Model", &path.display().to_string());
    eprintln!();

    // only a fully successful job reports its objective
    println!("{}", rmse_log_line(cv_rmse));
    Ok(())
}
