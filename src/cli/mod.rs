//! tabserve CLI Module
//!
//! Command-line interface for running the services and for one-shot local
//! training and prediction.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::params::{parse_columns_to_drop, parse_model_params};
use crate::server::{run_server, ServerConfig, ServiceKind};
use crate::storage::{FsArtifactStore, DEFAULT_MODEL_DIR};
use crate::training::{ModelConfiguration, TrainingPipeline, DEFAULT_MODEL_KIND};
use crate::utils::{save_csv, DataLoader};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
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
#[command(name = "tabserve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and serve tabular models over HTTP")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one of the HTTP services
    Serve {
        /// Service to run
        #[arg(value_enum)]
        service: ServiceKind,

        /// Host to bind
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to bind (defaults to 8000 gateway, 8001 trainer, 8002 predictor)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Train a model on a CSV file and persist it
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Model kind
        #[arg(short, long, default_value = DEFAULT_MODEL_KIND)]
        model_type: String,

        /// Hyperparameters as a JSON object
        #[arg(long, default_value = "{}")]
        model_params: String,

        /// Target column (defaults to the last column)
        #[arg(short, long)]
        target: Option<String>,

        /// Columns to drop, comma separated or a JSON array
        #[arg(long)]
        columns_to_drop: Option<String>,

        /// Directory holding the model artifact
        #[arg(long, env = "MODEL_DIR", default_value = DEFAULT_MODEL_DIR)]
        model_dir: PathBuf,
    },

    /// Predict with the persisted model
    Predict {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Columns to drop, comma separated or a JSON array
        #[arg(long)]
        columns_to_drop: Option<String>,

        /// Directory holding the model artifact
        #[arg(long, env = "MODEL_DIR", default_value = DEFAULT_MODEL_DIR)]
        model_dir: PathBuf,

        /// Write predictions to this CSV instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    model_type: &str,
    model_params: &str,
    target: Option<&str>,
    columns_to_drop: Option<&str>,
    model_dir: &Path,
) -> anyhow::Result<()> {
    section("Train");

    let hyperparameters = parse_model_params(model_params)?;
    let columns_to_drop = parse_columns_to_drop(columns_to_drop)?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let mut config = ModelConfiguration::new(model_type).with_hyperparameters(hyperparameters);
    config.target_column = target.map(str::to_string);
    config.columns_to_drop = columns_to_drop;

    step_run(&format!("Training {}", model_type.cyan()));
    let start = Instant::now();
    let mut pipeline = TrainingPipeline::new(Arc::new(FsArtifactStore::new(model_dir)));
    let outcome = pipeline.train(&df, &config)?;
    step_done(&format!("{:?}", start.elapsed()));
    step_ok(&format!("Saved {}", outcome.artifact_location.display()));

    println!();
    println!(
        "  {:<16} {}",
        muted(&outcome.metric.name),
        format!("{:.4}", outcome.metric.value).white().bold()
    );
    println!();

    Ok(())
}

pub fn cmd_predict(
    data_path: &Path,
    columns_to_drop: Option<&str>,
    model_dir: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let columns_to_drop = parse_columns_to_drop(columns_to_drop)?;

    step_run("Loading data");
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows", df.height()));

    step_run("Predicting");
    let start = Instant::now();
    let mut pipeline = TrainingPipeline::new(Arc::new(FsArtifactStore::new(model_dir)));
    let predictions = pipeline.predict(&df, columns_to_drop.as_deref())?;
    step_done(&format!("{:?}", start.elapsed()));

    match output {
        Some(path) => {
            let mut out = df!("prediction" => predictions)?;
            save_csv(&mut out, path)?;
            step_ok(&format!("Wrote {}", path.display()));
        }
        None => {
            println!();
            for value in &predictions {
                println!("  {}", value);
            }
        }
    }
    println!();

    Ok(())
}

pub async fn cmd_serve(service: ServiceKind, host: &str, port: Option<u16>) -> anyhow::Result<()> {
    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..Default::default()
    };
    let port = config.port_for(service);

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "tabserve".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Service", service.name()));
    line_box(&kv("Status ", &format!("http://{}:{}/", host, port)));
    match service {
        ServiceKind::Trainer | ServiceKind::Predictor => {
            line_box(&kv("Models ", &config.model_dir.display().to_string()));
        }
        ServiceKind::Gateway => {
            line_box(&kv("Trainer", &config.trainer_url));
            line_box(&kv("Predict", &config.predict_url));
        }
    }
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(service, config).await
}
