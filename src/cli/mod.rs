//! OrangeFlow CLI Module
//!
//! Command-line interface: start the HTTP server, or drive one pipeline run
//! over a local file.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::pipeline::{Session, TrainSummary};
use crate::preprocessing::{MissingStrategy, PreprocessingConfig, ScalerType};
use crate::training::{DecisionTree, ModelKind, ModelParams, SplitConfig, TrainedModel};
use crate::visualization::TreeSvgRenderer;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(255, 150, 60) }
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
#[command(name = "orangeflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Upload, preprocess, split and train tabular classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Server port
        #[arg(short, long, env = "API_PORT", default_value = "8000")]
        port: u16,

        /// Server host
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,
    },

    /// Run the whole pipeline once on a local file
    Run {
        /// Input data file (CSV, XLSX or XLS)
        file: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Comma-separated feature columns; defaults to every other column
        #[arg(short, long, value_delimiter = ',')]
        features: Vec<String>,

        /// Scaling (standard, minmax, none)
        #[arg(long, default_value = "standard")]
        scaling: String,

        /// Missing values (drop, mean, median)
        #[arg(long, default_value = "drop")]
        missing: String,

        /// Fraction of rows held out for testing
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Random seed of the split
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Disable stratified splitting
        #[arg(long)]
        no_stratify: bool,

        /// Model type (logistic, tree)
        #[arg(short, long, default_value = "logistic")]
        model: String,

        /// Tree depth limit
        #[arg(long, default_value = "5")]
        max_depth: usize,

        /// Inverse regularization strength of logistic regression
        #[arg(long, default_value = "1.0")]
        c: f64,

        /// Write the tree diagram to this SVG file
        #[arg(long)]
        svg: Option<PathBuf>,
    },
}

/// Options of [`cmd_run`]
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target: String,
    pub features: Vec<String>,
    pub scaling: String,
    pub missing: String,
    pub split: SplitConfig,
    pub model: String,
    pub params: ModelParams,
    pub svg: Option<PathBuf>,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Run upload → preprocess → split → train on a file and print the metrics
pub fn cmd_run(file: &Path, options: &RunOptions) -> anyhow::Result<TrainSummary> {
    section("Run");

    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let mut session = Session::new();

    step_run("Loading data");
    let start = Instant::now();
    let bytes = std::fs::read(file)?;
    let upload = session.upload(&filename, &bytes)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        upload.rows,
        upload.columns.len(),
        start.elapsed()
    ));

    let features = if options.features.is_empty() {
        upload.columns.clone()
    } else {
        options.features.clone()
    };
    let config = PreprocessingConfig::new(options.target.clone(), features)
        .with_scaler(options.scaling.parse::<ScalerType>()?)
        .with_missing(options.missing.parse::<MissingStrategy>()?);

    step_run("Preprocessing");
    let prepared = session.preprocess(config)?;
    step_done(&format!("{} samples × {} dims", prepared.samples, prepared.dims));

    step_run("Splitting");
    let split = session.split(&options.split)?;
    let detail = match &split.stratify_fallback {
        Some(reason) => format!("{} train / {} test, unstratified: {}", split.train, split.test, reason),
        None => format!("{} train / {} test", split.train, split.test),
    };
    step_done(&detail);

    let kind = options.model.parse::<ModelKind>()?;
    step_run(&format!("Training {}", kind.as_str().cyan()));
    let start = Instant::now();
    let summary = session.train(kind, options.params)?;
    step_done(&format!("{:?}", start.elapsed()));

    if let Some(path) = &options.svg {
        let engine = session.model();
        match engine.and_then(|e| e.model()) {
            Some(TrainedModel::Tree(tree)) => {
                let feature_names = session
                    .prepared()
                    .map(|p| p.feature_names.clone())
                    .unwrap_or_default();
                let class_names: Vec<String> = engine
                    .map(|e| e.classes().iter().map(|c| c.to_string()).collect())
                    .unwrap_or_default();
                export_tree(tree, &feature_names, &class_names, path)?;
            }
            _ => println!("  {}", "--svg ignored: only tree models have a diagram".yellow()),
        }
    }

    print_summary(&summary);
    Ok(summary)
}

fn export_tree(
    tree: &DecisionTree,
    feature_names: &[String],
    class_names: &[String],
    path: &Path,
) -> anyhow::Result<()> {
    step_run(&format!("Saving → {}", path.display()));
    TreeSvgRenderer::new(feature_names, class_names).export(tree, path)?;
    step_done(&format!("{} leaves, depth {}", tree.get_n_leaves(), tree.get_depth()));
    Ok(())
}

fn print_summary(summary: &TrainSummary) {
    println!();
    println!(
        "  {:<16} {}",
        muted("Accuracy"),
        format!("{:.2}%", summary.accuracy).white().bold()
    );
    println!("  {:<16} {}", muted("Test rows"), summary.predictions.len().to_string().white());
    println!("  {}", muted("Confusion matrix"));
    for row in &summary.confusion_matrix {
        let cells: Vec<String> = row.iter().map(|c| format!("{:>5}", c)).collect();
        println!("  {}", cells.join(" ").white());
    }
    println!();
}

pub async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "OrangeFlow".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/health", host, port)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig::default().with_host(host).with_port(port);

    run_server(config).await
}
