//! Synheart Typing Auth CLI
//!
//! Keystroke-dynamics authentication engine: offline evaluation, parameter
//! search and enrollment store maintenance.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synheart_typing_auth::{
    audit::{create_shared_log_with_persistence, AuditLog},
    capture::{Acquisition, Keystroke, ReplayInput, SensorType, SessionCapture},
    config::Config,
    evaluation::{self, optimizer::Dimension, Corpus},
    store::{EnrollmentKey, EnrollmentStore, JsonFileStore, MemoryStore},
    Score, VERSION,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-auth")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Keystroke-dynamics authentication for touchscreen typing", long_about = None)]
struct Cli {
    /// Use this configuration file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-validate the configured classifier on a study corpus
    Evaluate {
        /// Directory with one JSON file per subject
        corpus: PathBuf,

        /// Ignore control group subjects (files ending in cg.json)
        #[arg(long)]
        skip_control_group: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search classifier parameters for the lowest EER
    Optimize {
        /// Directory with one JSON file per subject
        corpus: PathBuf,

        /// Dimensions to search (default: all)
        #[arg(long = "dimension", short)]
        dimensions: Vec<Dimension>,

        /// Ignore control group subjects (files ending in cg.json)
        #[arg(long)]
        skip_control_group: bool,

        /// Write the full report (every candidate's EER) to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Enroll a constant signal and check that it converges to score 0
    Selftest {
        /// Context id used for the self-test enrollment set
        #[arg(long, default_value = "4294967295")]
        context: u64,

        /// Keep the enrollment data afterwards
        #[arg(long)]
        keep: bool,

        /// Run against an in-memory store instead of the data directory
        #[arg(long)]
        memory: bool,
    },

    /// Show enrollment sets and authentication statistics
    Status,

    /// Delete enrollment data
    Clear {
        /// Context id to clear (default: every context)
        #[arg(long)]
        context: Option<u64>,

        /// Screen orientation to clear (requires --context)
        #[arg(long, requires = "context")]
        orientation: Option<i32>,
    },

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    match cli.command {
        Commands::Evaluate {
            corpus,
            skip_control_group,
            json,
        } => cmd_evaluate(&config, &corpus, skip_control_group, json),
        Commands::Optimize {
            corpus,
            dimensions,
            skip_control_group,
            output,
        } => cmd_optimize(&config, &corpus, &dimensions, skip_control_group, output),
        Commands::Selftest {
            context,
            keep,
            memory,
        } => cmd_selftest(&config, context, keep, memory),
        Commands::Status => cmd_status(&config),
        Commands::Clear {
            context,
            orientation,
        } => cmd_clear(&config, context, orientation),
        Commands::Config => cmd_config(&config),
    }
}

fn load_corpus(config: &Config, dir: &Path, skip_control_group: bool) -> Result<Corpus> {
    let skip = skip_control_group || config.optimizer.skip_control_group;
    let corpus = Corpus::load(dir, skip)
        .with_context(|| format!("Failed to load corpus from {}", dir.display()))?;
    println!(
        "Loaded {} subject(s), {} acquisition(s) from {}",
        corpus.len(),
        corpus.acquisition_count(),
        dir.display()
    );
    Ok(corpus)
}

fn cmd_evaluate(config: &Config, dir: &Path, skip_control_group: bool, json: bool) -> Result<()> {
    let corpus = load_corpus(config, dir, skip_control_group)?;
    let report = evaluation::evaluate(
        &corpus,
        &config.classifier,
        config.optimizer.threshold_increment,
        config.optimizer.workers,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("Evaluation Report");
        println!("=================");
        println!();
        println!("{}", report.summary());
    }
    Ok(())
}

fn cmd_optimize(
    config: &Config,
    dir: &Path,
    dimensions: &[Dimension],
    skip_control_group: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let corpus = load_corpus(config, dir, skip_control_group)?;
    let dimensions = if dimensions.is_empty() {
        Dimension::ALL.to_vec()
    } else {
        dimensions.to_vec()
    };

    println!("Searching {} dimension(s) with {} worker(s)", dimensions.len(), config.optimizer.workers);
    println!("Press Ctrl+C to cancel");
    println!();

    let cancel = Arc::new(AtomicBool::new(false));
    ctrlc_handler(cancel.clone())?;

    let report = evaluation::optimize(
        &corpus,
        &config.classifier,
        &config.optimizer,
        &dimensions,
        &cancel,
    )?;

    println!("Optimization Report");
    println!("===================");
    println!();
    println!("{}", report.summary());
    if let Some(best) = &report.best {
        println!();
        println!("Best overall: {} (EER {:.4})", best.label, best.eer);
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

/// Ten identical key presses with readings on every sensor.
fn constant_acquisition(context: u64) -> Acquisition {
    let sensors: BTreeMap<SensorType, Vec<f64>> = SensorType::ALL
        .into_iter()
        .map(|sensor| (sensor, vec![0.1, 0.2, 0.3]))
        .collect();

    let mut acquisition = Acquisition::new(context, 0, chrono::Utc::now());
    acquisition.keystrokes = (0..10)
        .map(|i| Keystroke {
            x: 100.0,
            y: 200.0,
            size: 0.5,
            orientation: 0.0,
            pressure: 0.7,
            down_down_interval: if i == 0 { 0.0 } else { 150.0 },
            up_down_interval: 80.0,
            sensors: sensors.clone(),
        })
        .collect();
    acquisition
}

fn run_selftest<S: EnrollmentStore>(
    session: &mut SessionCapture<S>,
    key: EnrollmentKey,
    sessions: usize,
) -> Result<Vec<Score>> {
    let acquisition = constant_acquisition(key.context_id);
    let mut scores = Vec::with_capacity(sessions);
    for _ in 0..sessions {
        let mut input = ReplayInput::new(&acquisition)?;
        let score = session
            .run(key, &mut input, false)?
            .context("Self-test session produced no score")?;
        scores.push(score);
    }
    Ok(scores)
}

fn cmd_selftest(config: &Config, context: u64, keep: bool, memory: bool) -> Result<()> {
    let key = EnrollmentKey::new(context, 0);
    let acquisition_set_size = config.classifier.acquisition_set_size;
    let sessions = acquisition_set_size + 3;

    println!("Synheart Typing Auth v{VERSION} self-test");
    println!("  Enrollment key: {key}");
    println!("  Sessions: {sessions}");
    println!();

    let scores = if memory {
        let mut session = SessionCapture::new(config.classifier.clone(), MemoryStore::new())?;
        run_selftest(&mut session, key, sessions)?
    } else {
        let store = JsonFileStore::open(config.enrollment_path())?;
        store.clear(key)?;
        let audit = create_shared_log_with_persistence(config.audit_path());
        let mut session =
            SessionCapture::new(config.classifier.clone(), &store)?.with_audit(audit.clone());
        let scores = run_selftest(&mut session, key, sessions)?;

        if let Err(e) = audit.save() {
            eprintln!("Warning: Could not save audit stats: {e}");
        }
        if !keep {
            store.clear(key)?;
        }
        scores
    };

    for (i, score) in scores.iter().enumerate() {
        println!("  Session {:>2}: {score}", i + 1);
    }
    println!();

    // Scoring starts once the set has been filled and locked
    let (early, late) = scores.split_at(acquisition_set_size.min(scores.len()));
    if early.iter().any(|s| *s != Score::NotEnoughData) {
        bail!("Self-test failed: a score was produced before the enrollment set was full");
    }
    if late.iter().any(|s| *s != Score::Value(0.0)) {
        bail!("Self-test failed: constant input did not score 0");
    }

    info!(sessions, "Self-test passed");
    println!("Self-test passed ✓");
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Synheart Typing Auth Status");
    println!("===========================");
    println!();

    println!("Classifier:");
    let classifier = &config.classifier;
    println!("  Acquisition set size: {}", classifier.acquisition_set_size);
    println!("  Template set size: {}", classifier.template_set_size);
    println!(
        "  Template selection: {}",
        if classifier.enable_template_selection {
            classifier.template_selection_function.to_string()
        } else {
            "disabled".to_string()
        }
    );
    println!("  Distance: {}", classifier.distance_function);
    println!("  Classification: {}", classifier.classification_function);
    println!();

    let store = JsonFileStore::open(config.enrollment_path())?;
    let keys = store.keys()?;
    if keys.is_empty() {
        println!("No enrollment data found.");
    } else {
        println!("Enrollment sets:");
        for key in keys {
            let set = store.load(key)?;
            println!(
                "  {key}: {} record(s){}",
                set.len(),
                if set.locked { ", locked" } else { "" }
            );
        }
    }
    println!();

    if config.audit_path().exists() {
        let audit = AuditLog::with_persistence(config.audit_path());
        println!("{}", audit.summary());
    } else {
        println!("No authentication statistics recorded.");
    }
    Ok(())
}

fn cmd_clear(config: &Config, context: Option<u64>, orientation: Option<i32>) -> Result<()> {
    let store = JsonFileStore::open(config.enrollment_path())?;

    let keys: Vec<EnrollmentKey> = store
        .keys()?
        .into_iter()
        .filter(|key| context.map_or(true, |c| key.context_id == c))
        .filter(|key| orientation.map_or(true, |o| key.screen_orientation == o))
        .collect();

    for key in &keys {
        store.clear(*key)?;
    }
    println!("Cleared {} enrollment set(s).", keys.len());
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(cancel: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
