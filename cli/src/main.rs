//! Bank Run CLI
//!
//! Facilitator console for a classroom bank run session. Every command
//! restores the session from the state file, applies one command and saves
//! it back, so several terminals can drive the same classroom in turn.

use anyhow::{Context, Result};
use bank_run_core::orchestrator::parse_phase;
use bank_run_core::{
    FileStateStore, JoinRequest, OcrTextCapture, Simulation, SimulationConfig, SystemClock,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Bank run classroom simulation
#[derive(Parser)]
#[command(name = "bank-run")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Session state file (JSON checkpoint)
    #[arg(
        short,
        long,
        global = true,
        env = "BANK_RUN_STATE",
        default_value = "bank_run_state.json"
    )]
    state: PathBuf,

    /// Config file path (JSON, every field optional)
    #[arg(short, long, global = true, env = "BANK_RUN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current snapshot
    Status {
        /// Include this participant's own view
        #[arg(short, long)]
        participant: Option<String>,
    },

    /// Print the join screen (code, token, counts)
    Session,

    /// Print the join quiz
    Quiz,

    /// Move to the next phase (lobby, phase1 .. phase4, end)
    Phase { phase: String },

    /// Fire a scenario event (LIBOR_RISE, PREPAY_SLOW, COMPETITOR_15, BBC_LEAK)
    Event { key: String },

    /// Apply the Bank of England decision (rescue, collapse)
    Decide { decision: String },

    /// Admit a participant
    Join {
        /// Display name (ignored with --id-text)
        #[arg(short, long, required_unless_present = "id_text")]
        name: Option<String>,

        /// OCR text of the participant's ID card
        #[arg(long)]
        id_text: Option<PathBuf>,

        /// Session code typed by the participant
        #[arg(long)]
        code: Option<String>,

        /// Join token (defaults to the current one)
        #[arg(short, long)]
        token: Option<String>,

        /// Quiz answers as question=option, e.g. q1=a
        #[arg(short, long = "answer")]
        answers: Vec<String>,
    },

    /// Look a participant up by resume token
    Resume { token: String },

    /// Submit a participant action
    Action {
        participant: String,

        /// Action type, e.g. select_product
        action_type: String,

        /// JSON payload
        #[arg(default_value = "null")]
        payload: String,
    },

    /// Run accrual ticks immediately
    Tick {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,
    },

    /// Run the accrual scheduler in the foreground
    Run {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Replace the join token
    Rotate,

    /// Post a facilitator message to the feed
    Broadcast { message: String },

    /// Print the classroom report
    Report,

    /// Discard the session and start a new one
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let mut store = FileStateStore::new(cli.state.clone());
    let mut sim = Simulation::restore_or_fresh(config, Box::new(SystemClock), &store)
        .context("failed to start engine")?;

    match cli.command {
        Commands::Status { participant } => {
            print_json(&sim.snapshot(participant.as_deref()))?;
            return Ok(());
        }
        Commands::Session => print_json(&sim.session_info())?,
        Commands::Quiz => {
            print_json(&sim.join_quiz())?;
            return Ok(());
        }
        Commands::Phase { phase } => {
            sim.set_phase(parse_phase(&phase)?)?;
            tracing::info!(phase = %sim.state().session.phase, "phase changed");
        }
        Commands::Event { key } => {
            sim.trigger_event(&key)?;
        }
        Commands::Decide { decision } => {
            let decision = sim.apply_resolution_decision(&decision)?;
            tracing::info!(%decision, "decision applied");
        }
        Commands::Join {
            name,
            id_text,
            code,
            token,
            answers,
        } => {
            let token = match token {
                Some(token) => token,
                None => sim.session_info().join_token,
            };
            let request = JoinRequest {
                display_name: name.unwrap_or_default(),
                code,
                token,
                quiz_answers: parse_answers(&answers)?,
            };
            let receipt = match id_text {
                Some(path) => {
                    let card = std::fs::read(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    sim.join_with_id(&OcrTextCapture, &card, request)?
                }
                None => sim.join(&request)?,
            };
            print_json(&receipt)?;
        }
        Commands::Resume { token } => {
            print_json(&sim.resume(&token)?)?;
            return Ok(());
        }
        Commands::Action {
            participant,
            action_type,
            payload,
        } => {
            let payload: Value =
                serde_json::from_str(&payload).context("payload is not valid JSON")?;
            sim.submit_action(&participant, &action_type, &payload)?;
        }
        Commands::Tick { count } => {
            for _ in 0..count {
                let report = sim.tick();
                print_json(&report)?;
            }
        }
        Commands::Run { ticks } => run_scheduler(&mut sim, &mut store, ticks)?,
        Commands::Rotate => print_json(&sim.rotate_join_token())?,
        Commands::Broadcast { message } => sim.broadcast(&message)?,
        Commands::Report => {
            print_json(&sim.classroom_report())?;
            return Ok(());
        }
        Commands::Reset => sim.reset_session(),
    }

    sim.save(&mut store)
        .with_context(|| format!("failed to save {}", store.path().display()))?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_answers(answers: &[String]) -> Result<BTreeMap<String, String>> {
    answers
        .iter()
        .map(|pair| {
            let (question, option) = pair
                .split_once('=')
                .with_context(|| format!("answer '{}' is not question=option", pair))?;
            Ok((question.trim().to_string(), option.trim().to_string()))
        })
        .collect()
}

/// Tick on the configured period, saving after every tick
fn run_scheduler(
    sim: &mut Simulation,
    store: &mut FileStateStore,
    limit: Option<u64>,
) -> Result<()> {
    let period = sim.tick_period();
    tracing::info!(period_ms = period.as_millis() as u64, "scheduler started");
    let mut done = 0u64;
    while limit.map_or(true, |limit| done < limit) {
        std::thread::sleep(period);
        let report = sim.tick();
        done += 1;
        if report.collapsed {
            tracing::warn!(ticks = report.ticks, "bank collapsed");
        }
        sim.save(store)?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
