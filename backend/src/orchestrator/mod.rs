//! Orchestrator module
//!
//! Session control and the engine that ties every component together:
//! the phase controller, joins, the accrual scheduler step, checkpoints
//! and [`Simulation`] itself.

pub mod accrual;
pub mod checkpoint;
pub mod controller;
pub mod engine;
pub mod join;

pub use accrual::{accrue, effective_rate_pct};
pub use checkpoint::{
    compute_config_hash, FileStateStore, InMemoryStateStore, StateSnapshot, StateStore,
    CHECKPOINT_VERSION,
};
pub use controller::{apply_decision, parse_phase, rescue_injection, set_phase, Decision};
pub use engine::{SessionInfo, Simulation, TickReport, MAX_BROADCAST_CHARS};
pub use join::{
    assign_role, duplicate_key, normalize_display_name, score_quiz, JoinQuiz, JoinReceipt,
    JoinRequest,
};
