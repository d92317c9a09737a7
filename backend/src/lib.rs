//! Bank Run Simulator Core - Rust Engine
//!
//! Classroom bank run simulation with deterministic execution. A facilitator
//! walks a cohort of depositors and wholesale lenders through five phases of
//! a funding crisis at one bank; every choice feeds the bank's liquidity
//! picture in real time.
//!
//! # Architecture
//!
//! - **models**: Domain types (Participant, Session, Metrics, GameState)
//! - **actions**: Participant action validation and effects
//! - **events**: Facilitator scenario events
//! - **liquidity**: Maturity buckets, buffer and survival horizon
//! - **outcome**: Scores, labels, leaderboard and classroom report
//! - **orchestrator**: Phase controller, joins, accrual, checkpoints, engine
//! - **snapshot**: Read model served to facilitator and participants
//! - **identity**: Display names from ID images
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (pence)
//! 2. All randomness is deterministic (seeded RNG)
//! 3. One writer: every mutation goes through `&mut Simulation`

// Module declarations
pub mod actions;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod identity;
pub mod liquidity;
pub mod models;
pub mod orchestrator;
pub mod outcome;
pub mod rng;
pub mod snapshot;

// Re-exports for convenience
pub use config::SimulationConfig;
pub use core::time::{Clock, ManualClock, SystemClock};
pub use error::{ActionError, ErrorKind, JoinError, PersistenceError, SessionError, SimulationError};
pub use identity::{ExtractedName, IdentityCapture, IdentityError, OcrTextCapture};
pub use models::{
    event::{EventFeed, FeedEvent},
    participant::Participant,
    session::{BankStatus, BoeStatus, Phase},
    state::GameState,
    Role,
};
pub use orchestrator::{
    Decision, FileStateStore, InMemoryStateStore, JoinReceipt, JoinRequest, SessionInfo,
    Simulation, StateStore, TickReport,
};
pub use rng::RngManager;
pub use snapshot::{build_snapshot, Snapshot};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn bank_run_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::PyBankRun>()?;
    Ok(())
}
