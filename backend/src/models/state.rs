//! Game State
//!
//! Everything that is persisted for one session: the session record, the
//! metrics and every participant ever joined.
//!
//! # Critical Invariants
//!
//! 1. **Participant Permanence**: participants are never removed before reset
//! 2. **Role Immutability**: a participant's role tag never changes
//! 3. **Tick Monotonicity**: `ticks` only grows

use crate::config::SimulationConfig;
use crate::models::catalog::Role;
use crate::models::metrics::Metrics;
use crate::models::participant::Participant;
use crate::models::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts of participants per role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub depositor: usize,
    pub wholesale: usize,
    pub total: usize,
}

/// Complete game state
///
/// # Example
///
/// ```rust
/// use bank_run_core::{GameState, SimulationConfig};
///
/// let state = GameState::new(&SimulationConfig::default(), 0);
/// assert_eq!(state.role_counts().total, 0);
/// assert_eq!(state.ticks, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub session: Session,
    pub metrics: Metrics,
    /// All participants, indexed by participant ID
    pub participants: BTreeMap<String, Participant>,
    pub ticks: u64,
    pub last_tick_at: u64,
}

impl GameState {
    pub fn new(config: &SimulationConfig, now_ms: u64) -> Self {
        Self {
            session: Session::new(now_ms, config.join_token_ttl_ms, config.event_feed_capacity),
            metrics: Metrics::default(),
            participants: BTreeMap::new(),
            ticks: 0,
            last_tick_at: now_ms,
        }
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn participant_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.get_mut(id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Participant> {
        self.participants.values().filter(move |p| p.role() == role)
    }

    pub fn role_counts(&self) -> RoleCounts {
        let depositor = self.by_role(Role::Depositor).count();
        let wholesale = self.by_role(Role::Wholesale).count();
        RoleCounts {
            depositor,
            wholesale,
            total: depositor + wholesale,
        }
    }

    /// Depositors who have exited
    pub fn withdrawals(&self) -> usize {
        self.participants
            .values()
            .filter_map(|p| p.depositor())
            .filter(|d| d.withdrew())
            .count()
    }

    /// Wholesale lenders who have refused
    pub fn refusals(&self) -> usize {
        self.participants
            .values()
            .filter_map(|p| p.wholesale())
            .filter(|w| w.refused())
            .count()
    }

    pub fn find_by_resume_token(&self, token: &str) -> Option<&Participant> {
        self.participants.values().find(|p| p.resume_token == token)
    }
}
