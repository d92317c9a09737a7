//! Session model
//!
//! The singleton game session: phase, terminal statuses, fired scenario
//! events, join credentials and the event feed.
//!
//! # Critical Invariants
//!
//! 1. `phase` only moves forward in [`Phase::ORDER`]
//! 2. `active_events` only grows, each key at most once
//! 3. `reveal_names` never resets to false once true

use crate::events::ScenarioEventKey;
use crate::models::event::EventFeed;
use crate::models::new_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Game phase, in fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Phase1,
    Phase2,
    Phase3,
    Phase4,
    End,
}

impl Phase {
    pub const ORDER: [Phase; 6] = [
        Phase::Lobby,
        Phase::Phase1,
        Phase::Phase2,
        Phase::Phase3,
        Phase::Phase4,
        Phase::End,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Phase1 => "phase1",
            Phase::Phase2 => "phase2",
            Phase::Phase3 => "phase3",
            Phase::Phase4 => "phase4",
            Phase::End => "end",
        }
    }

    /// Immediate successor, `None` at `end`
    pub fn next(self) -> Option<Phase> {
        let idx = Phase::ORDER.iter().position(|p| *p == self)?;
        Phase::ORDER.get(idx + 1).copied()
    }

    /// Participants may act (everything except lobby and end)
    pub fn accepts_actions(self) -> bool {
        !matches!(self, Phase::Lobby | Phase::End)
    }

    /// Phases 3 and 4 run under market-wide stress
    pub fn is_stress(self) -> bool {
        matches!(self, Phase::Phase3 | Phase::Phase4)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ORDER
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown phase: {}", s))
    }
}

/// Health of the simulated bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankStatus {
    Stable,
    Rescued,
    Collapsed,
}

/// Central bank support decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoeStatus {
    Pending,
    Approved,
    Rejected,
}

/// Join code and expiring join token shown on the facilitator screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCredentials {
    pub code: String,
    pub token: String,
    pub expires_at: u64,
}

impl JoinCredentials {
    pub fn issue(now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            code: new_id(6).to_uppercase(),
            token: new_id(16),
            expires_at: now_ms + ttl_ms,
        }
    }

    /// Replace the token, keeping the session code
    pub fn rotate(&mut self, now_ms: u64, ttl_ms: u64) {
        self.token = new_id(16);
        self.expires_at = now_ms + ttl_ms;
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at < now_ms
    }
}

/// The active game session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub phase: Phase,
    pub phase_started_at: u64,
    pub created_at: u64,
    pub join: JoinCredentials,
    pub active_events: Vec<ScenarioEventKey>,
    /// Trigger time per fired event key
    pub event_triggered_at: BTreeMap<String, u64>,
    pub feed: EventFeed,
    pub boe_status: BoeStatus,
    pub bank_status: BankStatus,
    pub reveal_names: bool,
    /// The sub-48h survival alert has been raised this session
    pub survival_alert_raised: bool,
}

impl Session {
    pub fn new(now_ms: u64, join_ttl_ms: u64, feed_capacity: usize) -> Self {
        Self {
            id: new_id(10),
            phase: Phase::Lobby,
            phase_started_at: now_ms,
            created_at: now_ms,
            join: JoinCredentials::issue(now_ms, join_ttl_ms),
            active_events: Vec::new(),
            event_triggered_at: BTreeMap::new(),
            feed: EventFeed::new(feed_capacity),
            boe_status: BoeStatus::Pending,
            bank_status: BankStatus::Stable,
            reveal_names: false,
            survival_alert_raised: false,
        }
    }

    /// Identities are visible (end of game or facilitator reveal)
    pub fn names_revealed(&self) -> bool {
        self.reveal_names || self.phase == Phase::End
    }

    /// Reveal identities; idempotent and never undone
    pub fn reveal(&mut self) {
        self.reveal_names = true;
    }

    pub fn has_fired(&self, key: ScenarioEventKey) -> bool {
        self.active_events.contains(&key)
    }

    pub fn is_terminal(&self) -> bool {
        self.bank_status != BankStatus::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_successors() {
        assert_eq!(Phase::Lobby.next(), Some(Phase::Phase1));
        assert_eq!(Phase::Phase4.next(), Some(Phase::End));
        assert_eq!(Phase::End.next(), None);
    }

    #[test]
    fn test_phase_parse() {
        assert_eq!("phase3".parse::<Phase>(), Ok(Phase::Phase3));
        assert!("phase5".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Phase2).unwrap(), "\"phase2\"");
    }

    #[test]
    fn test_join_credentials_expiry() {
        let join = JoinCredentials::issue(1_000, 500);
        assert_eq!(join.code.len(), 6);
        assert!(!join.is_expired(1_500));
        assert!(join.is_expired(1_501));
    }
}
