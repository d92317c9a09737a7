//! Scores, labels and the leaderboard
//!
//! Derived on read from the current state; nothing here is stored.
//!
//! Scores are in display points: a depositor's score is their balance in
//! pounds plus adjustments, a wholesale score is balance in £100m units ×100.

use crate::models::catalog::Role;
use crate::models::participant::{Participant, RoleState};
use crate::models::session::{BankStatus, Phase, Session};
use crate::models::state::GameState;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

const HEDGE_BONUS: f64 = 800.0;
const PANIC_SIGNAL_BONUS: f64 = 200.0;
const EARLY_EXIT_PENALTY: f64 = 1_200.0;
const STRESS_EXIT_BONUS: f64 = 500.0;
const FINAL_EXIT_BONUS: f64 = 350.0;
const COLLAPSE_EXPOSED_PENALTY: f64 = 4_000.0;

const EARLY_REFUSAL_BONUS: f64 = 300.0;
const FINAL_REFUSAL_BONUS: f64 = 200.0;
const RESCUED_HOLD_BONUS: f64 = 900.0;
const COLLAPSED_HOLD_PENALTY: f64 = 1_200.0;

/// Score for one participant
pub fn score(participant: &Participant, session: &Session, protection_limit: i64) -> i64 {
    match &participant.state {
        RoleState::Depositor(d) => {
            let mut score = participant.balance as f64 / 100.0;
            if d.hedge.is_some() {
                score += HEDGE_BONUS;
            }
            score += d.panic_signals as f64 * PANIC_SIGNAL_BONUS;
            match d.withdrawn_at() {
                Some(Phase::Phase1 | Phase::Phase2) => score -= EARLY_EXIT_PENALTY,
                Some(Phase::Phase3) => score += STRESS_EXIT_BONUS,
                Some(Phase::Phase4) => score += FINAL_EXIT_BONUS,
                _ => {}
            }
            if session.bank_status == BankStatus::Collapsed
                && participant.balance > protection_limit
                && !d.withdrew()
            {
                score -= COLLAPSE_EXPOSED_PENALTY;
            }
            score.round().max(0.0) as i64
        }
        RoleState::Wholesale(w) => {
            let mut score = participant.balance as f64 / 100_000_000.0;
            match w.refused_at {
                Some(Phase::Phase3) => score += EARLY_REFUSAL_BONUS,
                Some(Phase::Phase4) => score += FINAL_REFUSAL_BONUS,
                _ => {}
            }
            if w.held_through_resolution {
                match session.bank_status {
                    BankStatus::Rescued => score += RESCUED_HOLD_BONUS,
                    BankStatus::Collapsed => score -= COLLAPSED_HOLD_PENALTY,
                    BankStatus::Stable => {}
                }
            }
            (score * 100.0).round() as i64
        }
    }
}

/// End-of-game narrative label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Active,
    #[serde(rename = "Shrewd Exit")]
    ShrewdExit,
    #[serde(rename = "Panicked Early")]
    PanickedEarly,
    #[serde(rename = "Brave Hold")]
    BraveHold,
    Gone,
    #[serde(rename = "Safe but Low")]
    SafeButLow,
    Greedy,
    #[serde(rename = "Hero Hold")]
    HeroHold,
    Trapped,
    Strategic,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Active => "Active",
            Label::ShrewdExit => "Shrewd Exit",
            Label::PanickedEarly => "Panicked Early",
            Label::BraveHold => "Brave Hold",
            Label::Gone => "Gone",
            Label::SafeButLow => "Safe but Low",
            Label::Greedy => "Greedy",
            Label::HeroHold => "Hero Hold",
            Label::Trapped => "Trapped",
            Label::Strategic => "Strategic",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label for one participant; `Active` until names are revealed
///
/// Rows are checked in priority order: exit timing, then bank status, then
/// behaviour.
pub fn label(participant: &Participant, session: &Session, protection_limit: i64) -> Label {
    if !session.names_revealed() {
        return Label::Active;
    }
    let status = session.bank_status;
    match &participant.state {
        RoleState::Depositor(d) => match d.withdrawn_at() {
            Some(Phase::Phase3) => Label::ShrewdExit,
            Some(Phase::Phase1 | Phase::Phase2) => Label::PanickedEarly,
            None if status == BankStatus::Rescued => Label::BraveHold,
            None if status == BankStatus::Collapsed && participant.balance > protection_limit => {
                Label::Gone
            }
            None if status == BankStatus::Collapsed => Label::SafeButLow,
            _ if d.panic_signals > 1 => Label::Greedy,
            _ => Label::Active,
        },
        RoleState::Wholesale(w) => {
            if w.refused_at == Some(Phase::Phase3) {
                Label::ShrewdExit
            } else if w.held_through_resolution && status == BankStatus::Rescued {
                Label::HeroHold
            } else if w.held_through_resolution && status == BankStatus::Collapsed {
                Label::Trapped
            } else {
                Label::Strategic
            }
        }
    }
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub id: String,
    pub role: Role,
    pub display_name: String,
    pub score: i64,
    pub label: Label,
}

/// Every participant, highest score first
///
/// Ties keep join order. Display names are pseudonyms until reveal.
pub fn leaderboard(state: &GameState, protection_limit: i64) -> Vec<LeaderboardRow> {
    let session = &state.session;
    let reveal = session.names_revealed();
    let mut rows: Vec<(u64, LeaderboardRow)> = state
        .participants()
        .map(|p| {
            let row = LeaderboardRow {
                id: p.id.clone(),
                role: p.role(),
                display_name: if reveal { p.name.clone() } else { p.pseudonym() },
                score: score(p, session, protection_limit),
                label: label(p, session, protection_limit),
            };
            (p.joined_at, row)
        })
        .collect();
    rows.sort_by_key(|(joined_at, row)| (Reverse(row.score), *joined_at, row.id.clone()));
    rows.into_iter().map(|(_, row)| row).collect()
}

/// 1-based leaderboard position, if present
pub fn rank_of(rows: &[LeaderboardRow], participant_id: &str) -> Option<usize> {
    rows.iter()
        .position(|row| row.id == participant_id)
        .map(|i| i + 1)
}
