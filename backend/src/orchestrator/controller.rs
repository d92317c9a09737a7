//! Session / phase controller
//!
//! Phase advancement and the terminal Bank-of-England decision.
//!
//! # Critical Invariants
//!
//! 1. **Sequential phases**: only the immediate successor is accepted
//! 2. **One terminal outcome**: the decision is only valid while STABLE,
//!    and both outcomes leave the bank in a terminal status
//! 3. **No partial application**: every rejection happens before the first
//!    write

use crate::actions::{finalize_depositor_choice, finalize_wholesale_deployment, format_amount};
use crate::error::SessionError;
use crate::liquidity::short_term_funding_gap;
use crate::models::catalog::{Facility, Product};
use crate::models::event::FeedKind;
use crate::models::metrics::{Scenario, StageStatus};
use crate::models::participant::{round_pence, RoleState};
use crate::models::session::{BankStatus, BoeStatus, Phase};
use crate::models::state::GameState;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Rescue injection floor: £220m
const MIN_INJECTION: i64 = 22_000_000_000;
/// Rescue injection ceiling: £1.6bn
const MAX_INJECTION: i64 = 160_000_000_000;
/// Share of the short-term funding gap covered by a rescue
const GAP_COVER: f64 = 0.55;
/// Extra injection per refusing lender: £220m
const PER_REFUSAL: f64 = 22_000_000_000.0;
/// Extra injection per withdrawn depositor: £7.5m
const PER_WITHDRAWAL: f64 = 750_000_000.0;

/// Move the session to `target`
///
/// Only `current.next()` is accepted. Entry effects run after the phase
/// field is updated.
pub fn set_phase(state: &mut GameState, target: Phase, now_ms: u64) -> Result<(), SessionError> {
    let from = state.session.phase;
    if from.next() != Some(target) {
        return Err(SessionError::InvalidTransition { from, to: target });
    }

    state.session.phase = target;
    state.session.phase_started_at = now_ms;
    state.session.feed.push(
        FeedKind::Phase,
        format!("Phase changed to {}.", target.as_str().to_uppercase()),
        now_ms,
    );

    match target {
        Phase::Phase1 => {
            state.session.bank_status = BankStatus::Stable;
            state.session.event_triggered_at.clear();
        }
        Phase::Phase2 => {
            for participant in state.participants.values_mut() {
                match participant.state {
                    RoleState::Depositor(_) => {
                        finalize_depositor_choice(participant, Some(Product::Current), now_ms);
                    }
                    RoleState::Wholesale(_) => {
                        finalize_wholesale_deployment(
                            participant,
                            Some(Facility::Overnight),
                            now_ms,
                        );
                    }
                }
            }
            state.metrics.scenario = Scenario::BaseCase;
        }
        Phase::Phase3 => {
            state.metrics.stress_types.market_wide = true;
            state.metrics.cfp_stage.stage2 = StageStatus::Active;
            for participant in state.participants.values_mut() {
                if let RoleState::Depositor(d) = &mut participant.state {
                    d.switched_to_current = false;
                    d.queue.reset(now_ms);
                }
            }
        }
        Phase::Phase4 => {
            state.metrics.cfp_stage.stage3 = StageStatus::Pending;
        }
        Phase::End => state.session.reveal(),
        Phase::Lobby => {}
    }

    tracing::info!(from = %from, to = %target, "phase changed");
    Ok(())
}

/// Parse a phase name from a facilitator command
pub fn parse_phase(name: &str) -> Result<Phase, SessionError> {
    name.parse::<Phase>()
        .map_err(|_| SessionError::UnknownPhase(name.to_string()))
}

/// Central bank decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Rescue,
    Collapse,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Rescue => "rescue",
            Decision::Collapse => "collapse",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rescue" => Ok(Decision::Rescue),
            "collapse" => Ok(Decision::Collapse),
            other => Err(SessionError::InvalidDecision(other.to_string())),
        }
    }
}

/// Emergency funding for a rescue, in pence
pub fn rescue_injection(state: &GameState) -> i64 {
    let gap = short_term_funding_gap(state) as f64;
    let raw = gap * GAP_COVER
        + state.refusals() as f64 * PER_REFUSAL
        + state.withdrawals() as f64 * PER_WITHDRAWAL;
    round_pence(raw).clamp(MIN_INJECTION, MAX_INJECTION)
}

/// Apply the terminal rescue / collapse decision
///
/// Forces `end`, reveals identities and marks every lender that never
/// refused as held through resolution. On collapse, unwithdrawn depositors
/// above `protection_limit` are cut down to it.
pub fn apply_decision(
    state: &mut GameState,
    decision: Decision,
    protection_limit: i64,
    now_ms: u64,
) -> Result<(), SessionError> {
    if state.session.is_terminal() {
        return Err(SessionError::DecisionAlreadyMade);
    }

    match decision {
        Decision::Rescue => {
            let injection = rescue_injection(state);
            state.session.boe_status = BoeStatus::Approved;
            state.session.bank_status = BankStatus::Rescued;
            state.metrics.outcomes.boe_injected = true;
            state.metrics.outcomes.rescue_injection_amount = injection;
            state.metrics.liquidity_buffer += injection;
            state.session.feed.push(
                FeedKind::Critical,
                format!(
                    "BoE rescue approved. Emergency funding injected: {}.",
                    format_amount(injection)
                ),
                now_ms,
            );
            tracing::info!(injection, "bank rescued");
        }
        Decision::Collapse => {
            state.session.boe_status = BoeStatus::Rejected;
            state.session.bank_status = BankStatus::Collapsed;
            state.metrics.liquidity_buffer = 0;
            state.session.feed.push(
                FeedKind::Critical,
                "BoE rescue denied/late. Granite Bank collapsed.",
                now_ms,
            );
            tracing::warn!("rescue denied, bank collapsed");
        }
    }

    state.session.phase = Phase::End;
    state.session.phase_started_at = now_ms;
    state.session.reveal();

    let collapsed = decision == Decision::Collapse;
    for participant in state.participants.values_mut() {
        let forced_loss = match &mut participant.state {
            RoleState::Wholesale(w) => {
                if !w.refused() {
                    w.held_through_resolution = true;
                }
                None
            }
            RoleState::Depositor(d) => {
                if collapsed && !d.withdrew() && participant.balance > protection_limit {
                    Some(participant.balance - protection_limit)
                } else {
                    None
                }
            }
        };
        if let Some(loss) = forced_loss {
            participant.balance = protection_limit;
            participant.record_action(Phase::End, "forced_loss", json!({ "amount": loss }), now_ms);
        }
    }

    Ok(())
}
