//! Wholesale lender rule set

use crate::actions::{Action, ActionContext};
use crate::error::ActionError;
use crate::models::catalog::{Facility, Role};
use crate::models::event::FeedKind;
use crate::models::participant::{round_pence, CommitKind, Participant, RoleState, WholesaleState};
use crate::models::session::Phase;
use serde_json::json;

/// Largest single capital top-up: £500m
const ADD_MORE_CAP: i64 = 50_000_000_000;
const MIN_EXPOSURE_PCT: u32 = 10;
const MIN_PARTIAL_ROLLOVER_PCT: u32 = 20;
const PARTIAL_ROLLOVER_CUT: u32 = 25;
const PUNITIVE_SPREAD_BPS: u32 = 200;

fn state_mut(participant: &mut Participant) -> Result<&mut WholesaleState, ActionError> {
    match &mut participant.state {
        RoleState::Wholesale(w) => Ok(w),
        RoleState::Depositor(_) => Err(ActionError::NotAvailable {
            role: Role::Depositor,
        }),
    }
}

fn not_available() -> ActionError {
    ActionError::NotAvailable {
        role: Role::Wholesale,
    }
}

/// Commit the lender's phase-1 facility
///
/// Mirrors [`crate::actions::finalize_depositor_choice`] with the spread
/// cycle in place of the interest cycle. Balance is not re-based on the
/// first deployment.
pub fn finalize_wholesale_deployment(
    participant: &mut Participant,
    fallback: Option<Facility>,
    now_ms: u64,
) -> Option<Facility> {
    let balance = participant.balance;
    let RoleState::Wholesale(w) = &mut participant.state else {
        return None;
    };
    let (facility, kind) = w.selection.commit(fallback)?;
    w.facility = Some(facility);
    match kind {
        CommitKind::First => w.spread.restart(balance, now_ms),
        CommitKind::Change => {
            w.spread.bank_and_restart(balance, now_ms);
        }
    }
    Some(facility)
}

pub(crate) fn apply(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match ctx.phase {
        Phase::Phase1 => phase1(ctx, participant, action),
        Phase::Phase2 => phase2(ctx, participant, action),
        Phase::Phase3 => phase3(ctx, participant, action),
        Phase::Phase4 => phase4(ctx, participant, action),
        Phase::Lobby | Phase::End => Err(ActionError::PhaseClosed),
    }
}

fn phase1(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match action {
        Action::SelectFacility(facility) => {
            state_mut(participant)?.selection.select(facility);
            ctx.record(participant, &action, json!({ "facility": facility.id() }));
            ctx.feed.push(
                FeedKind::Info,
                format!("{} shortlisted {}.", participant.name, facility.label()),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::Deploy | Action::Maintain => {
            let facility = finalize_wholesale_deployment(participant, None, ctx.now_ms)
                .ok_or_else(|| ActionError::rejected("Choose a facility first."))?;
            ctx.record(participant, &action, json!({ "facility": facility.id() }));
            ctx.feed.push(
                FeedKind::Info,
                format!("{} deployed via {}.", participant.name, facility.label()),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::ChangeCancel => {
            state_mut(participant)?.selection.cancel_change();
            ctx.record(participant, &action, json!({}));
            Ok(())
        }
        _ => Err(not_available()),
    }
}

fn phase2(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match action {
        Action::Maintain => {
            ctx.record(participant, &action, json!({}));
            Ok(())
        }
        Action::DemandSpread(bps) => {
            state_mut(participant)?.spread_bps_override = bps;
            ctx.metrics.bump_libor(bps as f64 / 600.0);
            ctx.record(participant, &action, json!({ "bps": bps }));
            ctx.feed.push(
                FeedKind::Alert,
                format!("{} demanded +{}bps spread.", participant.name, bps),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::ReduceExposure(pct) => {
            let principal = participant.principal;
            let w = state_mut(participant)?;
            w.exposure_pct = w.exposure_pct.saturating_sub(pct).max(MIN_EXPOSURE_PCT);
            ctx.metrics
                .debit_buffer(round_pence(principal as f64 * (pct as f64 / 100.0) * 0.1));
            ctx.record(participant, &action, json!({ "pct": pct }));
            ctx.feed.push(
                FeedKind::Alert,
                format!("{} reduced exposure by {}%.", participant.name, pct),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::AddMore(amount) => {
            let amount = amount.clamp(0, ADD_MORE_CAP);
            if amount <= 0 {
                return Err(ActionError::rejected("Amount must be positive"));
            }
            participant.balance += amount;
            participant.principal += amount;
            ctx.record(participant, &action, json!({ "amount": amount }));
            let millions = (amount as f64 / 1_000_000.0).round() / 100.0;
            ctx.feed.push(
                FeedKind::Info,
                format!("{} added {}m capital.", participant.name, millions),
                ctx.now_ms,
            );
            Ok(())
        }
        _ => Err(not_available()),
    }
}

fn phase3(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match action {
        Action::Rollover => {
            ctx.record(participant, &action, json!({}));
            Ok(())
        }
        Action::PunitiveSpread => {
            state_mut(participant)?.spread_bps_override = PUNITIVE_SPREAD_BPS;
            ctx.metrics.bump_libor(0.25);
            ctx.record(participant, &action, json!({ "bps": PUNITIVE_SPREAD_BPS }));
            ctx.feed.push(
                FeedKind::Alert,
                format!("{} demanded punitive spread +200bps.", participant.name),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::PartialRollover => {
            let w = state_mut(participant)?;
            let current = w.exposure_pct;
            // A lender already below the floor keeps their exposure
            w.exposure_pct = current
                .saturating_sub(PARTIAL_ROLLOVER_CUT)
                .max(MIN_PARTIAL_ROLLOVER_PCT)
                .min(current);
            ctx.record(participant, &action, json!({ "pct": PARTIAL_ROLLOVER_CUT }));
            Ok(())
        }
        Action::RefuseRollover => {
            state_mut(participant)?.refused_at = Some(Phase::Phase3);
            ctx.record(participant, &action, json!({}));
            ctx.feed.push(
                FeedKind::Critical,
                format!("{} refused rollover.", participant.name),
                ctx.now_ms,
            );
            Ok(())
        }
        _ => Err(not_available()),
    }
}

fn phase4(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match action {
        Action::FinalHold => {
            state_mut(participant)?.held_through_resolution = true;
            ctx.record(participant, &action, json!({}));
            Ok(())
        }
        Action::FinalRefuse => {
            state_mut(participant)?.refused_at = Some(Phase::Phase4);
            ctx.record(participant, &action, json!({}));
            ctx.feed.push(
                FeedKind::Critical,
                format!("{} refused in final window.", participant.name),
                ctx.now_ms,
            );
            Ok(())
        }
        _ => Err(not_available()),
    }
}
