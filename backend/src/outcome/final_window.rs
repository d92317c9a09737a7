//! Phase-4 individual outcome reports
//!
//! Depositors fall into exactly one of four categories, checked in order:
//!
//! 1. `secured_exit`: already exited in phases 2-4
//! 2. `cynic`: switched to instant access and prioritized the protected amount
//! 3. `panic_runner`: still queued for the full balance
//! 4. `bag_holder`: everything else, frozen
//!
//! Lenders are `raider` (refused), `greedy` (held, bank not rescued) or
//! `supported_hold` (held, bank rescued).

use crate::actions::format_amount;
use crate::models::metrics::Metrics;
use crate::models::participant::{
    round_pence, DepositorState, Participant, QueueMode, QueueState, WholesaleState,
};
use crate::models::session::{BankStatus, Phase, Session};
use serde::{Deserialize, Serialize};

/// Offer rate premium over LIBOR used for missed-yield estimates
pub const OFFER_PREMIUM_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositorOutcomeKind {
    SecuredExit,
    Cynic,
    PanicRunner,
    BagHolder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositorOutcome {
    #[serde(rename = "type")]
    pub kind: DepositorOutcomeKind,
    pub status: &'static str,
    pub account_type: String,
    pub total_balance: i64,
    pub guaranteed: i64,
    pub loss: i64,
    pub immediate_cash: i64,
    pub timeline_primary: String,
    pub timeline_secondary: Option<String>,
    pub lesson: &'static str,
    pub label: &'static str,
}

pub fn depositor_outcome(
    participant: &Participant,
    d: &DepositorState,
    protection_limit: i64,
) -> DepositorOutcome {
    let balance = participant.balance.max(0);
    let guaranteed = balance.min(protection_limit);
    let unprotected = (balance - protection_limit).max(0);

    let cleared = |kind: DepositorOutcomeKind,
                   account_type: &str,
                   lesson: &'static str| DepositorOutcome {
        kind,
        status: "CLEARED",
        account_type: account_type.to_string(),
        total_balance: balance,
        guaranteed,
        loss: 0,
        immediate_cash: balance,
        timeline_primary: format!("{} available immediately", format_amount(balance)),
        timeline_secondary: None,
        lesson,
        label: "THE SURVIVOR",
    };

    if matches!(
        d.withdrawn_at(),
        Some(Phase::Phase2 | Phase::Phase3 | Phase::Phase4)
    ) {
        return cleared(
            DepositorOutcomeKind::SecuredExit,
            "Exited Position",
            "Liquidity decisions were executed before final halt.",
        );
    }

    if d.switched_to_current && d.queue.mode == QueueMode::Protected {
        return cleared(
            DepositorOutcomeKind::Cynic,
            "Instant Access",
            "You prioritized liquidity over yield when stress escalated.",
        );
    }

    let delayed = format!("{} in 7-10 days", format_amount(guaranteed));
    if d.queue.state == QueueState::Processing && d.queue.mode == QueueMode::Full {
        return DepositorOutcome {
            kind: DepositorOutcomeKind::PanicRunner,
            status: "TRANSACTION FAILED",
            account_type: "Premier Bond".to_string(),
            total_balance: balance,
            guaranteed,
            loss: unprotected,
            immediate_cash: guaranteed,
            timeline_primary: delayed,
            timeline_secondary: Some(format!(
                "{} pending administration",
                format_amount(unprotected)
            )),
            lesson: "Operational risk: queue congestion prevented full execution.",
            label: "TOO LATE",
        };
    }

    DepositorOutcome {
        kind: DepositorOutcomeKind::BagHolder,
        status: "FROZEN",
        account_type: d
            .product
            .map(|p| p.label())
            .unwrap_or("Premier Bond")
            .to_string(),
        total_balance: balance,
        guaranteed,
        loss: unprotected,
        immediate_cash: guaranteed,
        timeline_primary: delayed,
        timeline_secondary: Some(format!(
            "{} likely unrecovered",
            format_amount(unprotected)
        )),
        lesson: "Contractual maturity did not protect against a behavioral run.",
        label: "THE VICTIM",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WholesaleOutcomeKind {
    Raider,
    Greedy,
    SupportedHold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WholesaleOutcome {
    #[serde(rename = "type")]
    pub kind: WholesaleOutcomeKind,
    pub status: &'static str,
    pub action: &'static str,
    pub exposure: i64,
    pub preserved_principal: i64,
    pub missed_yield: i64,
    pub recovery_rate: &'static str,
    pub timeline: &'static str,
    pub reputation: &'static str,
    pub final_label: &'static str,
}

/// Principal currently lent to the bank
pub fn gross_exposure(participant: &Participant, w: &WholesaleState) -> i64 {
    round_pence(participant.principal as f64 * w.exposure_fraction())
}

pub fn wholesale_outcome(
    participant: &Participant,
    w: &WholesaleState,
    session: &Session,
    metrics: &Metrics,
) -> WholesaleOutcome {
    let exposure = gross_exposure(participant, w);
    let defaulted = session.bank_status != BankStatus::Rescued;

    if w.refused() {
        let rate = metrics.libor_pct.max(0.0) + OFFER_PREMIUM_PCT;
        return WholesaleOutcome {
            kind: WholesaleOutcomeKind::Raider,
            status: if defaulted {
                "DEFAULTED / NATIONALIZED"
            } else {
                "STABILIZED / GUARANTEED"
            },
            action: "RECALLED FUNDS",
            exposure: 0,
            preserved_principal: exposure,
            missed_yield: round_pence(exposure as f64 * rate / 100.0 / 365.0),
            recovery_rate: "N/A",
            timeline: "Immediate",
            reputation: "RUTHLESS BUT PRUDENT",
            final_label: "BONUS MAXIMIZED",
        };
    }

    if defaulted {
        return WholesaleOutcome {
            kind: WholesaleOutcomeKind::Greedy,
            status: "DEFAULTED / NATIONALIZED",
            action: "ROLLED OVER",
            exposure,
            preserved_principal: 0,
            missed_yield: 0,
            recovery_rate: "80-100%",
            timeline: "6-12 months",
            reputation: "BAG HOLDER",
            final_label: "RISK NEGLIGENCE",
        };
    }

    WholesaleOutcome {
        kind: WholesaleOutcomeKind::SupportedHold,
        status: "RESCUED / BACKSTOPPED",
        action: "MAINTAINED EXPOSURE",
        exposure,
        preserved_principal: exposure,
        missed_yield: 0,
        recovery_rate: "100%",
        timeline: "Normal settlement",
        reputation: "HIGH RISK TOLERANCE",
        final_label: "SURVIVED WITH SUPPORT",
    }
}
