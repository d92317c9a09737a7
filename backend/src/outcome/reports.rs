//! Classroom report and cohort panels
//!
//! Aggregates are tallies of the per-participant derivations; the retail
//! report maps [`depositor_outcome`] over every depositor.

use crate::models::catalog::{Facility, Product, Role};
use crate::models::participant::{Participant, RoleState, WHOLESALE_BASE_BALANCE};
use crate::models::session::{BankStatus, Phase};
use crate::models::state::GameState;
use crate::outcome::final_window::{depositor_outcome, gross_exposure};
use serde::Serialize;
use std::collections::BTreeMap;

/// Loss above which a depositor counts as a large loss: £10,000
pub const LARGE_LOSS_THRESHOLD: i64 = 1_000_000;

/// Refusal rate at which the funding base is considered failed
pub const FAILURE_THRESHOLD_PCT: f64 = 50.0;

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetailReport {
    pub total_depositors: usize,
    pub fully_protected: usize,
    pub suffered_haircut: usize,
    pub lost_over_10k: usize,
    pub bank_status_text: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WholesaleReport {
    pub total_wholesale: usize,
    pub refused_count: usize,
    pub refusal_rate_pct: f64,
    /// Exposure pulled by refusing lenders (pence)
    pub liquidity_drained: i64,
    pub status_text: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomReport {
    pub retail: RetailReport,
    pub wholesale: WholesaleReport,
}

pub fn retail_report(state: &GameState, protection_limit: i64) -> RetailReport {
    let mut report = RetailReport {
        total_depositors: 0,
        fully_protected: 0,
        suffered_haircut: 0,
        lost_over_10k: 0,
        bank_status_text: if state.session.bank_status == BankStatus::Rescued {
            "NATIONALIZED / STABILIZED"
        } else {
            "NATIONALIZED / COLLAPSED"
        },
    };
    for p in state.participants() {
        let Some(d) = p.depositor() else { continue };
        let outcome = depositor_outcome(p, d, protection_limit);
        report.total_depositors += 1;
        if outcome.loss <= 0 {
            report.fully_protected += 1;
        } else {
            report.suffered_haircut += 1;
        }
        if outcome.loss > LARGE_LOSS_THRESHOLD {
            report.lost_over_10k += 1;
        }
    }
    report
}

pub fn wholesale_report(state: &GameState) -> WholesaleReport {
    let mut total = 0;
    let mut refused = 0;
    let mut drained = 0i64;
    for p in state.participants() {
        let Some(w) = p.wholesale() else { continue };
        total += 1;
        if w.refused() {
            refused += 1;
            drained += gross_exposure(p, w);
        }
    }
    WholesaleReport {
        total_wholesale: total,
        refused_count: refused,
        refusal_rate_pct: pct(refused, total),
        liquidity_drained: drained,
        status_text: if state.session.bank_status == BankStatus::Rescued {
            "STABILIZED BY PUBLIC SUPPORT"
        } else {
            "NATIONALIZED AFTER FUNDING RUN"
        },
    }
}

pub fn classroom_report(state: &GameState, protection_limit: i64) -> ClassroomReport {
    ClassroomReport {
        retail: retail_report(state, protection_limit),
        wholesale: wholesale_report(state),
    }
}

// ============================================================================
// Cohort panels
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase1Retail {
    pub confirmed_count: usize,
    pub total_count: usize,
    pub by_product: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WholesaleDeployment {
    pub deployed_count: usize,
    pub total_count: usize,
    pub by_facility: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase2Wholesale {
    pub live_count: usize,
    pub total_count: usize,
    pub base_count: usize,
    pub demanding_count: usize,
    pub reduced_count: usize,
    pub added_count: usize,
    pub rollover_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase2Depositor {
    pub upgraded: usize,
    pub added_more: usize,
    pub exited: usize,
    pub hedged: usize,
    pub confidence_pct: f64,
}

/// How a lender behaved in phase 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase3Stance {
    Rolling,
    Hesitating,
    Refused,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase3Wholesale {
    pub total_count: usize,
    pub rolling: usize,
    pub hesitating: usize,
    pub refused: usize,
    pub refusal_rate_pct: f64,
    pub failure_threshold_pct: f64,
}

/// Every cohort panel shown on the facilitator screen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortPanels {
    pub phase1_retail: Phase1Retail,
    pub wholesale_deployment: WholesaleDeployment,
    pub phase2_wholesale: Phase2Wholesale,
    pub phase2_depositor: Phase2Depositor,
    pub phase3_wholesale: Phase3Wholesale,
    pub phase4_retail_report: RetailReport,
    pub phase4_wholesale_report: WholesaleReport,
}

pub fn phase1_retail(state: &GameState) -> Phase1Retail {
    let mut by_product: BTreeMap<&'static str, usize> = Product::ALL
        .into_iter()
        .filter(|p| p.selectable_in_setup())
        .map(|p| (p.id(), 0))
        .collect();
    let mut confirmed = 0;
    let mut total = 0;
    for p in state.participants() {
        let Some(d) = p.depositor() else { continue };
        total += 1;
        if d.confirmed() {
            confirmed += 1;
            if let Some(product) = d.product {
                if let Some(count) = by_product.get_mut(product.id()) {
                    *count += 1;
                }
            }
        }
    }
    Phase1Retail {
        confirmed_count: confirmed,
        total_count: total,
        by_product,
    }
}

pub fn wholesale_deployment(state: &GameState) -> WholesaleDeployment {
    let mut by_facility: BTreeMap<&'static str, usize> =
        Facility::ALL.into_iter().map(|f| (f.id(), 0)).collect();
    let mut deployed = 0;
    let mut total = 0;
    for p in state.participants() {
        let Some(w) = p.wholesale() else { continue };
        total += 1;
        if w.deployed() {
            deployed += 1;
            if let Some(facility) = w.facility {
                *by_facility.entry(facility.id()).or_default() += 1;
            }
        }
    }
    WholesaleDeployment {
        deployed_count: deployed,
        total_count: total,
        by_facility,
    }
}

pub fn phase2_wholesale(state: &GameState) -> Phase2Wholesale {
    let lenders: Vec<&Participant> = state.by_role(Role::Wholesale).collect();
    let mut live = 0;
    let mut demanding = 0;
    let mut reduced = 0;
    let mut added = 0;
    for p in &lenders {
        let RoleState::Wholesale(w) = &p.state else { continue };
        if w.refused() {
            continue;
        }
        live += 1;
        if w.spread_bps_override > 0 {
            demanding += 1;
        }
        if w.exposure_pct < 100 {
            reduced += 1;
        }
        if p.principal > WHOLESALE_BASE_BALANCE {
            added += 1;
        }
    }
    Phase2Wholesale {
        live_count: live,
        total_count: lenders.len(),
        base_count: live - demanding,
        demanding_count: demanding,
        reduced_count: reduced,
        added_count: added,
        rollover_rate_pct: if lenders.is_empty() {
            100.0
        } else {
            pct(live, lenders.len())
        },
    }
}

pub fn phase2_depositor(state: &GameState) -> Phase2Depositor {
    let mut panel = Phase2Depositor {
        upgraded: 0,
        added_more: 0,
        exited: 0,
        hedged: 0,
        confidence_pct: (100.0 - state.metrics.panic_meter as f64).max(0.0),
    };
    let records = state
        .by_role(Role::Depositor)
        .flat_map(|p| p.actions.iter())
        .filter(|record| record.phase == Phase::Phase2);
    for record in records {
        match record.action.as_str() {
            "upgrade_premier" => panel.upgraded += 1,
            "add_money" => panel.added_more += 1,
            "early_exit" => panel.exited += 1,
            "buy_hedge" => panel.hedged += 1,
            _ => {}
        }
    }
    panel
}

/// Refused, else the latest phase-3 action decides rolling vs hesitating
pub fn phase3_stance(participant: &Participant) -> Option<Phase3Stance> {
    let w = participant.wholesale()?;
    if w.refused() {
        return Some(Phase3Stance::Refused);
    }
    let latest = participant
        .actions
        .iter()
        .find(|record| record.phase == Phase::Phase3);
    let rolling = matches!(
        latest.map(|r| r.action.as_str()),
        Some("rollover" | "punitive_spread")
    );
    Some(if rolling {
        Phase3Stance::Rolling
    } else {
        Phase3Stance::Hesitating
    })
}

pub fn phase3_wholesale(state: &GameState) -> Phase3Wholesale {
    let mut panel = Phase3Wholesale {
        total_count: 0,
        rolling: 0,
        hesitating: 0,
        refused: 0,
        refusal_rate_pct: 0.0,
        failure_threshold_pct: FAILURE_THRESHOLD_PCT,
    };
    for stance in state.participants().filter_map(phase3_stance) {
        panel.total_count += 1;
        match stance {
            Phase3Stance::Rolling => panel.rolling += 1,
            Phase3Stance::Hesitating => panel.hesitating += 1,
            Phase3Stance::Refused => panel.refused += 1,
        }
    }
    panel.refusal_rate_pct = pct(panel.refused, panel.total_count);
    panel
}

pub fn cohort_panels(state: &GameState, protection_limit: i64) -> CohortPanels {
    CohortPanels {
        phase1_retail: phase1_retail(state),
        wholesale_deployment: wholesale_deployment(state),
        phase2_wholesale: phase2_wholesale(state),
        phase2_depositor: phase2_depositor(state),
        phase3_wholesale: phase3_wholesale(state),
        phase4_retail_report: retail_report(state, protection_limit),
        phase4_wholesale_report: wholesale_report(state),
    }
}
