//! Macro liquidity model
//!
//! Converts the participant population into systemic metrics. Runs after
//! every accepted action and on every scheduler tick.
//!
//! # Recompute procedure
//!
//! 1. Bucket live liabilities by tenor
//! 2. Synthesize the asset side
//! 3. LCR from short assets over a 30-day stressed outflow
//! 4. NSFR from available over required stable funding
//! 5. Drain the buffer (outside lobby/end) and regain after a rescue
//! 6. Survival horizon
//! 7. Widen the bid-offer spread in the stress phases
//!
//! The terminal collapse rule fires at most once: only a STABLE bank can
//! collapse, and collapsing makes it terminal.

pub mod buckets;

use crate::models::event::FeedKind;
use crate::models::metrics::LiquidityTier;
use crate::models::participant::round_pence;
use crate::models::session::{BankStatus, BoeStatus, Phase};
use crate::models::state::GameState;
use buckets::{asset_buckets, combine, depositor_buckets, wholesale_buckets};

pub use buckets::{cumulative_gap, gap_table, short_term_funding_gap, CumulativeGap, GapRow};

/// Base drain per cycle: £220k
const BASE_DRAIN: f64 = 22_000_000.0;
/// Base drain per cycle in the stress phases: £2.8m
const STRESS_DRAIN: f64 = 280_000_000.0;
/// Extra drain per withdrawn depositor: £800k
const WITHDRAWAL_DRAIN: f64 = 80_000_000.0;
/// Extra drain per refusing lender: £5.2m
const REFUSAL_DRAIN: f64 = 520_000_000.0;
/// Buffer regained per cycle after a rescue: £3.1m
const RESCUE_REGAIN: i64 = 310_000_000;
/// Ceiling for post-rescue regain: £1.4bn
const RESCUE_CEILING: i64 = 140_000_000_000;
/// Floor on normalized daily outflow: £120k
const MIN_DAILY_OUTFLOW: f64 = 12_000_000.0;

const SURVIVAL_ALERT_HOURS: i64 = 48;

/// What a recompute did beyond updating metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeOutcome {
    pub survival_alert: bool,
    pub collapsed: bool,
}

/// Recompute every derived metric from the current population
pub fn recompute(state: &mut GameState, now_ms: u64) -> RecomputeOutcome {
    let phase = state.session.phase;
    let stress_phase = phase.is_stress();

    let deposits = depositor_buckets(state);
    let wholesale = wholesale_buckets(state);
    let liabilities = combine(&deposits, &wholesale);
    let assets = asset_buckets(&state.metrics, phase, liabilities.total());

    let total_retail = deposits.total() as f64;
    let total_wholesale = wholesale.total() as f64;
    let total_liabilities = total_retail + total_wholesale + 1.0;

    let depositors = state.role_counts().depositor;
    let lenders = state.role_counts().wholesale;
    let withdrawals = state.withdrawals();
    let refusals = state.refusals();
    let refusal_rate = if lenders > 0 {
        refusals as f64 / lenders as f64
    } else {
        0.0
    };

    let metrics = &mut state.metrics;

    metrics.wholesale_dependency_pct = (total_wholesale / total_liabilities * 100.0).clamp(8.0, 95.0);
    metrics.funding_concentration_pct =
        (liabilities.zero_to_three as f64 / total_liabilities * 100.0).clamp(8.0, 95.0);

    // LCR
    let panic = metrics.panic_meter as f64;
    let retail_base = if metrics.assumptions.deposit_stability { 0.04 } else { 0.1 };
    let retail_runoff = (retail_base + panic / 1000.0).clamp(0.03, 0.22);
    let funding_base = if metrics.assumptions.funding_cost_stable { 0.25 } else { 0.45 };
    let phase_add = if stress_phase { 0.35 } else { 0.1 };
    let wholesale_runoff = (funding_base + phase_add + refusal_rate * 0.4).clamp(0.2, 1.0);
    let net_outflow_30d = deposits.zero_to_three as f64 * retail_runoff
        + wholesale.zero_to_three as f64 * wholesale_runoff
        + deposits.three_to_twelve as f64 * 0.02
        + 1.0;
    let hqla_for_lcr = (assets.zero_to_three as f64 * 0.9).max(1.0);
    metrics.lcr = (hqla_for_lcr / net_outflow_30d * 100.0).clamp(0.0, 300.0);

    // NSFR
    let asf = deposits.twelve_to_thirty_six as f64 * 0.95
        + deposits.three_to_twelve as f64 * 0.9
        + deposits.zero_to_three as f64 * 0.5
        + wholesale.twelve_to_thirty_six as f64
        + wholesale.three_to_twelve as f64 * 0.5
        + total_liabilities * 0.08;
    let rsf = assets.zero_to_three as f64 * 0.1
        + assets.three_to_twelve as f64 * 0.5
        + assets.twelve_to_thirty_six as f64 * 0.85
        + assets.other as f64;
    metrics.nsfr = (asf / (rsf + 1.0) * 100.0).clamp(0.0, 250.0);

    // Maturity profile
    let cohort = depositors.max(1) as f64;
    let still_locked = depositors.saturating_sub(withdrawals) as f64;
    metrics.contractual_maturity_pct = (still_locked / cohort * 100.0).clamp(0.0, 100.0);
    metrics.behavioral_maturity_pct = (still_locked / cohort * 100.0 - panic).clamp(0.0, 100.0);

    // Buffer drain / regain
    if phase.accepts_actions() {
        let base = if stress_phase { STRESS_DRAIN } else { BASE_DRAIN };
        let drain = (base + withdrawals as f64 * WITHDRAWAL_DRAIN + refusals as f64 * REFUSAL_DRAIN)
            * metrics.scenario.drain_multiplier();
        metrics.debit_buffer(round_pence(drain));
    }
    if metrics.outcomes.boe_injected && state.session.bank_status != BankStatus::Collapsed {
        metrics.liquidity_buffer = (metrics.liquidity_buffer + RESCUE_REGAIN)
            .min(RESCUE_CEILING)
            .max(metrics.liquidity_buffer);
    }

    let daily_outflow = (net_outflow_30d / 30.0).max(MIN_DAILY_OUTFLOW);
    metrics.survival_hours = (metrics.liquidity_buffer as f64 / daily_outflow).floor().max(0.0) as i64;

    if stress_phase {
        let liquidity = &mut metrics.asset_liquidity;
        liquidity.bid_offer_spread_pct =
            (liquidity.bid_offer_spread_pct + 0.02 + refusals as f64 * 0.005).min(4.5);
        liquidity.tier = liquidity
            .tier
            .max(LiquidityTier::from_spread(liquidity.bid_offer_spread_pct));
    }

    metrics.asset_buckets = assets;
    metrics.liability_buckets = liabilities;

    let mut outcome = RecomputeOutcome::default();

    if phase == Phase::Phase3
        && metrics.survival_hours <= SURVIVAL_ALERT_HOURS
        && !state.session.survival_alert_raised
    {
        state.session.survival_alert_raised = true;
        state
            .session
            .feed
            .push(FeedKind::Alert, "Survival horizon dropped below 48 hours.", now_ms);
        outcome.survival_alert = true;
    }

    if state.metrics.liquidity_buffer <= 0 && state.session.bank_status == BankStatus::Stable {
        collapse(state, now_ms);
        outcome.collapsed = true;
    }

    outcome
}

/// Organic collapse: the buffer ran dry before any decision
fn collapse(state: &mut GameState, now_ms: u64) {
    let session = &mut state.session;
    session.bank_status = BankStatus::Collapsed;
    session.boe_status = BoeStatus::Rejected;
    session.phase = Phase::End;
    session.phase_started_at = now_ms;
    session.reveal();
    session.feed.push(
        FeedKind::Critical,
        "Liquidity buffer exhausted. Granite Bank collapsed.",
        now_ms,
    );
    tracing::warn!(ticks = state.ticks, "liquidity buffer exhausted, bank collapsed");
}
