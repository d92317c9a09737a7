//! Read-only projections
//!
//! A [`Snapshot`] is what every screen renders: the session header, the
//! metrics with gap tables and cohort panels, the leaderboard, the recent
//! feed and, when a participant is asking, their own view. Everything is
//! derived from [`GameState`] at call time.

use crate::config::SimulationConfig;
use crate::core::time::elapsed_secs;
use crate::events::ScenarioEventKey;
use crate::liquidity::{cumulative_gap, gap_table, CumulativeGap, GapRow};
use crate::models::catalog::{Facility, HedgeLevel, Product, Role};
use crate::models::event::FeedEvent;
use crate::models::metrics::Metrics;
use crate::models::participant::{
    round_pence, ActionRecord, DepositorExit, DepositorState, Participant, RoleState,
    WholesaleState, WithdrawalQueue, DEPOSITOR_BASE_BALANCE, SETUP_TOP_UP_CAP,
};
use crate::models::session::{BankStatus, BoeStatus, Phase, Session};
use crate::models::state::{GameState, RoleCounts};
use crate::outcome::final_window::gross_exposure;
use crate::outcome::{
    cohort_panels, depositor_outcome, label, leaderboard, rank_of, score, wholesale_outcome,
    CohortPanels, DepositorOutcome, Label, LeaderboardRow, WholesaleOutcome, OFFER_PREMIUM_PCT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Early-exit penalty shown in phase 2, percent of principal
pub const EARLY_EXIT_PENALTY_PCT: f64 = 40.0;
/// Fee for switching to instant access in phase 3, percent of balance
pub const SWITCH_FEE_PCT: f64 = 15.0;
/// Seconds a depositor has to decide once phase 3 opens
pub const PHASE3_DECISION_SECS: u64 = 300;
/// Facility spread assumed for previews before a facility is picked
const DEFAULT_PREVIEW_SPREAD_BPS: u32 = 8;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub code: String,
    pub phase: Phase,
    pub phase_started_at: u64,
    pub join_token_expires_at: u64,
    pub boe_status: BoeStatus,
    pub bank_status: BankStatus,
    pub active_events: Vec<ScenarioEventKey>,
    pub event_triggered_at: BTreeMap<String, u64>,
    pub reveal_names: bool,
}

impl SessionView {
    fn from_session(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            code: session.join.code.clone(),
            phase: session.phase,
            phase_started_at: session.phase_started_at,
            join_token_expires_at: session.join.expires_at,
            boe_status: session.boe_status,
            bank_status: session.bank_status,
            active_events: session.active_events.clone(),
            event_triggered_at: session.event_triggered_at.clone(),
            reveal_names: session.reveal_names,
        }
    }
}

/// Metrics plus everything derived from them for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsView {
    #[serde(flatten)]
    pub metrics: Metrics,
    pub wholesale_refusals: usize,
    pub depositor_withdrawals: usize,
    pub gap_table: Vec<GapRow>,
    pub cumulative_gap: Vec<CumulativeGap>,
    #[serde(flatten)]
    pub panels: CohortPanels,
}

/// Emotional stage of phase 3, driven by time since the phase opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase3Stage {
    Denial,
    Realization,
    Panic,
    Bridge,
}

impl Phase3Stage {
    pub fn at(elapsed_secs: u64) -> Self {
        match elapsed_secs {
            0..=119 => Phase3Stage::Denial,
            120..=299 => Phase3Stage::Realization,
            300..=419 => Phase3Stage::Panic,
            _ => Phase3Stage::Bridge,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositorView {
    pub product: Option<Product>,
    pub product_label: &'static str,
    pub product_rate: Option<f64>,
    pub hedge: Option<HedgeLevel>,
    pub withdrew: bool,

    // Phase 1
    pub confirmed: bool,
    pub draft_product: Option<Product>,
    pub draft_product_label: Option<&'static str>,
    pub pending_product: Option<Product>,
    pub draft_top_up: i64,
    pub preview_total: i64,
    pub preview_rate: f64,
    pub banked_interest: i64,
    pub ticking_interest: i64,

    // Phase 2
    pub phase2_banked_interest: i64,
    pub premier_peers: usize,
    pub can_upgrade: bool,
    pub exit_penalty_pct: f64,
    pub exit_loss_estimate: i64,
    pub exit_payout_estimate: i64,
    pub exit: Option<DepositorExit>,

    // Phase 3
    pub phase3_stage: Option<Phase3Stage>,
    pub switch_fee_pct: f64,
    pub switch_fee_amount: i64,
    pub switch_payout: i64,
    pub switched_to_current: bool,
    pub queue: WithdrawalQueue,
    pub decision_seconds_left: u64,

    // Phase 4
    pub outcome: DepositorOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WholesaleView {
    pub facility: Option<Facility>,
    pub facility_label: &'static str,
    pub spread_bps_override: u32,
    pub exposure_pct: u32,
    pub refused: bool,
    pub refused_at: Option<Phase>,

    // Phase 1
    pub deployed: bool,
    pub draft_facility: Option<Facility>,
    pub draft_facility_label: Option<&'static str>,
    pub pending_facility: Option<Facility>,
    pub preview_rate: f64,
    pub daily_preview: i64,
    pub banked_spread: i64,
    pub ticking_spread: i64,

    // Phase 3
    pub live_exposure: i64,
    pub offer_rate: f64,
    pub one_day_offer_profit: i64,

    // Phase 4
    pub outcome: WholesaleOutcome,
}

/// A participant's own screen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub balance: i64,
    pub principal: i64,
    pub unprotected_amount: i64,
    pub protection_limit: i64,
    pub total_interest_accrued: i64,
    pub phase_elapsed_secs: u64,
    pub label: Label,
    pub score: i64,
    /// 1-based leaderboard position
    pub rank: Option<usize>,
    pub recent_actions: Vec<ActionRecord>,
    pub can_act: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depositor: Option<DepositorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wholesale: Option<WholesaleView>,
}

/// Complete read model for one request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub server_time: u64,
    pub session: SessionView,
    pub counts: RoleCounts,
    pub metrics: MetricsView,
    pub leaderboard: Vec<LeaderboardRow>,
    pub event_feed: Vec<FeedEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<ParticipantView>,
}

/// Build the snapshot, with `viewer`'s own view when given
pub fn build_snapshot(
    state: &GameState,
    config: &SimulationConfig,
    viewer: Option<&Participant>,
    now_ms: u64,
) -> Snapshot {
    let limit = config.protection_limit;
    let gaps = gap_table(&state.metrics.asset_buckets, &state.metrics.liability_buckets);
    let board = leaderboard(state, limit);

    let player = viewer.map(|p| participant_view(state, config, p, &board, now_ms));

    Snapshot {
        server_time: now_ms,
        session: SessionView::from_session(&state.session),
        counts: state.role_counts(),
        metrics: MetricsView {
            metrics: state.metrics.clone(),
            wholesale_refusals: state.refusals(),
            depositor_withdrawals: state.withdrawals(),
            cumulative_gap: cumulative_gap(&gaps),
            gap_table: gaps,
            panels: cohort_panels(state, limit),
        },
        leaderboard: board.into_iter().take(config.leaderboard_limit).collect(),
        event_feed: state.session.feed.recent(config.snapshot_feed_len),
        player,
    }
}

fn participant_view(
    state: &GameState,
    config: &SimulationConfig,
    participant: &Participant,
    board: &[LeaderboardRow],
    now_ms: u64,
) -> ParticipantView {
    let session = &state.session;
    let limit = config.protection_limit;
    let elapsed = elapsed_secs(session.phase_started_at, now_ms);

    let (depositor, wholesale, total_interest_accrued) = match &participant.state {
        RoleState::Depositor(d) => {
            let accrued = match d.exit {
                Some(exit) => exit.interest,
                None => (participant.balance - participant.principal).max(0),
            };
            let view = depositor_view(state, participant, d, limit, elapsed);
            (Some(view), None, accrued)
        }
        RoleState::Wholesale(w) => {
            let view = wholesale_view(state, participant, w);
            let accrued = (participant.balance - participant.principal).max(0);
            (None, Some(view), accrued)
        }
    };

    ParticipantView {
        id: participant.id.clone(),
        name: participant.name.clone(),
        role: participant.role(),
        balance: participant.balance,
        principal: participant.principal,
        unprotected_amount: (participant.balance - limit).max(0),
        protection_limit: limit,
        total_interest_accrued,
        phase_elapsed_secs: elapsed,
        label: label(participant, session, limit),
        score: score(participant, session, limit),
        rank: rank_of(board, &participant.id),
        recent_actions: participant.actions.recent(config.recent_actions_len),
        can_act: session.phase.accepts_actions() && !participant.is_spectator(),
        depositor,
        wholesale,
    }
}

fn depositor_view(
    state: &GameState,
    participant: &Participant,
    d: &DepositorState,
    limit: i64,
    elapsed: u64,
) -> DepositorView {
    let balance = participant.balance;
    let principal = participant.principal;
    let draft = d.selection.candidate().or(d.product);
    let current = d.product;
    let draft_top_up = d.draft_top_up.clamp(0, SETUP_TOP_UP_CAP);

    let exit_loss_estimate = round_pence(principal as f64 * EARLY_EXIT_PENALTY_PCT / 100.0);
    let switch_fee_amount = round_pence(balance as f64 * SWITCH_FEE_PCT / 100.0);
    let premier_peers = state
        .participants()
        .filter_map(|p| p.depositor())
        .filter(|other| !other.withdrew() && other.product == Some(Product::Premier142))
        .count();
    let in_phase3 = state.session.phase == Phase::Phase3;

    DepositorView {
        product: current,
        product_label: current.map(Product::label).unwrap_or("Not selected"),
        product_rate: current.map(Product::rate_pct),
        hedge: d.hedge,
        withdrew: d.withdrew(),

        confirmed: d.confirmed(),
        draft_product: draft,
        draft_product_label: draft.map(Product::label),
        pending_product: d.selection.pending(),
        draft_top_up,
        preview_total: if d.confirmed() {
            principal
        } else {
            DEPOSITOR_BASE_BALANCE + draft_top_up
        },
        preview_rate: draft.map(Product::rate_pct).unwrap_or(0.0),
        banked_interest: d.interest.banked,
        ticking_interest: d.interest.ticking(balance),

        phase2_banked_interest: d.phase2_banked_interest,
        premier_peers,
        can_upgrade: !d.withdrew() && d.product != Some(Product::Premier142),
        exit_penalty_pct: EARLY_EXIT_PENALTY_PCT,
        exit_loss_estimate,
        exit_payout_estimate: (balance - exit_loss_estimate).max(0),
        exit: d.exit,

        phase3_stage: in_phase3.then(|| Phase3Stage::at(elapsed)),
        switch_fee_pct: SWITCH_FEE_PCT,
        switch_fee_amount,
        switch_payout: balance - switch_fee_amount,
        switched_to_current: d.switched_to_current,
        queue: d.queue.clone(),
        decision_seconds_left: PHASE3_DECISION_SECS.saturating_sub(elapsed),

        outcome: depositor_outcome(participant, d, limit),
    }
}

fn wholesale_view(state: &GameState, participant: &Participant, w: &WholesaleState) -> WholesaleView {
    let libor = state.metrics.libor_pct;
    let draft = w.selection.candidate().or(w.facility);
    let spread_bps = draft
        .map(Facility::spread_bps)
        .unwrap_or(DEFAULT_PREVIEW_SPREAD_BPS);
    let preview_rate = libor + spread_bps as f64 / 100.0;
    let live_exposure = gross_exposure(participant, w);
    let offer_rate = ((libor + OFFER_PREMIUM_PCT) * 100.0).round() / 100.0;

    WholesaleView {
        facility: w.facility,
        facility_label: w.facility.map(Facility::label).unwrap_or("Not selected"),
        spread_bps_override: w.spread_bps_override,
        exposure_pct: w.exposure_pct,
        refused: w.refused(),
        refused_at: w.refused_at,

        deployed: w.deployed(),
        draft_facility: draft,
        draft_facility_label: draft.map(Facility::label),
        pending_facility: w.selection.pending(),
        preview_rate,
        daily_preview: round_pence(participant.principal as f64 * preview_rate / 100.0 / 365.0),
        banked_spread: w.spread.banked,
        ticking_spread: w.spread.ticking(participant.balance),

        live_exposure,
        offer_rate,
        one_day_offer_profit: round_pence(live_exposure as f64 * offer_rate / 100.0 / 365.0),

        outcome: wholesale_outcome(participant, w, &state.session, &state.metrics),
    }
}
