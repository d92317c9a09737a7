//! Maturity bucketing
//!
//! Liabilities come straight from the participant population; the asset side
//! is synthesized from total liabilities with fixed balance-sheet ratios.
//!
//! CRITICAL: All money values are i64 (pence)

use crate::models::catalog::{BucketAmounts, MaturityBucket};
use crate::models::metrics::Metrics;
use crate::models::participant::{round_pence, RoleState};
use crate::models::session::Phase;
use crate::models::state::GameState;
use serde::{Deserialize, Serialize};

const MORTGAGE_BOOK_SHARE: f64 = 0.82;
const TRADING_BOOK_SHARE: f64 = 0.06;
const MARKET_HAIRCUT: f64 = 0.82;

/// Retail liabilities by product tenor
///
/// Exited depositors, and unconfirmed depositors during phase 1, hold no
/// bank liability.
pub fn depositor_buckets(state: &GameState) -> BucketAmounts {
    let phase = state.session.phase;
    let mut buckets = BucketAmounts::default();
    for participant in state.participants() {
        let RoleState::Depositor(d) = &participant.state else {
            continue;
        };
        if d.withdrew() || (phase == Phase::Phase1 && !d.confirmed()) {
            continue;
        }
        buckets.add(d.effective_product().bucket(), participant.balance);
    }
    buckets
}

/// Deployed wholesale funding (balance × exposure) by facility tenor
pub fn wholesale_buckets(state: &GameState) -> BucketAmounts {
    let phase = state.session.phase;
    let mut buckets = BucketAmounts::default();
    for participant in state.participants() {
        let RoleState::Wholesale(w) = &participant.state else {
            continue;
        };
        if w.refused() || (phase == Phase::Phase1 && !w.deployed()) {
            continue;
        }
        let deployed = round_pence(participant.balance as f64 * w.exposure_fraction());
        buckets.add(w.effective_facility().bucket(), deployed);
    }
    buckets
}

/// Combined liability side
pub fn combine(a: &BucketAmounts, b: &BucketAmounts) -> BucketAmounts {
    let mut out = *a;
    for bucket in MaturityBucket::ALL {
        out.add(bucket, b.get(bucket));
    }
    out
}

/// Scenario haircut times the market haircut of the stress phases
pub fn stress_haircut(metrics: &Metrics, phase: Phase) -> f64 {
    let market = if phase.is_stress() { MARKET_HAIRCUT } else { 1.0 };
    metrics.scenario.haircut() * market
}

/// Synthetic asset buckets for a mortgage-dominant balance sheet
pub fn asset_buckets(metrics: &Metrics, phase: Phase, total_liabilities: i64) -> BucketAmounts {
    let total = total_liabilities as f64 + 1.0;
    let mortgage = total * MORTGAGE_BOOK_SHARE;
    let trading = total * TRADING_BOOK_SHARE;
    let hqla = metrics.liquidity_buffer.max(0) as f64;
    let prepay = (metrics.assumptions.prepayment_rate_pct / 100.0).clamp(0.02, 0.16);
    let haircut = stress_haircut(metrics, phase);

    let b03 = (hqla * 0.55 + mortgage * (prepay * 0.22) + trading * 0.18) * haircut;
    let b312 = (hqla * 0.18 + mortgage * 0.09 + trading * 0.22) * haircut;
    let b1236 = (hqla * 0.07 + mortgage * 0.24 + trading * 0.16) * haircut;
    let total_assets = (hqla + mortgage + trading) * haircut;
    let other = (total_assets - b03 - b312 - b1236).max(0.0);

    BucketAmounts {
        zero_to_three: round_pence(b03),
        three_to_twelve: round_pence(b312),
        twelve_to_thirty_six: round_pence(b1236),
        other: round_pence(other),
    }
}

/// Short-term funding gap: 0-3m liabilities not covered by 0-3m assets
pub fn short_term_funding_gap(state: &GameState) -> i64 {
    let deposits = depositor_buckets(state);
    let wholesale = wholesale_buckets(state);
    let liabilities = combine(&deposits, &wholesale);
    let assets = asset_buckets(&state.metrics, state.session.phase, liabilities.total());
    (liabilities.zero_to_three - assets.zero_to_three).max(0)
}

/// One row of the maturity gap table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapRow {
    pub bucket: String,
    pub assets: i64,
    pub liabilities: i64,
    pub net_gap: i64,
}

/// Running sum of the net gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeGap {
    pub bucket: String,
    pub value: i64,
}

pub fn gap_table(assets: &BucketAmounts, liabilities: &BucketAmounts) -> Vec<GapRow> {
    MaturityBucket::ALL
        .into_iter()
        .map(|bucket| {
            let a = assets.get(bucket);
            let l = liabilities.get(bucket);
            GapRow {
                bucket: bucket.gap_label().to_string(),
                assets: a,
                liabilities: l,
                net_gap: a - l,
            }
        })
        .collect()
}

pub fn cumulative_gap(rows: &[GapRow]) -> Vec<CumulativeGap> {
    rows.iter()
        .scan(0i64, |running, row| {
            *running += row.net_gap;
            Some(CumulativeGap {
                bucket: row.bucket.clone(),
                value: *running,
            })
        })
        .collect()
}
