//! Scenario event definitions
//!
//! Scenario events are facilitator-triggered shocks to the external
//! environment. Each key maps to a data record: the phases it may fire in,
//! the message broadcast to the room, and a pure transform over [`Metrics`].
//!
//! # Design Principles
//!
//! 1. **One-shot**: a key fires at most once per session
//! 2. **Phase-gated**: firing outside the allowed phases is rejected
//! 3. **Pure transforms**: `apply` only touches metrics, so each record can be
//!    tested in isolation

use crate::models::metrics::{Metrics, Scenario};
use crate::models::session::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scenario event key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScenarioEventKey {
    #[serde(rename = "LIBOR_RISE")]
    LiborRise,
    #[serde(rename = "PREPAY_SLOW")]
    PrepaySlow,
    #[serde(rename = "COMPETITOR_15")]
    Competitor15,
    #[serde(rename = "BBC_LEAK")]
    BbcLeak,
}

/// Data record describing one scenario event
#[derive(Debug, Clone, Copy)]
pub struct EventDefinition {
    pub key: ScenarioEventKey,
    pub allowed_phases: &'static [Phase],
    pub message: &'static str,
    pub apply: fn(&mut Metrics),
}

fn libor_rise(metrics: &mut Metrics) {
    metrics.bump_libor(0.85);
    metrics.assumptions.funding_cost_stable = false;
    metrics.scenario = Scenario::ModerateStress;
}

fn prepay_slow(metrics: &mut Metrics) {
    metrics.assumptions.prepayment_rate_pct = 3.0;
    metrics.scenario = Scenario::ModerateStress;
    metrics.debit_buffer(3_500_000_000); // £35m
}

fn competitor_15(metrics: &mut Metrics) {
    metrics.assumptions.deposit_stability = false;
    metrics.scenario = Scenario::SevereStress;
    metrics.raise_panic(14, 70);
}

fn bbc_leak(metrics: &mut Metrics) {
    metrics.scenario = Scenario::SevereStress;
    metrics.raise_panic(25, 90);
}

/// The full event table
pub const EVENT_TABLE: [EventDefinition; 4] = [
    EventDefinition {
        key: ScenarioEventKey::LiborRise,
        allowed_phases: &[Phase::Phase2],
        message: "LIBOR rising globally. Funding cost assumptions broken.",
        apply: libor_rise,
    },
    EventDefinition {
        key: ScenarioEventKey::PrepaySlow,
        allowed_phases: &[Phase::Phase2],
        message: "US mortgage prepayments slowed: expected inflows not arriving.",
        apply: prepay_slow,
    },
    EventDefinition {
        key: ScenarioEventKey::Competitor15,
        allowed_phases: &[Phase::Phase2],
        message: "Competitor launched 15% bond. Behavioral maturity diverging now.",
        apply: competitor_15,
    },
    EventDefinition {
        key: ScenarioEventKey::BbcLeak,
        allowed_phases: &[Phase::Phase3, Phase::Phase4],
        message: "BREAKING: BoE emergency funding talks leaked. FSCS protection up to 35,000 is highlighted to all participants.",
        apply: bbc_leak,
    },
];

impl ScenarioEventKey {
    pub const ALL: [ScenarioEventKey; 4] = [
        ScenarioEventKey::LiborRise,
        ScenarioEventKey::PrepaySlow,
        ScenarioEventKey::Competitor15,
        ScenarioEventKey::BbcLeak,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioEventKey::LiborRise => "LIBOR_RISE",
            ScenarioEventKey::PrepaySlow => "PREPAY_SLOW",
            ScenarioEventKey::Competitor15 => "COMPETITOR_15",
            ScenarioEventKey::BbcLeak => "BBC_LEAK",
        }
    }

    pub fn definition(self) -> &'static EventDefinition {
        match self {
            ScenarioEventKey::LiborRise => &EVENT_TABLE[0],
            ScenarioEventKey::PrepaySlow => &EVENT_TABLE[1],
            ScenarioEventKey::Competitor15 => &EVENT_TABLE[2],
            ScenarioEventKey::BbcLeak => &EVENT_TABLE[3],
        }
    }

    pub fn allowed_in(self, phase: Phase) -> bool {
        self.definition().allowed_phases.contains(&phase)
    }
}

impl fmt::Display for ScenarioEventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioEventKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioEventKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
