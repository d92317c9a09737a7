//! Systemic liquidity metrics
//!
//! Process-wide state recomputed by the liquidity model from the participant
//! population. Outside the model, only scenario events, localized action
//! debits, the rescue injection and the collapse zero-out touch it.
//!
//! CRITICAL: All money values are i64 (pence)

use crate::models::catalog::BucketAmounts;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opening liquidity buffer: £1.1bn
pub const INITIAL_LIQUIDITY_BUFFER: i64 = 110_000_000_000;

/// Opening reference rate (percent)
pub const INITIAL_LIBOR_PCT: f64 = 5.25;

/// Macro scenario label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    #[serde(rename = "BASE CASE")]
    BaseCase,
    #[serde(rename = "MODERATE STRESS")]
    ModerateStress,
    #[serde(rename = "SEVERE STRESS")]
    SevereStress,
}

impl Scenario {
    /// Asset haircut applied by the scenario alone
    pub fn haircut(self) -> f64 {
        match self {
            Scenario::BaseCase => 1.0,
            Scenario::ModerateStress => 0.96,
            Scenario::SevereStress => 0.9,
        }
    }

    /// Multiplier on the per-cycle buffer drain
    pub fn drain_multiplier(self) -> f64 {
        match self {
            Scenario::BaseCase => 1.0,
            Scenario::ModerateStress => 1.5,
            Scenario::SevereStress => 2.4,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::BaseCase => write!(f, "BASE CASE"),
            Scenario::ModerateStress => write!(f, "MODERATE STRESS"),
            Scenario::SevereStress => write!(f, "SEVERE STRESS"),
        }
    }
}

/// Qualitative market liquidity, degraded as the bid-offer spread widens
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityTier {
    Normal,
    Strained,
    Broken,
}

impl LiquidityTier {
    pub fn from_spread(spread_pct: f64) -> Self {
        if spread_pct > 2.2 {
            LiquidityTier::Broken
        } else if spread_pct > 1.0 {
            LiquidityTier::Strained
        } else {
            LiquidityTier::Normal
        }
    }

    pub fn market_depth(self) -> &'static str {
        match self {
            LiquidityTier::Normal => "Deep",
            LiquidityTier::Strained => "Thin",
            LiquidityTier::Broken => "Very Thin",
        }
    }

    pub fn immediacy(self) -> &'static str {
        match self {
            LiquidityTier::Normal => "Minutes",
            LiquidityTier::Strained => "Hours",
            LiquidityTier::Broken => "Days",
        }
    }

    pub fn resilience(self) -> &'static str {
        match self {
            LiquidityTier::Normal => "Fast",
            LiquidityTier::Strained => "Weak",
            LiquidityTier::Broken => "Absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLiquidity {
    pub bid_offer_spread_pct: f64,
    /// Labels only ever degrade within a session
    pub tier: LiquidityTier,
}

/// Contingency funding plan stage status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Active,
    Ready,
    Standby,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfpStages {
    pub stage1: StageStatus,
    pub stage2: StageStatus,
    pub stage3: StageStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressTypes {
    pub institution_specific: bool,
    pub market_wide: bool,
}

/// External assumptions that scenario events break
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub funding_cost_stable: bool,
    pub prepayment_rate_pct: f64,
    pub deposit_stability: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescueOutcome {
    pub boe_injected: bool,
    pub rescue_injection_amount: i64,
}

/// Full metrics record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub lcr: f64,
    pub nsfr: f64,
    pub liquidity_buffer: i64,
    pub survival_hours: i64,
    pub funding_concentration_pct: f64,
    pub wholesale_dependency_pct: f64,
    pub contractual_maturity_pct: f64,
    pub behavioral_maturity_pct: f64,
    pub scenario: Scenario,
    pub libor_pct: f64,
    pub panic_meter: u32,
    pub asset_liquidity: AssetLiquidity,
    pub cfp_stage: CfpStages,
    pub stress_types: StressTypes,
    pub assumptions: Assumptions,
    pub outcomes: RescueOutcome,
    /// Synthetic asset side from the last recompute
    pub asset_buckets: BucketAmounts,
    /// Live liabilities (retail + deployed wholesale) from the last recompute
    pub liability_buckets: BucketAmounts,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            lcr: 100.0,
            nsfr: 100.0,
            liquidity_buffer: INITIAL_LIQUIDITY_BUFFER,
            survival_hours: 96,
            funding_concentration_pct: 74.0,
            wholesale_dependency_pct: 74.0,
            contractual_maturity_pct: 88.0,
            behavioral_maturity_pct: 88.0,
            scenario: Scenario::BaseCase,
            libor_pct: INITIAL_LIBOR_PCT,
            panic_meter: 4,
            asset_liquidity: AssetLiquidity {
                bid_offer_spread_pct: 0.12,
                tier: LiquidityTier::Normal,
            },
            cfp_stage: CfpStages {
                stage1: StageStatus::Active,
                stage2: StageStatus::Ready,
                stage3: StageStatus::Standby,
            },
            stress_types: StressTypes {
                institution_specific: true,
                market_wide: false,
            },
            assumptions: Assumptions {
                funding_cost_stable: true,
                prepayment_rate_pct: 12.0,
                deposit_stability: true,
            },
            outcomes: RescueOutcome {
                boe_injected: false,
                rescue_injection_amount: 0,
            },
            asset_buckets: BucketAmounts::default(),
            liability_buckets: BucketAmounts::default(),
        }
    }
}

impl Metrics {
    /// Raise panic by `step` up to `cap`; never lowers an already higher reading
    pub fn raise_panic(&mut self, step: u32, cap: u32) {
        self.panic_meter = (self.panic_meter + step).min(cap).max(self.panic_meter);
    }

    /// Debit the buffer, flooring at zero
    pub fn debit_buffer(&mut self, amount: i64) {
        self.liquidity_buffer = (self.liquidity_buffer - amount.max(0)).max(0);
    }

    /// Nudge the shared reference rate, rounded to 2dp
    pub fn bump_libor(&mut self, delta_pct: f64) {
        self.libor_pct = ((self.libor_pct + delta_pct) * 100.0).round() / 100.0;
    }
}
