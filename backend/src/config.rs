//! Session configuration
//!
//! Classroom-level knobs: role quotas, the protection limit, credential
//! lifetimes, scheduler period and projection sizes. The economic rules of
//! each phase are fixed in code; only the cohort shape is configurable.
//!
//! CRITICAL: All money values are i64 (pence)

use serde::{Deserialize, Serialize};

/// Complete engine configuration
///
/// Every field has a default, so a partial JSON document is a valid config.
///
/// # Example
/// ```
/// use bank_run_core::SimulationConfig;
///
/// let config: SimulationConfig = serde_json::from_str(r#"{"wholesale_target": 4}"#).unwrap();
/// assert_eq!(config.wholesale_target, 4);
/// assert_eq!(config.depositor_target, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Target number of depositors in the cohort
    pub depositor_target: usize,

    /// Target number of wholesale lenders in the cohort
    pub wholesale_target: usize,

    /// Quiz answers needed (out of 3) to qualify as a wholesale lender
    pub wholesale_quiz_threshold: u32,

    /// Deposit protection limit (pence), £35,000 by default
    pub protection_limit: i64,

    /// Lifetime of a join token in milliseconds
    pub join_token_ttl_ms: u64,

    /// Accrual scheduler period in milliseconds
    pub tick_period_ms: u64,

    /// Maximum entries retained in the session event feed
    pub event_feed_capacity: usize,

    /// Feed entries included in a snapshot
    pub snapshot_feed_len: usize,

    /// Maximum entries retained in each participant's action log
    pub action_log_capacity: usize,

    /// Action log entries included in a participant view
    pub recent_actions_len: usize,

    /// Leaderboard rows included in a snapshot
    pub leaderboard_limit: usize,

    /// Seed for withdrawal-queue randomness
    pub rng_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            depositor_target: 50,
            wholesale_target: 13,
            wholesale_quiz_threshold: 2,
            protection_limit: 3_500_000, // £35,000
            join_token_ttl_ms: 10 * 60 * 1_000,
            tick_period_ms: 2_000,
            event_feed_capacity: 60,
            snapshot_feed_len: 12,
            action_log_capacity: 40,
            recent_actions_len: 6,
            leaderboard_limit: 16,
            rng_seed: 0x5EED_BA4C,
        }
    }
}

impl SimulationConfig {
    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.protection_limit <= 0 {
            return Err("protection_limit must be > 0".to_string());
        }
        if self.tick_period_ms == 0 {
            return Err("tick_period_ms must be > 0".to_string());
        }
        if self.event_feed_capacity == 0 || self.action_log_capacity == 0 {
            return Err("log capacities must be > 0".to_string());
        }
        if self.wholesale_quiz_threshold > 3 {
            return Err("wholesale_quiz_threshold must be between 0 and 3".to_string());
        }
        Ok(())
    }
}
