//! Outcome and scoring engine
//!
//! Pure read-time derivations over [`crate::models::GameState`]: per
//! participant score, label and phase-4 outcome, the leaderboard, the
//! classroom report and the cohort panels. Nothing here mutates state.

pub mod final_window;
pub mod reports;
pub mod scoring;

pub use final_window::{
    depositor_outcome, wholesale_outcome, DepositorOutcome, DepositorOutcomeKind,
    WholesaleOutcome, WholesaleOutcomeKind, OFFER_PREMIUM_PCT,
};
pub use reports::{
    classroom_report, cohort_panels, phase3_stance, ClassroomReport, CohortPanels, Phase3Stance,
    RetailReport, WholesaleReport,
};
pub use scoring::{label, leaderboard, rank_of, score, Label, LeaderboardRow};
