//! Participant action processor
//!
//! The single mutation point for participant accounts. An inbound
//! `(action_type, payload)` pair is parsed into a typed [`Action`], checked
//! against phase, role and participant state, then applied.
//!
//! # Critical Invariants
//!
//! 1. **No partial application**: every check runs before the first write
//! 2. **Spectators are frozen**: after exit/refusal only `hold`/`noop` pass,
//!    and they only append to the action log
//! 3. **Closed phases**: nothing is accepted in lobby or end

pub mod depositor;
pub mod wholesale;

use crate::config::SimulationConfig;
use crate::error::ActionError;
use crate::models::catalog::{Facility, HedgeLevel, Product};
use crate::models::event::EventFeed;
use crate::models::metrics::Metrics;
use crate::models::participant::{round_pence, Participant, RoleState};
use crate::models::session::Phase;
use crate::rng::RngManager;
use serde::Deserialize;
use serde_json::{json, Value};

pub use depositor::finalize_depositor_choice;
pub use wholesale::finalize_wholesale_deployment;

/// Typed participant action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    // Any role
    Hold,
    Noop,

    // Depositor, phase 1
    SelectProduct(Product),
    SetAdditional(i64),
    AddMoney(i64),
    Confirm,

    // Depositor, phase 2
    UpgradePremier,
    BuyHedge(HedgeLevel),
    EarlyExit { double_confirmed: bool },

    // Depositor, phase 3
    PartialWithdrawUnprotected,
    ConvertCurrent,
    CancelRequest,
    PrioritizeProtected,
    KeepFullRequest,

    // Depositor, phase 4
    WithdrawNow,
    WithdrawUnprotected,
    SpreadPanic,

    // Wholesale, phase 1
    SelectFacility(Facility),
    Deploy,
    ChangeCancel,

    // Wholesale, phases 2-4
    Maintain,
    DemandSpread(u32),
    ReduceExposure(u32),
    AddMore(i64),
    Rollover,
    PunitiveSpread,
    PartialRollover,
    RefuseRollover,
    FinalHold,
    FinalRefuse,
}

#[derive(Deserialize)]
struct ProductPayload {
    #[serde(default)]
    product: String,
}

#[derive(Deserialize)]
struct FacilityPayload {
    #[serde(default)]
    facility: String,
}

#[derive(Deserialize)]
struct AdditionalPayload {
    #[serde(default)]
    additional: f64,
}

#[derive(Deserialize)]
struct AmountPayload {
    #[serde(default)]
    amount: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExitPayload {
    #[serde(default)]
    confirm_step: String,
}

#[derive(Deserialize)]
struct HedgePayload {
    level: Option<String>,
}

#[derive(Deserialize)]
struct LevelPayload {
    level: Option<u32>,
}

#[derive(Deserialize)]
struct PctPayload {
    pct: Option<u32>,
}

/// Pounds on the wire, pence inside
fn pounds_to_pence(pounds: f64) -> i64 {
    if pounds.is_finite() {
        (pounds * 100.0).round() as i64
    } else {
        0
    }
}

impl Action {
    /// Parse an action type and its JSON payload
    ///
    /// An absent payload behaves like `{}`. Unknown action types and
    /// payloads of the wrong shape are validation errors.
    pub fn parse(action_type: &str, payload: &Value) -> Result<Action, ActionError> {
        let empty = Value::Object(Default::default());
        let payload = if payload.is_null() { &empty } else { payload };

        fn decode<T: for<'de> Deserialize<'de>>(action: &str, payload: &Value) -> Result<T, ActionError> {
            T::deserialize(payload).map_err(|e| ActionError::InvalidPayload {
                action: action.to_string(),
                reason: e.to_string(),
            })
        }

        let action = match action_type {
            "hold" => Action::Hold,
            "noop" => Action::Noop,
            "select_product" => {
                let p: ProductPayload = decode(action_type, payload)?;
                let product = Product::from_id(&p.product)
                    .ok_or_else(|| ActionError::rejected("Invalid product"))?;
                Action::SelectProduct(product)
            }
            "phase1_set_additional" => {
                let p: AdditionalPayload = decode(action_type, payload)?;
                Action::SetAdditional(pounds_to_pence(p.additional))
            }
            "add_money" => {
                let p: AmountPayload = decode(action_type, payload)?;
                Action::AddMoney(pounds_to_pence(p.amount))
            }
            "phase1_confirm" => Action::Confirm,
            "upgrade_premier" => Action::UpgradePremier,
            "buy_hedge" => {
                let p: HedgePayload = decode(action_type, payload)?;
                let level = match p.level.as_deref() {
                    None | Some("basic") => HedgeLevel::Basic,
                    Some("full") => HedgeLevel::Full,
                    Some(other) => {
                        return Err(ActionError::InvalidPayload {
                            action: action_type.to_string(),
                            reason: format!("unknown hedge level {}", other),
                        })
                    }
                };
                Action::BuyHedge(level)
            }
            "early_exit" => {
                let p: ExitPayload = decode(action_type, payload)?;
                Action::EarlyExit {
                    double_confirmed: p.confirm_step == "double",
                }
            }
            "partial_withdraw_unprotected" => Action::PartialWithdrawUnprotected,
            "convert_current" => Action::ConvertCurrent,
            "phase3_cancel_request" => Action::CancelRequest,
            "phase3_prioritize_protected" => Action::PrioritizeProtected,
            "phase3_keep_full_request" => Action::KeepFullRequest,
            "withdraw_now" => Action::WithdrawNow,
            "withdraw_unprotected" => Action::WithdrawUnprotected,
            "spread_panic" => Action::SpreadPanic,
            "select_facility" => {
                let p: FacilityPayload = decode(action_type, payload)?;
                let facility = Facility::from_id(&p.facility)
                    .ok_or_else(|| ActionError::rejected("Invalid facility"))?;
                Action::SelectFacility(facility)
            }
            "phase1_deploy" => Action::Deploy,
            "phase1_change_cancel" => Action::ChangeCancel,
            "maintain" => Action::Maintain,
            "demand_spread" => {
                let p: LevelPayload = decode(action_type, payload)?;
                match p.level.unwrap_or(25) {
                    bps @ (25 | 75 | 150) => Action::DemandSpread(bps),
                    other => {
                        return Err(ActionError::InvalidPayload {
                            action: action_type.to_string(),
                            reason: format!("spread level must be 25, 75 or 150, got {}", other),
                        })
                    }
                }
            }
            "reduce_exposure" => {
                let p: PctPayload = decode(action_type, payload)?;
                match p.pct.unwrap_or(25) {
                    pct @ (25 | 50 | 75) => Action::ReduceExposure(pct),
                    other => {
                        return Err(ActionError::InvalidPayload {
                            action: action_type.to_string(),
                            reason: format!("exposure cut must be 25, 50 or 75, got {}", other),
                        })
                    }
                }
            }
            "add_more" => {
                let p: AmountPayload = decode(action_type, payload)?;
                Action::AddMore(pounds_to_pence(p.amount))
            }
            "rollover" => Action::Rollover,
            "punitive_spread" => Action::PunitiveSpread,
            "partial_rollover" => Action::PartialRollover,
            "refuse_rollover" => Action::RefuseRollover,
            "final_hold" => Action::FinalHold,
            "final_refuse" => Action::FinalRefuse,
            other => return Err(ActionError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }

    /// Wire name, as recorded in the action log
    pub fn name(&self) -> &'static str {
        match self {
            Action::Hold => "hold",
            Action::Noop => "noop",
            Action::SelectProduct(_) => "select_product",
            Action::SetAdditional(_) => "phase1_set_additional",
            Action::AddMoney(_) => "add_money",
            Action::Confirm => "phase1_confirm",
            Action::UpgradePremier => "upgrade_premier",
            Action::BuyHedge(_) => "buy_hedge",
            Action::EarlyExit { .. } => "early_exit",
            Action::PartialWithdrawUnprotected => "partial_withdraw_unprotected",
            Action::ConvertCurrent => "convert_current",
            Action::CancelRequest => "phase3_cancel_request",
            Action::PrioritizeProtected => "phase3_prioritize_protected",
            Action::KeepFullRequest => "phase3_keep_full_request",
            Action::WithdrawNow => "withdraw_now",
            Action::WithdrawUnprotected => "withdraw_unprotected",
            Action::SpreadPanic => "spread_panic",
            Action::SelectFacility(_) => "select_facility",
            Action::Deploy => "phase1_deploy",
            Action::ChangeCancel => "phase1_change_cancel",
            Action::Maintain => "maintain",
            Action::DemandSpread(_) => "demand_spread",
            Action::ReduceExposure(_) => "reduce_exposure",
            Action::AddMore(_) => "add_more",
            Action::Rollover => "rollover",
            Action::PunitiveSpread => "punitive_spread",
            Action::PartialRollover => "partial_rollover",
            Action::RefuseRollover => "refuse_rollover",
            Action::FinalHold => "final_hold",
            Action::FinalRefuse => "final_refuse",
        }
    }
}

/// Everything outside the participant that an action may touch
pub struct ActionContext<'a> {
    pub phase: Phase,
    pub metrics: &'a mut Metrics,
    pub feed: &'a mut EventFeed,
    pub config: &'a SimulationConfig,
    pub rng: &'a mut RngManager,
    pub now_ms: u64,
}

impl ActionContext<'_> {
    pub(crate) fn record(&self, participant: &mut Participant, action: &Action, payload: Value) {
        participant.record_action(self.phase, action.name(), payload, self.now_ms);
    }
}

/// Validate and apply `action` for `participant`
///
/// On `Err` nothing has been mutated.
pub fn apply_action(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    if !ctx.phase.accepts_actions() {
        return Err(ActionError::PhaseClosed);
    }

    if participant.is_spectator() {
        return match action {
            Action::Hold | Action::Noop => {
                ctx.record(participant, &action, json!({}));
                Ok(())
            }
            _ => Err(ActionError::Spectator),
        };
    }

    if action == Action::Noop {
        ctx.record(participant, &action, json!({}));
        return Ok(());
    }

    match participant.state {
        RoleState::Depositor(_) => depositor::apply(ctx, participant, action),
        RoleState::Wholesale(_) => wholesale::apply(ctx, participant, action),
    }
}

/// Clamp a requested top-up to the room left under `cap`
pub(crate) fn capped_top_up(principal: i64, requested: i64, cap: i64) -> i64 {
    let room = (cap - principal).max(0);
    requested.max(0).min(room)
}

/// Format pence as whole pounds with thousands separators, e.g. `£12,345`
pub fn format_amount(pence: i64) -> String {
    let pounds = round_pence(pence.max(0) as f64 / 100.0);
    let digits = pounds.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("£{}", out)
}
