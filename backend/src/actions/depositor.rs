//! Depositor rule set
//!
//! Phase 1 builds the savings position, phase 2 tempts with yield and
//! hedges, phase 3 runs the withdrawal queue, phase 4 is the final scramble.

use crate::actions::{capped_top_up, format_amount, Action, ActionContext};
use crate::error::ActionError;
use crate::models::catalog::{Product, Role};
use crate::models::event::FeedKind;
use crate::models::participant::{
    round_pence, CommitKind, DepositorExit, DepositorState, Participant, RoleState,
    DEPOSITOR_BASE_BALANCE, DEPOSITOR_PRINCIPAL_CAP, SETUP_TOP_UP_CAP,
};
use crate::models::session::Phase;
use serde_json::json;

const PHASE2_EXIT_PENALTY_PCT: i64 = 40;
const PHASE2_EXIT_BUFFER_SHARE: f64 = 0.15;
const PHASE3_EXIT_KEEP: f64 = 0.6;
const SWITCH_FEE_PCT: i64 = 15;

fn state_mut(participant: &mut Participant) -> Result<&mut DepositorState, ActionError> {
    match &mut participant.state {
        RoleState::Depositor(d) => Ok(d),
        RoleState::Wholesale(_) => Err(ActionError::NotAvailable {
            role: Role::Wholesale,
        }),
    }
}

fn not_available() -> ActionError {
    ActionError::NotAvailable {
        role: Role::Depositor,
    }
}

/// Commit the depositor's phase-1 choice
///
/// The first commit fixes balance and principal at the base amount plus the
/// drafted top-up. A later commit is a change: accrual since the last commit
/// is banked and the cycle re-bases. Returns `None` (and changes nothing)
/// when there is no choice and no fallback.
pub fn finalize_depositor_choice(
    participant: &mut Participant,
    fallback: Option<Product>,
    now_ms: u64,
) -> Option<Product> {
    let balance = participant.balance;
    let principal = participant.principal;
    let RoleState::Depositor(d) = &mut participant.state else {
        return None;
    };
    let (product, kind) = d.selection.commit(fallback)?;
    d.product = Some(product);

    match kind {
        CommitKind::First => {
            let total = DEPOSITOR_BASE_BALANCE + d.draft_top_up.clamp(0, SETUP_TOP_UP_CAP);
            d.interest.restart(total, now_ms);
            participant.balance = total;
            participant.principal = total;
        }
        CommitKind::Change => {
            d.interest.bank_and_restart(balance, now_ms);
            d.draft_top_up = (principal - DEPOSITOR_BASE_BALANCE).max(0);
        }
    }
    Some(product)
}

pub(crate) fn apply(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match ctx.phase {
        Phase::Phase1 => phase1(ctx, participant, action),
        Phase::Phase2 => phase2(ctx, participant, action),
        Phase::Phase3 => phase3(ctx, participant, action),
        Phase::Phase4 => phase4(ctx, participant, action),
        Phase::Lobby | Phase::End => Err(ActionError::PhaseClosed),
    }
}

fn top_up(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: &Action,
    requested: i64,
) -> Result<i64, ActionError> {
    let added = capped_top_up(participant.principal, requested, DEPOSITOR_PRINCIPAL_CAP);
    if added <= 0 {
        return Err(ActionError::rejected("Amount must be positive"));
    }
    participant.balance += added;
    participant.principal += added;
    ctx.record(participant, action, json!({ "amount": added }));
    Ok(added)
}

fn phase1(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match action {
        Action::SelectProduct(product) => {
            if !product.selectable_in_setup() {
                return Err(ActionError::rejected("Invalid product"));
            }
            state_mut(participant)?.selection.select(product);
            ctx.record(participant, &action, json!({ "product": product.id() }));
            ctx.feed.push(
                FeedKind::Info,
                format!("{} shortlisted {}.", participant.name, product.label()),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::SetAdditional(amount) => {
            let d = state_mut(participant)?;
            if d.confirmed() {
                return Err(ActionError::rejected(
                    "You can only use the setup slider before first confirm.",
                ));
            }
            let additional = amount.clamp(0, SETUP_TOP_UP_CAP);
            d.draft_top_up = additional;
            ctx.record(participant, &action, json!({ "additional": additional }));
            Ok(())
        }
        Action::AddMoney(amount) => {
            if !state_mut(participant)?.confirmed() {
                return Err(ActionError::rejected("Confirm your deposit first."));
            }
            top_up(ctx, participant, &action, amount)?;
            let principal = participant.principal;
            state_mut(participant)?.draft_top_up = (principal - DEPOSITOR_BASE_BALANCE).max(0);
            ctx.feed.push(
                FeedKind::Info,
                format!("{} added more savings.", participant.name),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::Confirm | Action::Hold => {
            if finalize_depositor_choice(participant, None, ctx.now_ms).is_none() {
                return Err(ActionError::rejected("Choose a product first."));
            }
            ctx.record(participant, &action, json!({}));
            ctx.feed.push(
                FeedKind::Info,
                format!("{} confirmed Phase 1 deposit plan.", participant.name),
                ctx.now_ms,
            );
            Ok(())
        }
        _ => Err(not_available()),
    }
}

fn phase2(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    match action {
        Action::UpgradePremier => {
            let balance = participant.balance;
            let accrued = (balance - participant.principal).max(0);
            let d = state_mut(participant)?;
            if d.product == Some(Product::Premier142) {
                return Err(ActionError::rejected("Already in Premier Bond."));
            }
            d.phase2_banked_interest += accrued;
            d.product = Some(Product::Premier142);
            d.upgraded_at = Some(ctx.now_ms);
            participant.principal = balance;
            ctx.record(participant, &action, json!({}));
            ctx.feed.push(
                FeedKind::Alert,
                format!("{} upgraded to Premier Bond 14.2%.", participant.name),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::AddMoney(amount) => top_up(ctx, participant, &action, amount).map(|_| ()),
        Action::EarlyExit { double_confirmed } => {
            if !double_confirmed {
                return Err(ActionError::rejected("Early exit needs final confirmation."));
            }
            let principal = participant.principal.max(0);
            let interest = (participant.balance - principal).max(0);
            let penalty = principal * PHASE2_EXIT_PENALTY_PCT / 100;
            let payout = (principal - penalty + interest).max(0);

            let d = state_mut(participant)?;
            d.product = None;
            d.exit = Some(DepositorExit {
                phase: Phase::Phase2,
                payout,
                loss: penalty,
                principal,
                interest,
            });
            participant.balance = payout;
            participant.principal = 0;

            ctx.metrics
                .debit_buffer(round_pence(payout as f64 * PHASE2_EXIT_BUFFER_SHARE));
            ctx.metrics.raise_panic(3, 95);
            ctx.record(
                participant,
                &action,
                json!({
                    "penaltyPct": PHASE2_EXIT_PENALTY_PCT,
                    "principal": principal,
                    "interestEarned": interest,
                    "penaltyAmount": penalty,
                    "payout": payout,
                }),
            );
            ctx.feed.push(
                FeedKind::Alert,
                format!(
                    "{} exited early with a {}% penalty.",
                    participant.name, PHASE2_EXIT_PENALTY_PCT
                ),
                ctx.now_ms,
            );
            Ok(())
        }
        Action::BuyHedge(level) => {
            let premium = round_pence(participant.principal as f64 * level.premium_rate());
            let accrued = (participant.balance - participant.principal).max(0);
            let d = state_mut(participant)?;
            if d.hedge.is_some() {
                return Err(ActionError::rejected("Hedge already active"));
            }
            if premium > accrued {
                return Err(ActionError::rejected(format!(
                    "Need {} earned interest to buy this hedge.",
                    format_amount(premium)
                )));
            }
            d.hedge = Some(level);
            participant.balance -= premium;
            ctx.record(
                participant,
                &action,
                json!({ "premium": premium, "hedgeType": level }),
            );
            Ok(())
        }
        Action::Hold => {
            ctx.record(participant, &action, json!({}));
            Ok(())
        }
        _ => Err(not_available()),
    }
}

fn phase3(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    let now = ctx.now_ms;
    let limit = ctx.config.protection_limit;
    match action {
        Action::Hold => {
            let d = state_mut(participant)?;
            if d.queue.is_open() {
                let drift = ctx.rng.range(20, 80) as u32;
                d.queue.drift(drift, now);
            }
            ctx.record(participant, &action, json!({}));
            Ok(())
        }
        Action::EarlyExit { .. } => {
            let before = participant.balance;
            let kept = round_pence(before as f64 * PHASE3_EXIT_KEEP);
            state_mut(participant)?.exit = Some(DepositorExit {
                payout: kept,
                loss: before - kept,
                ..DepositorExit::at(Phase::Phase3)
            });
            participant.balance = kept;
            ctx.record(participant, &action, json!({ "penaltyPct": 40 }));
            ctx.feed.push(
                FeedKind::Alert,
                format!("{} exited under stress with 40% penalty.", participant.name),
                now,
            );
            Ok(())
        }
        Action::PartialWithdrawUnprotected => {
            let unprotected = (participant.balance - limit).max(0);
            if unprotected <= 0 {
                return Err(ActionError::rejected("No unprotected amount to withdraw"));
            }
            state_mut(participant)?.exit = Some(DepositorExit {
                payout: unprotected,
                ..DepositorExit::at(Phase::Phase3)
            });
            participant.balance -= unprotected;
            ctx.record(participant, &action, json!({ "amount": unprotected }));
            ctx.feed.push(
                FeedKind::Info,
                format!("{} withdrew only unprotected amount.", participant.name),
                now,
            );
            Ok(())
        }
        Action::ConvertCurrent => {
            if state_mut(participant)?.switched_to_current {
                return Err(ActionError::rejected("Already switched to instant access."));
            }
            let balance = participant.balance * (100 - SWITCH_FEE_PCT) / 100;
            let reference = ctx.rng.queue_reference();
            let position = 1_800 + ctx.rng.range(0, 900) as u32;

            let d = state_mut(participant)?;
            d.product = Some(Product::Current);
            d.switched_to_current = true;
            d.queue.open(reference.clone(), balance, position, now);
            participant.balance = balance;
            participant.principal = balance;

            ctx.record(
                participant,
                &action,
                json!({ "feePct": SWITCH_FEE_PCT, "queueRef": reference }),
            );
            ctx.feed.push(
                FeedKind::Alert,
                format!(
                    "{} paid break fee and switched to instant access.",
                    participant.name
                ),
                now,
            );
            Ok(())
        }
        Action::CancelRequest | Action::PrioritizeProtected | Action::KeepFullRequest => {
            let balance = participant.balance;
            let d = state_mut(participant)?;
            if !d.queue.is_open() {
                return Err(ActionError::rejected("No active request."));
            }
            let payload = match action {
                Action::CancelRequest => {
                    d.queue.cancel(now);
                    json!({})
                }
                Action::PrioritizeProtected => {
                    d.queue.prioritize_protected(balance, limit, now);
                    json!({ "amount": d.queue.requested_amount })
                }
                _ => {
                    d.queue.keep_full(balance, now);
                    json!({ "amount": d.queue.requested_amount })
                }
            };
            ctx.record(participant, &action, payload);
            Ok(())
        }
        _ => Err(not_available()),
    }
}

fn phase4(
    ctx: &mut ActionContext<'_>,
    participant: &mut Participant,
    action: Action,
) -> Result<(), ActionError> {
    let now = ctx.now_ms;
    match action {
        Action::Hold => {
            ctx.record(participant, &action, json!({}));
            Ok(())
        }
        Action::WithdrawNow => {
            let balance = participant.balance;
            state_mut(participant)?.exit = Some(DepositorExit {
                payout: balance,
                ..DepositorExit::at(Phase::Phase4)
            });
            ctx.record(participant, &action, json!({}));
            ctx.feed.push(
                FeedKind::Alert,
                format!("{} withdrew immediately after leak.", participant.name),
                now,
            );
            Ok(())
        }
        Action::WithdrawUnprotected => {
            let unprotected = (participant.balance - ctx.config.protection_limit).max(0);
            if unprotected <= 0 {
                return Err(ActionError::rejected("No unprotected amount available"));
            }
            state_mut(participant)?.exit = Some(DepositorExit {
                payout: unprotected,
                ..DepositorExit::at(Phase::Phase4)
            });
            participant.balance -= unprotected;
            ctx.record(participant, &action, json!({ "amount": unprotected }));
            Ok(())
        }
        Action::SpreadPanic => {
            state_mut(participant)?.panic_signals += 1;
            ctx.metrics.raise_panic(4, 95);
            ctx.record(participant, &action, json!({}));
            ctx.feed.push(
                FeedKind::Alert,
                format!("{} spread panic signals.", participant.name),
                now,
            );
            Ok(())
        }
        _ => Err(not_available()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::models::catalog::HedgeLevel;
    use crate::models::event::EventFeed;
    use crate::models::metrics::Metrics;
    use crate::models::participant::{Commitment, QueueState};
    use crate::rng::RngManager;

    struct Fixture {
        metrics: Metrics,
        feed: EventFeed,
        config: SimulationConfig,
        rng: RngManager,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                metrics: Metrics::default(),
                feed: EventFeed::new(60),
                config: SimulationConfig::default(),
                rng: RngManager::new(7),
            }
        }

        fn run(
            &mut self,
            phase: Phase,
            p: &mut Participant,
            action: Action,
        ) -> Result<(), ActionError> {
            let mut ctx = ActionContext {
                phase,
                metrics: &mut self.metrics,
                feed: &mut self.feed,
                config: &self.config,
                rng: &mut self.rng,
                now_ms: 1_000,
            };
            apply(&mut ctx, p, action)
        }
    }

    fn depositor() -> Participant {
        Participant::new(Role::Depositor, "Ada Lovelace".to_string(), 0, 40)
    }

    fn dep(p: &Participant) -> &DepositorState {
        p.depositor().unwrap()
    }

    #[test]
    fn test_confirm_with_top_up() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        fx.run(Phase::Phase1, &mut p, Action::SelectProduct(Product::Current)).unwrap();
        fx.run(Phase::Phase1, &mut p, Action::SetAdditional(800_000)).unwrap();
        fx.run(Phase::Phase1, &mut p, Action::Confirm).unwrap();
        assert_eq!(p.balance, 1_800_000);
        assert_eq!(p.principal, 1_800_000);
        assert!(dep(&p).confirmed());
    }

    #[test]
    fn test_confirm_without_choice_rejected() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        let before = p.clone();
        assert_eq!(
            fx.run(Phase::Phase1, &mut p, Action::Hold),
            Err(ActionError::rejected("Choose a product first."))
        );
        assert_eq!(p, before);
    }

    #[test]
    fn test_premier_not_selectable_in_setup() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        assert!(fx
            .run(Phase::Phase1, &mut p, Action::SelectProduct(Product::Premier142))
            .is_err());
        assert_eq!(dep(&p).selection, Commitment::Unset);
    }

    #[test]
    fn test_slider_locked_after_confirm() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        fx.run(Phase::Phase1, &mut p, Action::SelectProduct(Product::Fixed1y)).unwrap();
        fx.run(Phase::Phase1, &mut p, Action::Confirm).unwrap();
        assert!(fx.run(Phase::Phase1, &mut p, Action::SetAdditional(100)).is_err());
    }

    #[test]
    fn test_reconfirm_banks_accrual_once() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        fx.run(Phase::Phase1, &mut p, Action::SelectProduct(Product::Notice3m)).unwrap();
        fx.run(Phase::Phase1, &mut p, Action::Confirm).unwrap();
        p.balance += 4_321;
        fx.run(Phase::Phase1, &mut p, Action::SelectProduct(Product::Bond3y)).unwrap();
        fx.run(Phase::Phase1, &mut p, Action::Confirm).unwrap();
        assert_eq!(dep(&p).interest.banked, 4_321);
        assert_eq!(dep(&p).product, Some(Product::Bond3y));

        fx.run(Phase::Phase1, &mut p, Action::Confirm).unwrap();
        assert_eq!(dep(&p).interest.banked, 4_321);
    }

    #[test]
    fn test_add_money_caps_principal() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        fx.run(Phase::Phase1, &mut p, Action::SelectProduct(Product::Current)).unwrap();
        fx.run(Phase::Phase1, &mut p, Action::SetAdditional(3_900_000)).unwrap();
        fx.run(Phase::Phase1, &mut p, Action::Confirm).unwrap();
        fx.run(Phase::Phase2, &mut p, Action::AddMoney(1_000_000)).unwrap();
        assert_eq!(p.principal, DEPOSITOR_PRINCIPAL_CAP);
        assert_eq!(
            fx.run(Phase::Phase2, &mut p, Action::AddMoney(1)),
            Err(ActionError::rejected("Amount must be positive"))
        );
    }

    #[test]
    fn test_phase2_early_exit_payout() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        p.balance = 2_000_000;
        p.principal = 2_000_000;
        let buffer_before = fx.metrics.liquidity_buffer;
        fx.run(
            Phase::Phase2,
            &mut p,
            Action::EarlyExit {
                double_confirmed: true,
            },
        )
        .unwrap();
        assert_eq!(p.balance, 1_200_000);
        assert_eq!(p.principal, 0);
        let exit = dep(&p).exit.unwrap();
        assert_eq!(exit.phase, Phase::Phase2);
        assert_eq!(exit.payout, 1_200_000);
        assert_eq!(exit.loss, 800_000);
        assert_eq!(fx.metrics.liquidity_buffer, buffer_before - 180_000);
        assert_eq!(fx.metrics.panic_meter, 7);
    }

    #[test]
    fn test_early_exit_requires_double_confirm() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        assert!(fx
            .run(
                Phase::Phase2,
                &mut p,
                Action::EarlyExit {
                    double_confirmed: false
                }
            )
            .is_err());
        assert!(!dep(&p).withdrew());
    }

    #[test]
    fn test_hedge_paid_from_accrued_only() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        // Premium is 0.5% of £10,000 = £50
        p.balance = p.principal + 4_999;
        assert!(fx.run(Phase::Phase2, &mut p, Action::BuyHedge(HedgeLevel::Basic)).is_err());
        p.balance = p.principal + 5_000;
        fx.run(Phase::Phase2, &mut p, Action::BuyHedge(HedgeLevel::Basic)).unwrap();
        assert_eq!(p.balance, p.principal);
        assert!(dep(&p).hedge.is_some());
    }

    #[test]
    fn test_upgrade_banks_accrual_and_is_irreversible() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        p.balance += 12_345;
        fx.run(Phase::Phase2, &mut p, Action::UpgradePremier).unwrap();
        assert_eq!(dep(&p).phase2_banked_interest, 12_345);
        assert_eq!(p.principal, p.balance);
        assert!(fx.run(Phase::Phase2, &mut p, Action::UpgradePremier).is_err());
    }

    #[test]
    fn test_convert_current_opens_queue() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        fx.run(Phase::Phase3, &mut p, Action::ConvertCurrent).unwrap();
        assert_eq!(p.balance, 850_000);
        let queue = &dep(&p).queue;
        assert_eq!(queue.state, QueueState::Processing);
        assert!((1_800..2_700).contains(&queue.position));
        assert_eq!(queue.reference.as_deref().map(str::len), Some(7));
        assert!(fx.run(Phase::Phase3, &mut p, Action::ConvertCurrent).is_err());
    }

    #[test]
    fn test_queue_subactions_need_open_request() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        assert_eq!(
            fx.run(Phase::Phase3, &mut p, Action::PrioritizeProtected),
            Err(ActionError::rejected("No active request."))
        );
    }

    #[test]
    fn test_hold_drifts_queue_position() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        fx.run(Phase::Phase3, &mut p, Action::ConvertCurrent).unwrap();
        let before = dep(&p).queue.position;
        fx.run(Phase::Phase3, &mut p, Action::Hold).unwrap();
        let after = dep(&p).queue.position;
        assert!(before - after >= 20 && before - after < 80);
    }

    #[test]
    fn test_phase4_withdraw_unprotected() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        p.balance = 4_000_000;
        fx.run(Phase::Phase4, &mut p, Action::WithdrawUnprotected).unwrap();
        assert_eq!(p.balance, 3_500_000);
        assert_eq!(dep(&p).withdrawn_at(), Some(Phase::Phase4));
    }

    #[test]
    fn test_wholesale_only_action_rejected() {
        let mut fx = Fixture::new();
        let mut p = depositor();
        assert_eq!(
            fx.run(Phase::Phase3, &mut p, Action::RefuseRollover),
            Err(ActionError::NotAvailable {
                role: Role::Depositor
            })
        );
    }
}
