//! Engine Invariant Properties
//!
//! Random classroom sessions (joins, actions, ticks, phase moves, events
//! and the final decision) must keep these at every step:
//!
//! - A rejected command leaves the state untouched
//! - Balances and principals never go negative
//! - Phases only move forward; a resolved bank stays resolved
//! - The buffer never rises until a rescue injects liquidity
//! - A spectator's balance is frozen and only `hold` is accepted

use bank_run_core::models::participant::Participant;
use bank_run_core::{
    BankStatus, JoinRequest, ManualClock, Phase, Simulation, SimulationConfig, SimulationError,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const EVENTS: [&str; 4] = ["LIBOR_RISE", "PREPAY_SLOW", "COMPETITOR_15", "BBC_LEAK"];

/// Every wire action; payload built from a random amount
const ACTIONS: [&str; 28] = [
    "hold",
    "select_product",
    "phase1_set_additional",
    "add_money",
    "phase1_confirm",
    "upgrade_premier",
    "buy_hedge",
    "early_exit",
    "partial_withdraw_unprotected",
    "convert_current",
    "phase3_cancel_request",
    "phase3_prioritize_protected",
    "phase3_keep_full_request",
    "withdraw_now",
    "withdraw_unprotected",
    "spread_panic",
    "select_facility",
    "phase1_deploy",
    "phase1_change_cancel",
    "demand_spread",
    "reduce_exposure",
    "add_more",
    "rollover",
    "punitive_spread",
    "partial_rollover",
    "refuse_rollover",
    "final_hold",
    "final_refuse",
];

fn payload(action: &str, amount: u32) -> Value {
    let products = ["current", "notice_3m", "fixed_1y", "bond_3y", "premier_142"];
    let facilities = ["overnight", "week_1", "month_3", "year_1"];
    let pick = amount as usize;
    match action {
        "select_product" => json!({ "product": products[pick % products.len()] }),
        "phase1_set_additional" => json!({ "additional": amount }),
        "add_money" => json!({ "amount": amount }),
        "buy_hedge" => json!({ "level": if amount % 2 == 0 { "basic" } else { "full" } }),
        "early_exit" => json!({ "confirmStep": if amount % 3 == 0 { "single" } else { "double" } }),
        "select_facility" => json!({ "facility": facilities[pick % facilities.len()] }),
        "demand_spread" => json!({ "level": ([25, 75, 150, 50][pick % 4]) }),
        "reduce_exposure" => json!({ "pct": ([25, 50, 75, 10][pick % 4]) }),
        "add_more" => json!({ "amount": amount as u64 * 10_000 }),
        _ => Value::Null,
    }
}

#[derive(Debug, Clone)]
enum Op {
    Join { wholesale: bool },
    Act { who: usize, action: usize, amount: u32 },
    Tick,
    Advance,
    Skip(Phase),
    Event(usize),
    Decide(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<bool>().prop_map(|wholesale| Op::Join { wholesale }),
        10 => (0usize..16, 0usize..ACTIONS.len(), 0u32..60_000)
            .prop_map(|(who, action, amount)| Op::Act { who, action, amount }),
        4 => Just(Op::Tick),
        2 => Just(Op::Advance),
        1 => prop::sample::select(Phase::ORDER.to_vec()).prop_map(Op::Skip),
        1 => (0usize..EVENTS.len()).prop_map(Op::Event),
        1 => any::<bool>().prop_map(Op::Decide),
    ]
}

/// Distinct letters-only name for the n-th joiner
fn student_name(mut n: usize) -> String {
    let mut tag = String::new();
    loop {
        tag.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
        if n == 0 {
            break;
        }
    }
    format!("Student {}", tag)
}

struct Observed {
    phase: Phase,
    buffer: i64,
    status: BankStatus,
    frozen: BTreeMap<String, i64>,
}

impl Observed {
    fn new(sim: &Simulation) -> Self {
        Self {
            phase: sim.state().session.phase,
            buffer: sim.state().metrics.liquidity_buffer,
            status: sim.state().session.bank_status,
            frozen: BTreeMap::new(),
        }
    }
}

fn state_json(sim: &Simulation) -> Value {
    serde_json::to_value(sim.state()).expect("state serializes")
}

/// Apply one op; `Ok(false)` when the engine rejected it
fn apply(sim: &mut Simulation, clock: &ManualClock, ids: &mut Vec<String>, op: &Op) -> bool {
    let result: Result<(), SimulationError> = match op {
        Op::Join { wholesale } => {
            let mut answers = BTreeMap::new();
            if *wholesale {
                for (q, a) in [("q1", "a"), ("q2", "b"), ("q3", "b")] {
                    answers.insert(q.to_string(), a.to_string());
                }
            }
            let token = sim.session_info().join_token;
            sim.join(&JoinRequest {
                display_name: student_name(ids.len()),
                token,
                quiz_answers: answers,
                ..Default::default()
            })
            .map(|receipt| ids.push(receipt.participant_id))
        }
        Op::Act { who, action, amount } => {
            if ids.is_empty() {
                return true;
            }
            let id = &ids[who % ids.len()];
            let name = ACTIONS[*action];
            sim.submit_action(id, name, &payload(name, *amount))
        }
        Op::Tick => {
            clock.advance_ms(2_000);
            sim.tick();
            Ok(())
        }
        Op::Advance => match sim.state().session.phase.next() {
            Some(next) => sim.set_phase(next),
            None => return true,
        },
        Op::Skip(target) => sim.set_phase(*target),
        Op::Event(i) => sim.trigger_event(EVENTS[*i]).map(|_| ()),
        Op::Decide(rescue) => sim
            .apply_resolution_decision(if *rescue { "rescue" } else { "collapse" })
            .map(|_| ()),
    };
    result.is_ok()
}

fn check(sim: &Simulation, seen: &mut Observed) -> Result<(), TestCaseError> {
    let state = sim.state();

    for p in state.participants() {
        prop_assert!(p.balance >= 0, "{} balance {}", p.id, p.balance);
        prop_assert!(p.principal >= 0, "{} principal {}", p.id, p.principal);
    }

    prop_assert!(state.session.phase >= seen.phase);
    seen.phase = state.session.phase;

    if seen.status != BankStatus::Stable {
        prop_assert_eq!(state.session.bank_status, seen.status);
        prop_assert_eq!(state.session.phase, Phase::End);
    }
    seen.status = state.session.bank_status;

    let buffer = state.metrics.liquidity_buffer;
    prop_assert!(buffer >= 0);
    if !state.metrics.outcomes.boe_injected {
        prop_assert!(buffer <= seen.buffer, "buffer rose {} -> {}", seen.buffer, buffer);
    }
    seen.buffer = buffer;

    prop_assert!(state.metrics.panic_meter <= 100);

    for p in state.participants().filter(|p| p.is_spectator()) {
        let frozen = *seen.frozen.entry(p.id.clone()).or_insert(p.balance);
        prop_assert_eq!(p.balance, frozen, "spectator {} balance moved", p.id);
    }
    Ok(())
}

fn spectator_ids<'a>(participants: impl Iterator<Item = &'a Participant>) -> Vec<String> {
    participants
        .filter(|p| p.is_spectator())
        .map(|p| p.id.clone())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_random_sessions_keep_invariants(ops in prop::collection::vec(op(), 1..120)) {
        let clock = ManualClock::new(1_700_000_000_000);
        let mut sim = Simulation::new(SimulationConfig::default(), Box::new(clock.clone()))
            .expect("default config is valid");
        let mut ids = Vec::new();
        let mut seen = Observed::new(&sim);

        for op in &ops {
            // session_info may rotate an expired token, so read it up front
            sim.session_info();
            let before = state_json(&sim);
            let accepted = apply(&mut sim, &clock, &mut ids, op);
            if !accepted {
                prop_assert_eq!(&state_json(&sim), &before, "rejected {:?} changed state", op);
            }
            check(&sim, &mut seen)?;
        }
    }

    #[test]
    fn prop_spectators_only_hold(ops in prop::collection::vec(op(), 1..120), action in 1usize..ACTIONS.len()) {
        let clock = ManualClock::new(1_700_000_000_000);
        let mut sim = Simulation::new(SimulationConfig::default(), Box::new(clock.clone()))
            .expect("default config is valid");
        let mut ids = Vec::new();
        for op in &ops {
            apply(&mut sim, &clock, &mut ids, op);
        }

        if !sim.state().session.phase.accepts_actions() {
            return Ok(());
        }
        let name = ACTIONS[action];
        for id in spectator_ids(sim.state().participants()) {
            let before = state_json(&sim);
            prop_assert!(sim.submit_action(&id, name, &payload(name, 1)).is_err());
            prop_assert_eq!(state_json(&sim), before);
            prop_assert!(sim.submit_action(&id, "hold", &Value::Null).is_ok());
        }
    }
}
