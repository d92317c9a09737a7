//! Wholesale Action Tests
//!
//! Facility deployment, spread demands and their effect on the shared
//! reference rate, exposure cuts, and refusals.

use bank_run_core::models::event::FeedKind;
use bank_run_core::models::participant::WholesaleState;
use bank_run_core::models::Facility;
use bank_run_core::{
    ActionError, JoinRequest, ManualClock, Phase, Role, Simulation, SimulationConfig,
    SimulationError,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const START: u64 = 1_700_000_000_000;
const LENDER_BALANCE: i64 = 50_000_000_000;

fn new_sim() -> (Simulation, ManualClock) {
    let clock = ManualClock::new(START);
    let sim = Simulation::new(SimulationConfig::default(), Box::new(clock.clone()))
        .expect("default config is valid");
    (sim, clock)
}

fn join_lender(sim: &mut Simulation, name: &str) -> String {
    let answers: BTreeMap<String, String> = [("q1", "a"), ("q2", "b"), ("q3", "b")]
        .into_iter()
        .map(|(q, a)| (q.to_string(), a.to_string()))
        .collect();
    let token = sim.session_info().join_token;
    let receipt = sim
        .join(&JoinRequest {
            display_name: name.to_string(),
            token,
            quiz_answers: answers,
            ..Default::default()
        })
        .expect("join succeeds");
    assert_eq!(receipt.role, Role::Wholesale);
    receipt.participant_id
}

fn act(sim: &mut Simulation, id: &str, action: &str, payload: Value) {
    sim.submit_action(id, action, &payload)
        .unwrap_or_else(|e| panic!("{} rejected: {}", action, e));
}

fn rejected(sim: &mut Simulation, id: &str, action: &str, payload: Value) -> ActionError {
    match sim.submit_action(id, action, &payload) {
        Err(SimulationError::Action(e)) => e,
        other => panic!("{} should be rejected, got {:?}", action, other),
    }
}

fn lender<'a>(sim: &'a Simulation, id: &str) -> &'a WholesaleState {
    sim.state().participant(id).unwrap().wholesale().unwrap()
}

fn deployed(sim: &mut Simulation, name: &str, facility: &str) -> String {
    let id = join_lender(sim, name);
    if sim.state().session.phase == Phase::Lobby {
        sim.set_phase(Phase::Phase1).unwrap();
    }
    act(sim, &id, "select_facility", json!({ "facility": facility }));
    act(sim, &id, "phase1_deploy", Value::Null);
    id
}

fn tick_n(sim: &mut Simulation, clock: &ManualClock, n: usize) {
    for _ in 0..n {
        clock.advance_ms(2_000);
        sim.tick();
    }
}

// ============================================================================
// Phase 1
// ============================================================================

#[test]
fn test_deploy_requires_a_facility() {
    let (mut sim, _) = new_sim();
    let id = join_lender(&mut sim, "Alan Turing");
    sim.set_phase(Phase::Phase1).unwrap();
    assert_eq!(
        rejected(&mut sim, &id, "phase1_deploy", Value::Null),
        ActionError::rejected("Choose a facility first.")
    );
    assert!(matches!(
        rejected(&mut sim, &id, "select_facility", json!({"facility": "decade_10"})),
        ActionError::Rejected(_)
    ));
}

#[test]
fn test_deploy_keeps_balance_and_starts_spread() {
    let (mut sim, clock) = new_sim();
    let id = deployed(&mut sim, "Alan Turing", "month_3");
    assert_eq!(sim.state().participant(&id).unwrap().balance, LENDER_BALANCE);
    assert!(lender(&sim, &id).deployed());
    assert_eq!(lender(&sim, &id).facility, Some(Facility::Month3));

    tick_n(&mut sim, &clock, 3);
    assert!(sim.state().participant(&id).unwrap().balance > LENDER_BALANCE);
}

#[test]
fn test_change_then_cancel_keeps_facility() {
    let (mut sim, clock) = new_sim();
    let id = deployed(&mut sim, "Alan Turing", "overnight");
    tick_n(&mut sim, &clock, 2);

    act(&mut sim, &id, "select_facility", json!({"facility": "year_1"}));
    assert_eq!(lender(&sim, &id).selection.pending(), Some(Facility::Year1));
    act(&mut sim, &id, "phase1_change_cancel", Value::Null);
    assert_eq!(lender(&sim, &id).selection.pending(), None);
    assert_eq!(lender(&sim, &id).facility, Some(Facility::Overnight));
    assert_eq!(lender(&sim, &id).spread.banked, 0);

    act(&mut sim, &id, "select_facility", json!({"facility": "year_1"}));
    act(&mut sim, &id, "phase1_deploy", Value::Null);
    let balance = sim.state().participant(&id).unwrap().balance;
    assert_eq!(lender(&sim, &id).facility, Some(Facility::Year1));
    assert_eq!(lender(&sim, &id).spread.banked, balance - LENDER_BALANCE);
}

// ============================================================================
// Phase 2
// ============================================================================

#[test]
fn test_demand_spread_moves_shared_rate() {
    let (mut sim, _) = new_sim();
    let greedy = deployed(&mut sim, "Alan Turing", "overnight");
    deployed(&mut sim, "Joan Clarke", "overnight");
    sim.set_phase(Phase::Phase2).unwrap();
    assert_eq!(sim.state().metrics.libor_pct, 5.25);

    act(&mut sim, &greedy, "demand_spread", json!({"level": 75}));
    assert_eq!(lender(&sim, &greedy).spread_bps_override, 75);
    assert_eq!(sim.state().metrics.libor_pct, 5.38);

    assert!(matches!(
        rejected(&mut sim, &greedy, "demand_spread", json!({"level": 50})),
        ActionError::InvalidPayload { .. }
    ));
}

#[test]
fn test_reduce_exposure_floors_and_drains() {
    let (mut sim, _) = new_sim();
    let id = deployed(&mut sim, "Alan Turing", "week_1");
    sim.set_phase(Phase::Phase2).unwrap();
    let buffer = sim.state().metrics.liquidity_buffer;

    act(&mut sim, &id, "reduce_exposure", json!({"pct": 75}));
    assert_eq!(lender(&sim, &id).exposure_pct, 25);
    assert!(sim.state().metrics.liquidity_buffer <= buffer - 3_750_000_000);

    act(&mut sim, &id, "reduce_exposure", json!({"pct": 50}));
    assert_eq!(lender(&sim, &id).exposure_pct, 10);
}

#[test]
fn test_add_more_is_bounded() {
    let (mut sim, _) = new_sim();
    let id = deployed(&mut sim, "Alan Turing", "overnight");
    sim.set_phase(Phase::Phase2).unwrap();
    let before = sim.state().participant(&id).unwrap().clone();

    act(&mut sim, &id, "add_more", json!({"amount": 600_000_000}));
    let after = sim.state().participant(&id).unwrap();
    assert_eq!(after.balance, before.balance + 50_000_000_000);
    assert_eq!(after.principal, before.principal + 50_000_000_000);

    assert_eq!(
        rejected(&mut sim, &id, "add_more", json!({"amount": -5})),
        ActionError::rejected("Amount must be positive")
    );
}

#[test]
fn test_lender_cannot_use_depositor_actions() {
    let (mut sim, _) = new_sim();
    let id = deployed(&mut sim, "Alan Turing", "overnight");
    sim.set_phase(Phase::Phase2).unwrap();
    assert!(matches!(
        rejected(&mut sim, &id, "upgrade_premier", Value::Null),
        ActionError::NotAvailable { .. }
    ));
}

// ============================================================================
// Phases 3 and 4
// ============================================================================

#[test]
fn test_punitive_and_partial_rollover() {
    let (mut sim, _) = new_sim();
    let id = deployed(&mut sim, "Alan Turing", "overnight");
    sim.set_phase(Phase::Phase2).unwrap();
    sim.set_phase(Phase::Phase3).unwrap();
    let libor = sim.state().metrics.libor_pct;

    act(&mut sim, &id, "punitive_spread", Value::Null);
    assert_eq!(lender(&sim, &id).spread_bps_override, 200);
    assert!((sim.state().metrics.libor_pct - (libor + 0.25)).abs() < 1e-9);

    for expected in [75, 50, 25, 20, 20] {
        act(&mut sim, &id, "partial_rollover", Value::Null);
        assert_eq!(lender(&sim, &id).exposure_pct, expected);
    }
}

#[test]
fn test_refusal_stops_accrual_and_is_reported() {
    let (mut sim, clock) = new_sim();
    let refuser = deployed(&mut sim, "Alan Turing", "overnight");
    deployed(&mut sim, "Joan Clarke", "overnight");
    sim.set_phase(Phase::Phase2).unwrap();
    sim.set_phase(Phase::Phase3).unwrap();
    assert_eq!(sim.classroom_report().wholesale.refused_count, 0);

    act(&mut sim, &refuser, "refuse_rollover", Value::Null);
    assert_eq!(lender(&sim, &refuser).refused_at, Some(Phase::Phase3));
    assert!(sim
        .state()
        .session
        .feed
        .iter()
        .any(|e| e.kind == FeedKind::Critical && e.text == "Alan Turing refused rollover."));

    let balance = sim.state().participant(&refuser).unwrap().balance;
    tick_n(&mut sim, &clock, 5);
    assert_eq!(sim.state().participant(&refuser).unwrap().balance, balance);

    let report = sim.classroom_report().wholesale;
    assert_eq!(report.refused_count, 1);
    assert_eq!(report.total_wholesale, 2);
    assert_eq!(
        rejected(&mut sim, &refuser, "rollover", Value::Null),
        ActionError::Spectator
    );
}

#[test]
fn test_final_window_choices() {
    let (mut sim, _) = new_sim();
    let holder = deployed(&mut sim, "Alan Turing", "overnight");
    let runner = deployed(&mut sim, "Joan Clarke", "overnight");
    for phase in [Phase::Phase2, Phase::Phase3, Phase::Phase4] {
        sim.set_phase(phase).unwrap();
    }

    act(&mut sim, &holder, "final_hold", Value::Null);
    act(&mut sim, &runner, "final_refuse", Value::Null);

    assert!(lender(&sim, &holder).held_through_resolution);
    assert_eq!(lender(&sim, &runner).refused_at, Some(Phase::Phase4));
    assert_eq!(sim.classroom_report().wholesale.refused_count, 1);
}
