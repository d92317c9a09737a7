//! Liquidity Model Tests
//!
//! Maturity bucketing, buffer drain, the organic collapse rule and the
//! post-rescue regain, driven through the engine.

use bank_run_core::models::event::FeedKind;
use bank_run_core::{
    BankStatus, JoinRequest, ManualClock, Phase, Simulation, SimulationConfig,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const START: u64 = 1_700_000_000_000;

fn new_sim() -> (Simulation, ManualClock) {
    let clock = ManualClock::new(START);
    let sim = Simulation::new(SimulationConfig::default(), Box::new(clock.clone()))
        .expect("default config is valid");
    (sim, clock)
}

fn join(sim: &mut Simulation, name: &str, wholesale: bool) -> String {
    let mut answers = BTreeMap::new();
    if wholesale {
        for (q, a) in [("q1", "a"), ("q2", "b"), ("q3", "b")] {
            answers.insert(q.to_string(), a.to_string());
        }
    }
    let token = sim.session_info().join_token;
    sim.join(&JoinRequest {
        display_name: name.to_string(),
        token,
        quiz_answers: answers,
        ..Default::default()
    })
    .expect("join succeeds")
    .participant_id
}

fn act(sim: &mut Simulation, id: &str, action: &str, payload: Value) {
    sim.submit_action(id, action, &payload)
        .unwrap_or_else(|e| panic!("{} rejected: {}", action, e));
}

fn tick(sim: &mut Simulation, clock: &ManualClock) -> bank_run_core::TickReport {
    clock.advance_ms(2_000);
    sim.tick()
}

fn buffer(sim: &Simulation) -> i64 {
    sim.state().metrics.liquidity_buffer
}

// ============================================================================
// Buckets
// ============================================================================

#[test]
fn test_liabilities_bucketed_by_tenor_and_exposure() {
    let (mut sim, _) = new_sim();
    let saver = join(&mut sim, "Ada Lovelace", false);
    let lender = join(&mut sim, "Alan Turing", true);
    sim.set_phase(Phase::Phase1).unwrap();

    act(&mut sim, &saver, "select_product", json!({"product": "bond_3y"}));
    act(&mut sim, &saver, "phase1_confirm", Value::Null);
    act(&mut sim, &lender, "select_facility", json!({"facility": "month_3"}));
    act(&mut sim, &lender, "phase1_deploy", Value::Null);

    let liabilities = sim.state().metrics.liability_buckets;
    assert_eq!(liabilities.twelve_to_thirty_six, 1_000_000);
    assert_eq!(liabilities.zero_to_three, 50_000_000_000);
    assert_eq!(liabilities.three_to_twelve, 0);

    sim.set_phase(Phase::Phase2).unwrap();
    act(&mut sim, &lender, "reduce_exposure", json!({"pct": 50}));
    assert_eq!(
        sim.state().metrics.liability_buckets.zero_to_three,
        25_000_000_000
    );
}

#[test]
fn test_unconfirmed_phase1_choices_hold_no_liability() {
    let (mut sim, _) = new_sim();
    let saver = join(&mut sim, "Ada Lovelace", false);
    sim.set_phase(Phase::Phase1).unwrap();
    act(&mut sim, &saver, "select_product", json!({"product": "fixed_1y"}));
    assert_eq!(sim.state().metrics.liability_buckets.total(), 0);
}

#[test]
fn test_gap_table_in_snapshot() {
    let (mut sim, _) = new_sim();
    let saver = join(&mut sim, "Ada Lovelace", false);
    sim.set_phase(Phase::Phase1).unwrap();
    act(&mut sim, &saver, "select_product", json!({"product": "current"}));
    act(&mut sim, &saver, "phase1_confirm", Value::Null);

    let snapshot = sim.snapshot(None);
    let rows = &snapshot.metrics.gap_table;
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3].bucket, "36m+");
    for row in rows {
        assert_eq!(row.net_gap, row.assets - row.liabilities);
    }
    let total: i64 = rows.iter().map(|r| r.net_gap).sum();
    assert_eq!(snapshot.metrics.cumulative_gap.last().unwrap().value, total);
}

// ============================================================================
// Buffer
// ============================================================================

#[test]
fn test_base_drain_per_tick() {
    let (mut sim, clock) = new_sim();
    join(&mut sim, "Ada Lovelace", false);
    sim.set_phase(Phase::Phase1).unwrap();
    let before = buffer(&sim);
    tick(&mut sim, &clock);
    assert_eq!(buffer(&sim), before - 22_000_000);
}

#[test]
fn test_no_drain_in_lobby() {
    let (mut sim, clock) = new_sim();
    join(&mut sim, "Ada Lovelace", false);
    let before = buffer(&sim);
    tick(&mut sim, &clock);
    tick(&mut sim, &clock);
    assert_eq!(buffer(&sim), before);
}

#[test]
fn test_buffer_never_rises_without_rescue() {
    let (mut sim, clock) = new_sim();
    let saver = join(&mut sim, "Ada Lovelace", false);
    let lender = join(&mut sim, "Alan Turing", true);
    let mut last = buffer(&sim);
    let mut check = |sim: &Simulation| {
        assert!(buffer(sim) <= last);
        last = buffer(sim);
    };

    sim.set_phase(Phase::Phase1).unwrap();
    act(&mut sim, &saver, "select_product", json!({"product": "fixed_1y"}));
    check(&sim);
    act(&mut sim, &saver, "phase1_confirm", Value::Null);
    check(&sim);
    act(&mut sim, &lender, "select_facility", json!({"facility": "overnight"}));
    check(&sim);
    act(&mut sim, &lender, "phase1_deploy", Value::Null);
    check(&sim);
    tick(&mut sim, &clock);
    check(&sim);

    sim.set_phase(Phase::Phase2).unwrap();
    sim.trigger_event("PREPAY_SLOW").unwrap();
    check(&sim);
    act(&mut sim, &lender, "reduce_exposure", json!({"pct": 25}));
    check(&sim);
    act(&mut sim, &saver, "early_exit", json!({"confirmStep": "double"}));
    check(&sim);
    tick(&mut sim, &clock);
    check(&sim);

    sim.set_phase(Phase::Phase3).unwrap();
    act(&mut sim, &lender, "refuse_rollover", Value::Null);
    check(&sim);
    for _ in 0..3 {
        tick(&mut sim, &clock);
        check(&sim);
    }
}

#[test]
fn test_stress_phase_widens_bid_offer_spread() {
    let (mut sim, clock) = new_sim();
    join(&mut sim, "Ada Lovelace", false);
    sim.set_phase(Phase::Phase1).unwrap();
    sim.set_phase(Phase::Phase2).unwrap();
    tick(&mut sim, &clock);
    let calm = sim.state().metrics.asset_liquidity.bid_offer_spread_pct;
    tick(&mut sim, &clock);
    assert_eq!(sim.state().metrics.asset_liquidity.bid_offer_spread_pct, calm);

    sim.set_phase(Phase::Phase3).unwrap();
    tick(&mut sim, &clock);
    assert!(sim.state().metrics.asset_liquidity.bid_offer_spread_pct > calm);
}

// ============================================================================
// Terminal Rules
// ============================================================================

#[test]
fn test_collapse_triggers_exactly_once() {
    let (mut sim, clock) = new_sim();
    let lenders: Vec<String> = ["Alan Turing", "Joan Clarke", "Tommy Flowers", "Gordon Welchman"]
        .iter()
        .map(|name| join(&mut sim, name, true))
        .collect();
    sim.set_phase(Phase::Phase1).unwrap();
    sim.set_phase(Phase::Phase2).unwrap();
    sim.set_phase(Phase::Phase3).unwrap();
    sim.trigger_event("BBC_LEAK").unwrap();
    for id in &lenders {
        act(&mut sim, id, "refuse_rollover", Value::Null);
    }

    let mut collapses = 0;
    for _ in 0..200 {
        let before = buffer(&sim);
        let report = tick(&mut sim, &clock);
        if report.collapsed {
            collapses += 1;
            assert_eq!(buffer(&sim), 0);
            assert!(before > 0);
        }
        if sim.state().session.bank_status == BankStatus::Collapsed {
            assert_eq!(sim.state().session.phase, Phase::End);
        }
    }

    assert_eq!(collapses, 1);
    let session = &sim.state().session;
    assert_eq!(session.bank_status, BankStatus::Collapsed);
    assert!(session.reveal_names);
    assert_eq!(
        session
            .feed
            .count_matching(FeedKind::Critical, "Granite Bank collapsed"),
        1
    );
    assert!(sim.apply_resolution_decision("rescue").is_err());
}

#[test]
fn test_rescue_regains_buffer_up_to_ceiling() {
    let (mut sim, clock) = new_sim();
    join(&mut sim, "Alan Turing", true);
    for phase in [Phase::Phase1, Phase::Phase2, Phase::Phase3, Phase::Phase4] {
        sim.set_phase(phase).unwrap();
    }
    sim.apply_resolution_decision("rescue").unwrap();

    let mut last = buffer(&sim);
    for _ in 0..50 {
        tick(&mut sim, &clock);
        let now = buffer(&sim);
        assert!(now >= last);
        assert!(now <= 140_000_000_000.max(last));
        last = now;
    }
    assert_eq!(sim.state().session.bank_status, BankStatus::Rescued);
}
