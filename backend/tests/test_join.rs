//! Join Tests
//!
//! Admission checks in order, role assignment from the quiz and quotas,
//! resume tokens, and joining from an ID card capture.

use bank_run_core::{
    ErrorKind, JoinError, JoinRequest, ManualClock, OcrTextCapture, Role, Simulation,
    SimulationConfig, SimulationError,
};
use std::collections::BTreeMap;

const START: u64 = 1_700_000_000_000;

fn sim_with(config: SimulationConfig) -> (Simulation, ManualClock) {
    let clock = ManualClock::new(START);
    let sim = Simulation::new(config, Box::new(clock.clone())).expect("config is valid");
    (sim, clock)
}

fn new_sim() -> (Simulation, ManualClock) {
    sim_with(SimulationConfig::default())
}

fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(q, a)| (q.to_string(), a.to_string()))
        .collect()
}

fn request(sim: &mut Simulation, name: &str) -> JoinRequest {
    JoinRequest {
        display_name: name.to_string(),
        token: sim.session_info().join_token,
        ..Default::default()
    }
}

fn join_error(result: Result<bank_run_core::JoinReceipt, SimulationError>) -> JoinError {
    match result {
        Err(SimulationError::Join(e)) => e,
        other => panic!("expected a join error, got {:?}", other),
    }
}

// ============================================================================
// Admission
// ============================================================================

#[test]
fn test_name_is_normalized() {
    let (mut sim, _) = new_sim();
    let req = request(&mut sim, "   Ada \t  Lovelace  ");
    let receipt = sim.join(&req).unwrap();
    assert_eq!(receipt.name, "Ada Lovelace");
    assert_eq!(receipt.role, Role::Depositor);
    assert_eq!(receipt.session_code, sim.session_info().code);
    assert!(sim
        .state()
        .session
        .feed
        .iter()
        .any(|e| e.text == "Ada Lovelace joined as depositor (quiz 0/3)."));
}

#[test]
fn test_short_name_rejected_first() {
    let (mut sim, _) = new_sim();
    let mut req = request(&mut sim, " Al ");
    req.token = "stale".to_string();
    req.code = Some("WRONG".to_string());
    let err = join_error(sim.join(&req));
    assert_eq!(err, JoinError::NameTooShort);
    assert_eq!(sim.state().participants().count(), 0);
}

#[test]
fn test_session_code_checked_when_given() {
    let (mut sim, _) = new_sim();
    let code = sim.session_info().code;

    let mut req = request(&mut sim, "Ada Lovelace");
    req.code = Some("NOPE00".to_string());
    assert_eq!(join_error(sim.join(&req)), JoinError::InvalidCode);

    req.code = Some(code.to_lowercase());
    assert!(sim.join(&req).is_ok());

    let mut blank = request(&mut sim, "Grace Hopper");
    blank.code = Some(String::new());
    assert!(sim.join(&blank).is_ok());
}

#[test]
fn test_expired_and_rotated_tokens() {
    let (mut sim, clock) = new_sim();
    let stale = request(&mut sim, "Ada Lovelace");

    clock.advance_ms(10 * 60 * 1_000 + 1);
    let err = sim.join(&stale).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(matches!(err, SimulationError::Join(JoinError::CredentialExpired)));

    let fresh = request(&mut sim, "Ada Lovelace");
    assert_ne!(fresh.token, stale.token);
    sim.rotate_join_token();
    assert_eq!(join_error(sim.join(&fresh)), JoinError::CredentialExpired);

    let current = request(&mut sim, "Ada Lovelace");
    assert!(sim.join(&current).is_ok());
}

#[test]
fn test_duplicate_names_ignore_case_and_punctuation() {
    let (mut sim, _) = new_sim();
    let first = request(&mut sim, "Ada Lovelace");
    sim.join(&first).unwrap();

    let again = request(&mut sim, "ADA-lovelace!");
    let err = sim.join(&again).unwrap_err();
    assert!(matches!(err, SimulationError::Join(JoinError::DuplicateName)));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(sim.state().participants().count(), 1);
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn test_quiz_decides_role() {
    let (mut sim, _) = new_sim();

    let mut lender = request(&mut sim, "Alan Turing");
    lender.quiz_answers = answers(&[("q1", "a"), ("q2", "b"), ("q3", "c")]);
    let receipt = sim.join(&lender).unwrap();
    assert_eq!(receipt.quiz_score, 2);
    assert_eq!(receipt.role, Role::Wholesale);
    assert_eq!(
        sim.state().participant(&receipt.participant_id).unwrap().balance,
        50_000_000_000
    );

    let mut saver = request(&mut sim, "Ada Lovelace");
    saver.quiz_answers = answers(&[("q1", "a"), ("q2", "a"), ("q3", "a")]);
    let receipt = sim.join(&saver).unwrap();
    assert_eq!(receipt.quiz_score, 1);
    assert_eq!(receipt.role, Role::Depositor);
    assert_eq!(
        sim.state().participant(&receipt.participant_id).unwrap().balance,
        1_000_000
    );
}

#[test]
fn test_full_quota_forces_other_role() {
    let config = SimulationConfig {
        wholesale_target: 1,
        depositor_target: 1,
        ..SimulationConfig::default()
    };
    let (mut sim, _) = sim_with(config);
    let perfect = answers(&[("q1", "a"), ("q2", "b"), ("q3", "b")]);

    let mut first = request(&mut sim, "Alan Turing");
    first.quiz_answers = perfect.clone();
    assert_eq!(sim.join(&first).unwrap().role, Role::Wholesale);

    let mut second = request(&mut sim, "Joan Clarke");
    second.quiz_answers = perfect;
    assert_eq!(sim.join(&second).unwrap().role, Role::Depositor);

    let counts = sim.session_info().counts;
    assert_eq!(counts.wholesale, 1);
    assert_eq!(counts.depositor, 1);
}

#[test]
fn test_quiz_hides_answers() {
    let (sim, _) = new_sim();
    let quiz = serde_json::to_value(sim.join_quiz()).unwrap();
    assert_eq!(quiz["threshold"], 2);
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|q| q.get("correct").is_none()));
}

// ============================================================================
// Resume And Identity Capture
// ============================================================================

#[test]
fn test_resume_returns_same_participant() {
    let (mut sim, _) = new_sim();
    let req = request(&mut sim, "Ada Lovelace");
    let receipt = sim.join(&req).unwrap();

    let resumed = sim.resume(&receipt.resume_token).unwrap();
    assert_eq!(resumed, receipt);

    let err = sim.resume("not-a-token").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_join_from_id_card_text() {
    let (mut sim, _) = new_sim();
    let card = b"NATIONAL UNIVERSITY\nStudent ID\nName\nMary Somerville\nValid 2027";
    let req = request(&mut sim, "whatever was typed");
    let receipt = sim.join_with_id(&OcrTextCapture, card, req).unwrap();
    assert_eq!(receipt.name, "MARY SOMERVILLE");

    let again = request(&mut sim, "");
    let err = sim.join_with_id(&OcrTextCapture, card, again).unwrap_err();
    assert!(matches!(err, SimulationError::Join(JoinError::DuplicateName)));
}

#[test]
fn test_unreadable_card_rejected() {
    let (mut sim, _) = new_sim();
    let req = request(&mut sim, "Ada Lovelace");
    let err = sim
        .join_with_id(&OcrTextCapture, &[0xff, 0xfe, 0x00], req)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(sim.state().participants().count(), 0);
}
