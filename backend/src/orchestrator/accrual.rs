//! Accrual scheduler step
//!
//! One tick advances every active account by a fixed slice of its annual
//! rate. The tick counter moves on every call, including lobby and end
//! where nothing accrues.

use crate::models::participant::{round_pence, Participant, RoleState};
use crate::models::session::Phase;
use crate::models::state::GameState;

/// Fraction of the annual rate credited per tick
pub const TICK_FRACTION: f64 = 0.0008;

/// Minimum exposure factor applied to a lender's balance
const MIN_WHOLESALE_EXPOSURE: f64 = 0.1;

/// Annual rate in percent currently earned by `participant`
///
/// Zero until the phase-1 choice is committed.
pub fn effective_rate_pct(participant: &Participant, phase: Phase, libor_pct: f64) -> f64 {
    match &participant.state {
        RoleState::Depositor(d) => {
            if phase == Phase::Phase1 && !d.confirmed() {
                0.0
            } else {
                d.effective_product().rate_pct()
            }
        }
        RoleState::Wholesale(w) => {
            if phase == Phase::Phase1 && !w.deployed() {
                0.0
            } else {
                libor_pct
                    + w.effective_facility().spread_bps() as f64 / 100.0
                    + w.spread_bps_override as f64 / 100.0
            }
        }
    }
}

fn exposure_factor(participant: &Participant) -> f64 {
    match &participant.state {
        RoleState::Depositor(_) => 1.0,
        RoleState::Wholesale(w) => w.exposure_fraction().max(MIN_WHOLESALE_EXPOSURE),
    }
}

/// Gain for one tick at the current balance
pub fn tick_gain(participant: &Participant, phase: Phase, libor_pct: f64) -> i64 {
    let rate = effective_rate_pct(participant, phase, libor_pct);
    round_pence(participant.balance as f64 * exposure_factor(participant) * rate / 100.0 * TICK_FRACTION)
}

/// Advance the tick counter and credit accrual to every active participant
///
/// Returns the total credited.
pub fn accrue(state: &mut GameState, now_ms: u64) -> i64 {
    state.ticks += 1;
    state.last_tick_at = now_ms;

    let phase = state.session.phase;
    if !phase.accepts_actions() {
        return 0;
    }

    let libor = state.metrics.libor_pct;
    let mut credited = 0;
    for participant in state.participants.values_mut() {
        if participant.is_spectator() {
            continue;
        }
        let gain = tick_gain(participant, phase, libor);
        participant.balance += gain;
        credited += gain;
    }
    credited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::models::catalog::{Facility, Product, Role};
    use crate::models::participant::{Commitment, DepositorExit};

    fn committed_depositor(product: Product) -> Participant {
        let mut p = Participant::new(Role::Depositor, "Ada".to_string(), 0, 40);
        if let RoleState::Depositor(d) = &mut p.state {
            d.selection = Commitment::Committed(product);
            d.product = Some(product);
        }
        p
    }

    #[test]
    fn test_rate_zero_before_commit_in_phase1() {
        let p = Participant::new(Role::Depositor, "Ada".to_string(), 0, 40);
        assert_eq!(effective_rate_pct(&p, Phase::Phase1, 5.25), 0.0);
        assert_eq!(effective_rate_pct(&p, Phase::Phase2, 5.25), 2.1);

        let w = Participant::new(Role::Wholesale, "Grace".to_string(), 0, 40);
        assert_eq!(effective_rate_pct(&w, Phase::Phase1, 5.25), 0.0);
    }

    #[test]
    fn test_wholesale_rate_adds_spreads() {
        let mut p = Participant::new(Role::Wholesale, "Grace".to_string(), 0, 40);
        if let RoleState::Wholesale(w) = &mut p.state {
            w.selection = Commitment::Committed(Facility::Overnight);
            w.facility = Some(Facility::Overnight);
            w.spread_bps_override = 150;
        }
        let expected = 5.25 + Facility::Overnight.spread_bps() as f64 / 100.0 + 1.5;
        assert!((effective_rate_pct(&p, Phase::Phase1, 5.25) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_depositor_tick_gain() {
        let p = committed_depositor(Product::Bond3y);
        // 1_000_000 * 9.8% * 0.0008 = 78.4
        assert_eq!(tick_gain(&p, Phase::Phase1, 5.25), 78);
    }

    #[test]
    fn test_lender_exposure_floor() {
        let lender = |pct: u32| {
            let mut p = Participant::new(Role::Wholesale, "Grace".to_string(), 0, 40);
            if let RoleState::Wholesale(w) = &mut p.state {
                w.exposure_pct = pct;
            }
            p
        };
        let floor = tick_gain(&lender(10), Phase::Phase2, 5.25);
        assert!(floor > 0);
        assert_eq!(tick_gain(&lender(0), Phase::Phase2, 5.25), floor);
        assert!(tick_gain(&lender(100), Phase::Phase2, 5.25) > floor);
    }

    #[test]
    fn test_accrue_skips_spectators_and_closed_phases() {
        let mut state = GameState::new(&SimulationConfig::default(), 0);
        let active = committed_depositor(Product::Current);
        let mut exited = committed_depositor(Product::Current);
        if let RoleState::Depositor(d) = &mut exited.state {
            d.exit = Some(DepositorExit::at(Phase::Phase2));
        }
        let (active_id, exited_id) = (active.id.clone(), exited.id.clone());
        state.participants.insert(active_id.clone(), active);
        state.participants.insert(exited_id.clone(), exited);

        assert_eq!(accrue(&mut state, 10), 0);
        assert_eq!(state.ticks, 1);
        assert_eq!(state.last_tick_at, 10);

        state.session.phase = Phase::Phase2;
        let credited = accrue(&mut state, 20);
        assert!(credited > 0);
        assert_eq!(state.participant(&active_id).unwrap().balance, 1_000_000 + credited);
        assert_eq!(state.participant(&exited_id).unwrap().balance, 1_000_000);
        assert_eq!(state.ticks, 2);
    }
}
