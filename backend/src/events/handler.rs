//! Scenario event execution
//!
//! Validates a trigger against the event table and the session, then applies
//! the transform and records the firing.

use crate::error::SessionError;
use crate::events::types::ScenarioEventKey;
use crate::models::event::FeedKind;
use crate::models::state::GameState;

/// Fire the scenario event named `key`
///
/// Rejects unknown keys, keys outside their allowed phases, and keys that
/// already fired this session. Nothing is mutated on rejection.
pub fn trigger_event(
    state: &mut GameState,
    key: &str,
    now_ms: u64,
) -> Result<ScenarioEventKey, SessionError> {
    let key: ScenarioEventKey = key.parse().map_err(SessionError::UnknownEvent)?;
    let definition = key.definition();
    let phase = state.session.phase;

    if !key.allowed_in(phase) {
        return Err(SessionError::EventWrongPhase {
            key: key.to_string(),
            phase,
        });
    }
    if state.session.has_fired(key) {
        return Err(SessionError::EventAlreadyFired(key.to_string()));
    }

    (definition.apply)(&mut state.metrics);
    state.session.active_events.push(key);
    state
        .session
        .event_triggered_at
        .insert(key.to_string(), now_ms);
    state
        .session
        .feed
        .push(FeedKind::Alert, definition.message, now_ms);

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::models::session::Phase;

    fn state_in(phase: Phase) -> GameState {
        let mut state = GameState::new(&SimulationConfig::default(), 0);
        state.session.phase = phase;
        state
    }

    #[test]
    fn test_fires_once() {
        let mut state = state_in(Phase::Phase2);
        assert_eq!(
            trigger_event(&mut state, "LIBOR_RISE", 5),
            Ok(ScenarioEventKey::LiborRise)
        );
        assert_eq!(
            trigger_event(&mut state, "LIBOR_RISE", 6),
            Err(SessionError::EventAlreadyFired("LIBOR_RISE".to_string()))
        );
        assert_eq!(state.session.active_events, vec![ScenarioEventKey::LiborRise]);
        assert_eq!(state.session.event_triggered_at.get("LIBOR_RISE"), Some(&5));
    }

    #[test]
    fn test_wrong_phase_leaves_state_untouched() {
        let mut state = state_in(Phase::Phase1);
        let before = state.metrics.clone();
        assert!(matches!(
            trigger_event(&mut state, "BBC_LEAK", 1),
            Err(SessionError::EventWrongPhase { .. })
        ));
        assert_eq!(state.metrics, before);
        assert!(state.session.active_events.is_empty());
        assert!(state.session.feed.is_empty());
    }

    #[test]
    fn test_unknown_key() {
        let mut state = state_in(Phase::Phase2);
        assert_eq!(
            trigger_event(&mut state, "ALIENS", 1),
            Err(SessionError::UnknownEvent("ALIENS".to_string()))
        );
    }
}
