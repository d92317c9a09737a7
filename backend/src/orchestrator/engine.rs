//! Simulation Engine
//!
//! The single owner of the game state. Every facilitator command, every
//! participant action and every scheduler tick goes through [`Simulation`],
//! one at a time, via `&mut self`.
//!
//! # Request flow
//!
//! ```text
//! action ─▶ parse ─▶ validate + apply (actions) ─▶ recompute (liquidity) ─▶ snapshot
//! tick   ─▶ accrue ──────────────────────────────▶ recompute (liquidity)
//! ```
//!
//! Phase changes, scenario events and the rescue decision do not recompute;
//! the next action or tick picks up their effects.
//!
//! # Example
//!
//! ```rust
//! use bank_run_core::core::time::ManualClock;
//! use bank_run_core::orchestrator::JoinRequest;
//! use bank_run_core::{Phase, Simulation, SimulationConfig};
//!
//! let clock = ManualClock::new(1_700_000_000_000);
//! let mut sim = Simulation::new(SimulationConfig::default(), Box::new(clock.clone())).unwrap();
//!
//! let info = sim.session_info();
//! let receipt = sim
//!     .join(&JoinRequest {
//!         display_name: "Ada Lovelace".to_string(),
//!         token: info.join_token,
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! sim.set_phase(Phase::Phase1).unwrap();
//! let id = &receipt.participant_id;
//! sim.submit_action(id, "select_product", &serde_json::json!({"product": "fixed_1y"}))
//!     .unwrap();
//! sim.submit_action(id, "phase1_confirm", &serde_json::Value::Null)
//!     .unwrap();
//!
//! clock.advance_ms(2_000);
//! let tick = sim.tick();
//! assert_eq!(tick.ticks, 1);
//! ```

use crate::actions::{apply_action, Action, ActionContext};
use crate::config::SimulationConfig;
use crate::core::time::Clock;
use crate::error::{SessionError, SimulationError};
use crate::events::{trigger_event, ScenarioEventKey};
use crate::identity::{accept_name, IdentityCapture};
use crate::liquidity::recompute;
use crate::models::catalog::Role;
use crate::models::event::FeedKind;
use crate::models::session::{JoinCredentials, Phase};
use crate::models::state::{GameState, RoleCounts};
use crate::orchestrator::accrual::accrue;
use crate::orchestrator::checkpoint::{self, compute_config_hash, StateStore};
use crate::orchestrator::controller::{self, Decision};
use crate::orchestrator::join::{admit, JoinQuiz, JoinReceipt, JoinRequest};
use crate::outcome::{classroom_report, ClassroomReport};
use crate::rng::RngManager;
use crate::snapshot::{build_snapshot, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Longest facilitator broadcast kept, in characters
pub const MAX_BROADCAST_CHARS: usize = 200;

// ============================================================================
// Result Types
// ============================================================================

/// Result of a single scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Tick counter after this tick
    pub ticks: u64,

    /// Total accrual credited across participants (pence)
    pub credited: i64,

    /// The sub-48h survival alert fired on this tick
    pub survival_alert: bool,

    /// The buffer ran dry on this tick
    pub collapsed: bool,
}

/// Facilitator join screen data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub code: String,
    pub phase: Phase,
    pub join_token: String,
    pub join_token_expires_at: u64,
    pub counts: RoleCounts,
}

// ============================================================================
// Simulation
// ============================================================================

/// The bank run engine
///
/// # Determinism
///
/// All randomness is via `rng` with seeded xorshift64*, and all timestamps
/// come from `clock`. Same seed + same clock + same commands = same state.
pub struct Simulation {
    config: SimulationConfig,

    /// SHA256 of `config`, stamped into checkpoints
    config_hash: String,

    state: GameState,

    rng: RngManager,

    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("phase", &self.state.session.phase)
            .field("participants", &self.state.participants.len())
            .field("ticks", &self.state.ticks)
            .finish()
    }
}

impl Simulation {
    /// Create a fresh session
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `config` fails validation.
    pub fn new(config: SimulationConfig, clock: Box<dyn Clock>) -> Result<Self, SimulationError> {
        config.validate().map_err(SimulationError::InvalidConfig)?;
        let config_hash = compute_config_hash(&config)?;
        let now = clock.now_ms();
        Ok(Self {
            state: GameState::new(&config, now),
            rng: RngManager::new(config.rng_seed),
            config_hash,
            config,
            clock,
        })
    }

    /// Restore from `store`, or start fresh when nothing usable is there
    ///
    /// A missing, unreadable, tampered or foreign checkpoint is not an error:
    /// the engine logs it and starts a new session. Only an invalid config
    /// fails.
    pub fn restore_or_fresh(
        config: SimulationConfig,
        clock: Box<dyn Clock>,
        store: &dyn StateStore,
    ) -> Result<Self, SimulationError> {
        let mut sim = Self::new(config, clock)?;
        match store.load() {
            Ok(Some(blob)) => match checkpoint::decode(&blob, &sim.config_hash) {
                Ok((state, rng_state)) => {
                    sim.state = state;
                    sim.rng = RngManager::new(rng_state);
                    tracing::info!(
                        phase = %sim.state.session.phase,
                        participants = sim.state.participants.len(),
                        "restored session from checkpoint"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "checkpoint rejected, starting fresh session"),
            },
            Ok(None) => tracing::info!("no checkpoint found, starting fresh session"),
            Err(e) => tracing::warn!(error = %e, "checkpoint unreadable, starting fresh session"),
        }
        Ok(sim)
    }

    /// Persist the whole state to `store`
    pub fn save(&self, store: &mut dyn StateStore) -> Result<(), SimulationError> {
        let blob = checkpoint::encode(&self.state, self.rng.get_state(), &self.config_hash)?;
        store.save(&blob)?;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Scheduler period
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.config.tick_period_ms)
    }

    // ========================================================================
    // Read Model
    // ========================================================================

    /// Current snapshot, with the participant's own view when the id is known.
    ///
    /// An unknown id (say, one held by a client across `reset_session`) still
    /// gets the public snapshot, just without a player block.
    pub fn snapshot(&self, participant_id: Option<&str>) -> Snapshot {
        let viewer = participant_id.and_then(|id| self.state.participant(id));
        build_snapshot(&self.state, &self.config, viewer, self.clock.now_ms())
    }

    pub fn classroom_report(&self) -> ClassroomReport {
        classroom_report(&self.state, self.config.protection_limit)
    }

    /// Quiz shown on the join screen, answers withheld
    pub fn join_quiz(&self) -> JoinQuiz {
        JoinQuiz::new(self.config.wholesale_quiz_threshold)
    }

    // ========================================================================
    // Participant Commands
    // ========================================================================

    /// Validate and apply one participant action, then recompute metrics
    ///
    /// On any error, state is unchanged.
    pub fn submit_action(
        &mut self,
        participant_id: &str,
        action_type: &str,
        payload: &Value,
    ) -> Result<(), SimulationError> {
        let now = self.clock.now_ms();
        let state = &mut self.state;
        let participant = state
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| SimulationError::ParticipantNotFound(participant_id.to_string()))?;

        let result = match Action::parse(action_type, payload) {
            Ok(action) => {
                let mut ctx = ActionContext {
                    phase: state.session.phase,
                    metrics: &mut state.metrics,
                    feed: &mut state.session.feed,
                    config: &self.config,
                    rng: &mut self.rng,
                    now_ms: now,
                };
                apply_action(&mut ctx, participant, action)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::debug!(
                participant = participant_id,
                action = action_type,
                error = %e,
                "action rejected"
            );
            return Err(e.into());
        }

        recompute(&mut self.state, now);
        Ok(())
    }

    /// Admit a new participant
    pub fn join(&mut self, request: &JoinRequest) -> Result<JoinReceipt, SimulationError> {
        let now = self.clock.now_ms();
        Ok(admit(&mut self.state, &self.config, request, now)?)
    }

    /// Admit a participant whose display name is read off an ID image
    ///
    /// The extracted name replaces `request.display_name`.
    pub fn join_with_id(
        &mut self,
        capture: &dyn IdentityCapture,
        image: &[u8],
        request: JoinRequest,
    ) -> Result<JoinReceipt, SimulationError> {
        let extracted = capture.extract(image)?;
        let display_name = accept_name(&extracted)?;
        tracing::debug!(
            name = %display_name,
            confidence = extracted.confidence,
            "name extracted from ID"
        );
        self.join(&JoinRequest {
            display_name,
            ..request
        })
    }

    /// Look a participant up by resume token
    pub fn resume(&self, resume_token: &str) -> Result<JoinReceipt, SimulationError> {
        let p = self
            .state
            .find_by_resume_token(resume_token)
            .ok_or(SimulationError::ResumeTokenNotFound)?;
        Ok(JoinReceipt {
            participant_id: p.id.clone(),
            name: p.name.clone(),
            role: p.role(),
            resume_token: p.resume_token.clone(),
            quiz_score: p.quiz_score,
            session_code: self.state.session.join.code.clone(),
            phase: self.state.session.phase,
        })
    }

    // ========================================================================
    // Facilitator Commands
    // ========================================================================

    /// Advance to `target`, which must be the immediate successor
    pub fn set_phase(&mut self, target: Phase) -> Result<(), SimulationError> {
        let now = self.clock.now_ms();
        controller::set_phase(&mut self.state, target, now)?;
        Ok(())
    }

    /// Fire a scenario event by key
    pub fn trigger_event(&mut self, key: &str) -> Result<ScenarioEventKey, SimulationError> {
        let now = self.clock.now_ms();
        let fired = trigger_event(&mut self.state, key, now)?;
        tracing::info!(event = %fired, "scenario event fired");
        Ok(fired)
    }

    /// Apply the terminal `rescue` / `collapse` decision
    pub fn apply_resolution_decision(&mut self, decision: &str) -> Result<Decision, SimulationError> {
        let decision: Decision = decision.parse()?;
        let now = self.clock.now_ms();
        controller::apply_decision(&mut self.state, decision, self.config.protection_limit, now)?;
        Ok(decision)
    }

    /// Replace the join token and restart its lifetime
    pub fn rotate_join_token(&mut self) -> JoinCredentials {
        let now = self.clock.now_ms();
        let session = &mut self.state.session;
        session.join.rotate(now, self.config.join_token_ttl_ms);
        session
            .feed
            .push(FeedKind::Info, "Join QR refreshed by game master.", now);
        session.join.clone()
    }

    /// Post a facilitator message to the feed
    pub fn broadcast(&mut self, message: &str) -> Result<(), SimulationError> {
        let message: String = message.trim().chars().take(MAX_BROADCAST_CHARS).collect();
        if message.is_empty() {
            return Err(SessionError::EmptyBroadcast.into());
        }
        let now = self.clock.now_ms();
        self.state.session.feed.push(FeedKind::Broadcast, message, now);
        Ok(())
    }

    /// Join screen data; an expired token is silently replaced first
    pub fn session_info(&mut self) -> SessionInfo {
        let now = self.clock.now_ms();
        let join = &mut self.state.session.join;
        if join.is_expired(now) {
            join.rotate(now, self.config.join_token_ttl_ms);
        }
        SessionInfo {
            id: self.state.session.id.clone(),
            code: self.state.session.join.code.clone(),
            phase: self.state.session.phase,
            join_token: self.state.session.join.token.clone(),
            join_token_expires_at: self.state.session.join.expires_at,
            counts: self.state.role_counts(),
        }
    }

    /// Throw the session away and start a new one
    pub fn reset_session(&mut self) {
        let now = self.clock.now_ms();
        self.state = GameState::new(&self.config, now);
        self.rng = RngManager::new(self.config.rng_seed);
        self.state
            .session
            .feed
            .push(FeedKind::Info, "System reset. Session restarted.", now);
        tracing::info!(session = %self.state.session.id, "session reset");
    }

    // ========================================================================
    // Scheduler
    // ========================================================================

    /// One accrual tick followed by a recompute
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now_ms();
        let credited = accrue(&mut self.state, now);
        let outcome = recompute(&mut self.state, now);
        if outcome.survival_alert {
            tracing::warn!(
                survival_hours = self.state.metrics.survival_hours,
                "survival horizon below 48 hours"
            );
        }
        TickReport {
            ticks: self.state.ticks,
            credited,
            survival_alert: outcome.survival_alert,
            collapsed: outcome.collapsed,
        }
    }

    /// Participants of `role`, in id order
    pub fn participant_ids(&self, role: Role) -> Vec<String> {
        self.state.by_role(role).map(|p| p.id.clone()).collect()
    }
}
