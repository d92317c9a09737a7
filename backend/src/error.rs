//! Error types
//!
//! Every rejection is terminal for the call that produced it and leaves
//! state untouched. Callers branch on [`SimulationError::kind`].

use crate::identity::IdentityError;
use crate::models::catalog::Role;
use crate::models::session::Phase;
use thiserror::Error;

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or ineligible input
    Validation,
    /// Input is well-formed but conflicts with current state
    StateConflict,
    /// Unknown participant or resume token
    NotFound,
    /// Persistence collaborator failure
    Storage,
}

/// Rejected participant action
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    #[error("Actions disabled in current phase")]
    PhaseClosed,

    #[error("You already exited. You are now a spectator.")]
    Spectator,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },

    #[error("Action not available for {role} in this phase")]
    NotAvailable { role: Role },

    /// Rule-specific rejection with a participant-facing reason
    #[error("{0}")]
    Rejected(String),
}

impl ActionError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ActionError::Rejected(reason.into())
    }
}

/// Rejected facilitator command
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Phase transition blocked. Move sequentially from {from} to the next phase.")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Invalid phase: {0}")]
    UnknownPhase(String),

    #[error("Unknown event trigger: {0}")]
    UnknownEvent(String),

    #[error("Event {key} is not available in {phase}.")]
    EventWrongPhase { key: String, phase: Phase },

    #[error("Event {0} already triggered.")]
    EventAlreadyFired(String),

    #[error("Invalid BoE decision: {0}")]
    InvalidDecision(String),

    #[error("BoE decision already made")]
    DecisionAlreadyMade,

    #[error("Message cannot be empty")]
    EmptyBroadcast,
}

/// Rejected join attempt
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JoinError {
    #[error("ID name extraction failed. Capture a clearer ID photo.")]
    NameTooShort,

    #[error("Invalid session code")]
    InvalidCode,

    #[error("Join QR is expired. Ask game master to refresh.")]
    CredentialExpired,

    #[error("This ID name is already joined in the session.")]
    DuplicateName,
}

/// Persistence failure
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint checksum mismatch")]
    ChecksumMismatch,

    #[error("Checkpoint was written with a different configuration")]
    ConfigMismatch,

    #[error("Unsupported checkpoint version {0}")]
    UnsupportedVersion(u32),
}

/// Umbrella error for every engine operation
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Player not found: {0}")]
    ParticipantNotFound(String),

    #[error("Player session not found")]
    ResumeTokenNotFound,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl SimulationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimulationError::Action(_) => ErrorKind::Validation,
            SimulationError::Session(e) => match e {
                SessionError::InvalidTransition { .. }
                | SessionError::EventAlreadyFired(_)
                | SessionError::DecisionAlreadyMade => ErrorKind::StateConflict,
                _ => ErrorKind::Validation,
            },
            SimulationError::Join(e) => match e {
                JoinError::DuplicateName | JoinError::CredentialExpired => {
                    ErrorKind::StateConflict
                }
                _ => ErrorKind::Validation,
            },
            SimulationError::Persistence(_) => ErrorKind::Storage,
            SimulationError::Identity(_) => ErrorKind::Validation,
            SimulationError::ParticipantNotFound(_) | SimulationError::ResumeTokenNotFound => {
                ErrorKind::NotFound
            }
            SimulationError::InvalidConfig(_) => ErrorKind::Validation,
        }
    }
}
