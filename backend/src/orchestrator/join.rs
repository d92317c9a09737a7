//! Joining the session
//!
//! A student joins with a name taken from their ID, the join credentials
//! shown on the facilitator screen and their answers to a three-question
//! quiz. The quiz score decides the role unless a quota is already full.
//!
//! Checks run in a fixed order (name, code, token, duplicate) and the first
//! failure wins; nothing is written until all of them pass.

use crate::config::SimulationConfig;
use crate::error::JoinError;
use crate::models::catalog::Role;
use crate::models::event::FeedKind;
use crate::models::participant::Participant;
use crate::models::session::Phase;
use crate::models::state::{GameState, RoleCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest display name kept, in characters
pub const MAX_NAME_CHARS: usize = 40;
/// Shortest acceptable display name, in characters
pub const MIN_NAME_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizOption {
    pub id: &'static str,
    pub text: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizQuestion {
    pub id: &'static str,
    pub prompt: &'static str,
    pub options: &'static [QuizOption],
    #[serde(skip)]
    pub correct: &'static str,
}

pub const QUIZ: [QuizQuestion; 3] = [
    QuizQuestion {
        id: "q1",
        prompt: "If all lenders demand repayment at once, what risk is most immediate?",
        options: &[
            QuizOption { id: "a", text: "Liquidity risk" },
            QuizOption { id: "b", text: "FX translation risk" },
            QuizOption { id: "c", text: "Tax accounting risk" },
        ],
        correct: "a",
    },
    QuizQuestion {
        id: "q2",
        prompt: "LCR below 100% signals that:",
        options: &[
            QuizOption {
                id: "a",
                text: "The bank has enough high-quality liquid assets for stressed outflows",
            },
            QuizOption {
                id: "b",
                text: "The bank may not have enough liquid assets for stressed outflows",
            },
            QuizOption { id: "c", text: "The bank is automatically insolvent" },
        ],
        correct: "b",
    },
    QuizQuestion {
        id: "q3",
        prompt: "In a bank run, which usually leaves faster?",
        options: &[
            QuizOption { id: "a", text: "Long-term insured retail deposits" },
            QuizOption { id: "b", text: "Short-term wholesale funding" },
            QuizOption { id: "c", text: "Core equity capital" },
        ],
        correct: "b",
    },
];

/// Quiz as shown to a joining student (answers withheld)
#[derive(Debug, Clone, Serialize)]
pub struct JoinQuiz {
    pub threshold: u32,
    pub questions: Vec<QuizQuestion>,
}

impl JoinQuiz {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            questions: QUIZ.to_vec(),
        }
    }
}

/// Inbound join request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinRequest {
    pub display_name: String,
    pub code: Option<String>,
    pub token: String,
    pub quiz_answers: BTreeMap<String, String>,
}

/// What a successful join returns to the student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReceipt {
    pub participant_id: String,
    pub name: String,
    pub role: Role,
    pub resume_token: String,
    pub quiz_score: u32,
    pub session_code: String,
    pub phase: Phase,
}

/// Trim, collapse inner whitespace and cap the length
pub fn normalize_display_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Key used to detect the same person joining twice
///
/// Lowercase letters only; everything else separates words.
pub fn duplicate_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Number of correct answers
pub fn score_quiz(answers: &BTreeMap<String, String>) -> u32 {
    QUIZ.iter()
        .filter(|q| answers.get(q.id).map(String::as_str) == Some(q.correct))
        .count() as u32
}

/// Role for the next participant
///
/// A full quota forces the other role; otherwise the quiz decides.
pub fn assign_role(counts: RoleCounts, quiz_score: u32, config: &SimulationConfig) -> Role {
    if counts.wholesale >= config.wholesale_target {
        Role::Depositor
    } else if counts.depositor >= config.depositor_target {
        Role::Wholesale
    } else if quiz_score >= config.wholesale_quiz_threshold {
        Role::Wholesale
    } else {
        Role::Depositor
    }
}

/// Validate `request` and add the new participant
pub fn admit(
    state: &mut GameState,
    config: &SimulationConfig,
    request: &JoinRequest,
    now_ms: u64,
) -> Result<JoinReceipt, JoinError> {
    let name = normalize_display_name(&request.display_name);
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(JoinError::NameTooShort);
    }

    let join = &state.session.join;
    if let Some(code) = request.code.as_deref().filter(|c| !c.is_empty()) {
        if !code.eq_ignore_ascii_case(&join.code) {
            return Err(JoinError::InvalidCode);
        }
    }
    if request.token != join.token || join.is_expired(now_ms) {
        return Err(JoinError::CredentialExpired);
    }

    let key = duplicate_key(&name);
    if state.participants().any(|p| duplicate_key(&p.name) == key) {
        return Err(JoinError::DuplicateName);
    }

    let quiz_score = score_quiz(&request.quiz_answers);
    let role = assign_role(state.role_counts(), quiz_score, config);

    let mut participant = Participant::new(role, name.clone(), now_ms, config.action_log_capacity);
    participant.verified_name = true;
    participant.quiz_score = quiz_score;

    let receipt = JoinReceipt {
        participant_id: participant.id.clone(),
        name: name.clone(),
        role,
        resume_token: participant.resume_token.clone(),
        quiz_score,
        session_code: state.session.join.code.clone(),
        phase: state.session.phase,
    };

    state.participants.insert(participant.id.clone(), participant);
    state.session.feed.push(
        FeedKind::Info,
        format!("{} joined as {} (quiz {}/3).", name, role, quiz_score),
        now_ms,
    );
    tracing::debug!(participant = %receipt.participant_id, role = %role, quiz_score, "participant joined");

    Ok(receipt)
}
