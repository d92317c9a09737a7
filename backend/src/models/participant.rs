//! Participant model
//!
//! A participant is one student in the classroom, playing either a retail
//! depositor or a wholesale lender. Role-specific state lives in a tagged
//! [`RoleState`] so phase-specific fields are only reachable for the role
//! that owns them.
//!
//! # Critical Invariants
//!
//! 1. `balance >= 0` at all times
//! 2. The role never changes after join
//! 3. Once a depositor has exited or a lender has refused, balance,
//!    principal and selection are frozen (spectator)
//!
//! CRITICAL: All money values are i64 (pence)

use crate::models::catalog::{Facility, HedgeLevel, Product, Role};
use crate::models::new_id;
use crate::models::session::Phase;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Opening depositor balance: £10,000
pub const DEPOSITOR_BASE_BALANCE: i64 = 1_000_000;

/// Opening wholesale balance: £500m
pub const WHOLESALE_BASE_BALANCE: i64 = 50_000_000_000;

/// Largest top-up a depositor can draft before first confirm: £40,000
pub const SETUP_TOP_UP_CAP: i64 = 4_000_000;

/// Depositor principal ceiling for later top-ups: £50,000
pub const DEPOSITOR_PRINCIPAL_CAP: i64 = 5_000_000;

/// Round a fractional pence amount to whole pence, never below zero
pub fn round_pence(value: f64) -> i64 {
    if value.is_finite() && value > 0.0 {
        value.round() as i64
    } else {
        0
    }
}

// ============================================================================
// Selection State Machine
// ============================================================================

/// Phase-1 product/facility commitment
///
/// ```text
/// Unset ──select──▶ Drafted ──confirm──▶ Committed ──select──▶ PendingChange
///                     ▲  │                   ▲                     │
///                     └──┘ select            └──confirm / cancel───┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "choice", rename_all = "snake_case")]
pub enum Commitment<T> {
    Unset,
    Drafted(T),
    Committed(T),
    PendingChange { current: T, pending: T },
}

/// Whether a commit was the first lock-in or a change of an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    First,
    Change,
}

impl<T: Copy + PartialEq> Commitment<T> {
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            Commitment::Committed(_) | Commitment::PendingChange { .. }
        )
    }

    /// The choice currently in force, if any
    pub fn committed(&self) -> Option<T> {
        match self {
            Commitment::Committed(c) | Commitment::PendingChange { current: c, .. } => Some(*c),
            _ => None,
        }
    }

    /// The choice a confirm would lock in now
    pub fn candidate(&self) -> Option<T> {
        match self {
            Commitment::Unset => None,
            Commitment::Drafted(d) => Some(*d),
            Commitment::Committed(c) => Some(*c),
            Commitment::PendingChange { pending, .. } => Some(*pending),
        }
    }

    pub fn pending(&self) -> Option<T> {
        match self {
            Commitment::PendingChange { pending, .. } => Some(*pending),
            _ => None,
        }
    }

    /// Record a selection without committing it
    pub fn select(&mut self, choice: T) {
        *self = match *self {
            Commitment::Unset | Commitment::Drafted(_) => Commitment::Drafted(choice),
            Commitment::Committed(current) | Commitment::PendingChange { current, .. } => {
                Commitment::PendingChange {
                    current,
                    pending: choice,
                }
            }
        };
    }

    /// Drop a pending change, keeping the committed choice
    pub fn cancel_change(&mut self) {
        if let Commitment::PendingChange { current, .. } = *self {
            *self = Commitment::Committed(current);
        }
    }

    /// Lock in the candidate (or `fallback` when nothing was chosen)
    ///
    /// Returns the committed choice and whether this was the first commit,
    /// or `None` when there is nothing to commit.
    pub fn commit(&mut self, fallback: Option<T>) -> Option<(T, CommitKind)> {
        let kind = if self.is_committed() {
            CommitKind::Change
        } else {
            CommitKind::First
        };
        let choice = self.candidate().or(fallback)?;
        *self = Commitment::Committed(choice);
        Some((choice, kind))
    }
}

// ============================================================================
// Accrual Cycle (banked vs ticking)
// ============================================================================

/// Split between banked accrual and accrual ticking since the last commit
///
/// `ticking = balance - base_balance`; on every change the ticking amount is
/// folded into `banked` and the cycle re-bases to the current balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualCycle {
    pub base_balance: i64,
    pub started_at: Option<u64>,
    pub banked: i64,
}

impl AccrualCycle {
    pub fn new(base_balance: i64) -> Self {
        Self {
            base_balance,
            started_at: None,
            banked: 0,
        }
    }

    /// Accrued since the last commit point
    pub fn ticking(&self, balance: i64) -> i64 {
        (balance - self.base_balance).max(0)
    }

    pub fn restart(&mut self, balance: i64, now_ms: u64) {
        self.base_balance = balance;
        self.started_at = Some(now_ms);
    }

    /// Bank the ticking amount and re-base; returns the amount banked
    pub fn bank_and_restart(&mut self, balance: i64, now_ms: u64) -> i64 {
        let earned = self.ticking(balance);
        self.banked += earned;
        self.restart(balance, now_ms);
        earned
    }
}

// ============================================================================
// Withdrawal Queue (phase 3)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    None,
    Processing,
    Partial,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    Full,
    Protected,
}

/// A depositor's instant-access withdrawal request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalQueue {
    pub state: QueueState,
    pub mode: QueueMode,
    pub reference: Option<String>,
    pub requested_amount: i64,
    pub eta_hours: f64,
    pub position: u32,
    pub updated_at: Option<u64>,
}

impl Default for WithdrawalQueue {
    fn default() -> Self {
        Self {
            state: QueueState::None,
            mode: QueueMode::Full,
            reference: None,
            requested_amount: 0,
            eta_hours: 0.0,
            position: 0,
            updated_at: None,
        }
    }
}

fn round_hours(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl WithdrawalQueue {
    /// Back to neutral (entering phase 3)
    pub fn reset(&mut self, now_ms: u64) {
        *self = WithdrawalQueue {
            updated_at: Some(now_ms),
            ..Default::default()
        };
    }

    /// A request exists (any state other than `none`)
    pub fn is_open(&self) -> bool {
        self.state != QueueState::None
    }

    /// `none → processing`
    pub fn open(&mut self, reference: String, amount: i64, position: u32, now_ms: u64) {
        self.state = QueueState::Processing;
        self.mode = QueueMode::Full;
        self.reference = Some(reference);
        self.requested_amount = amount;
        self.eta_hours = 4.0;
        self.position = position;
        self.updated_at = Some(now_ms);
    }

    /// Waiting in line: position drifts down, ETA creeps up
    pub fn drift(&mut self, drift: u32, now_ms: u64) {
        let position = if self.position == 0 { 1_800 } else { self.position };
        let eta = if self.eta_hours > 0.0 { self.eta_hours } else { 4.0 };
        self.position = position.saturating_sub(drift).max(1);
        self.eta_hours = round_hours((eta + 0.2).max(1.5));
        self.updated_at = Some(now_ms);
    }

    /// Switch to the protected-amount subset (`→ partial`)
    pub fn prioritize_protected(&mut self, balance: i64, protection_limit: i64, now_ms: u64) {
        let eta = if self.eta_hours > 0.0 { self.eta_hours } else { 4.0 };
        let position = if self.position == 0 { 1_600 } else { self.position };
        self.mode = QueueMode::Protected;
        self.state = QueueState::Partial;
        self.requested_amount = balance.min(protection_limit);
        self.eta_hours = round_hours((eta - 1.8).max(1.2));
        self.position = ((position as f64 * 0.55).floor() as u32).max(1);
        self.updated_at = Some(now_ms);
    }

    /// Keep the whole balance in the request (`→ processing`)
    pub fn keep_full(&mut self, balance: i64, now_ms: u64) {
        let eta = if self.eta_hours > 0.0 { self.eta_hours } else { 4.0 };
        let position = if self.position == 0 { 1_800 } else { self.position };
        self.mode = QueueMode::Full;
        self.state = QueueState::Processing;
        self.requested_amount = balance;
        self.eta_hours = round_hours((eta + 0.8).clamp(3.5, 8.0));
        self.position = position + 120;
        self.updated_at = Some(now_ms);
    }

    /// `→ cancelled`
    pub fn cancel(&mut self, now_ms: u64) {
        self.state = QueueState::Cancelled;
        self.updated_at = Some(now_ms);
    }
}

// ============================================================================
// Role State
// ============================================================================

/// How a depositor left the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositorExit {
    pub phase: Phase,
    pub payout: i64,
    pub loss: i64,
    pub principal: i64,
    pub interest: i64,
}

impl DepositorExit {
    /// Exit with no payout breakdown (balance left as is)
    pub fn at(phase: Phase) -> Self {
        Self {
            phase,
            payout: 0,
            loss: 0,
            principal: 0,
            interest: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositorState {
    /// Product currently held (None after a phase-2 exit)
    pub product: Option<Product>,
    pub selection: Commitment<Product>,
    /// Setup top-up drafted before the first confirm
    pub draft_top_up: i64,
    /// Phase-1 interest split
    pub interest: AccrualCycle,
    pub phase2_banked_interest: i64,
    pub upgraded_at: Option<u64>,
    pub hedge: Option<HedgeLevel>,
    pub exit: Option<DepositorExit>,
    pub switched_to_current: bool,
    pub queue: WithdrawalQueue,
    pub panic_signals: u32,
}

impl DepositorState {
    pub fn new() -> Self {
        Self {
            product: None,
            selection: Commitment::Unset,
            draft_top_up: 0,
            interest: AccrualCycle::new(DEPOSITOR_BASE_BALANCE),
            phase2_banked_interest: 0,
            upgraded_at: None,
            hedge: None,
            exit: None,
            switched_to_current: false,
            queue: WithdrawalQueue::default(),
            panic_signals: 0,
        }
    }

    pub fn withdrew(&self) -> bool {
        self.exit.is_some()
    }

    pub fn withdrawn_at(&self) -> Option<Phase> {
        self.exit.map(|e| e.phase)
    }

    pub fn confirmed(&self) -> bool {
        self.selection.is_committed()
    }

    /// Product used for rates and buckets (current account when unset)
    pub fn effective_product(&self) -> Product {
        self.product.unwrap_or(Product::Current)
    }
}

impl Default for DepositorState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WholesaleState {
    pub facility: Option<Facility>,
    pub selection: Commitment<Facility>,
    /// Phase-1 spread split
    pub spread: AccrualCycle,
    /// Extra spread demanded on top of the facility spread
    pub spread_bps_override: u32,
    /// Share of the balance deployed to the bank, in percent
    pub exposure_pct: u32,
    pub refused_at: Option<Phase>,
    pub held_through_resolution: bool,
}

impl WholesaleState {
    pub fn new() -> Self {
        Self {
            facility: None,
            selection: Commitment::Unset,
            spread: AccrualCycle::new(WHOLESALE_BASE_BALANCE),
            spread_bps_override: 0,
            exposure_pct: 100,
            refused_at: None,
            held_through_resolution: false,
        }
    }

    pub fn refused(&self) -> bool {
        self.refused_at.is_some()
    }

    pub fn deployed(&self) -> bool {
        self.selection.is_committed()
    }

    /// Facility used for rates and buckets (overnight when unset)
    pub fn effective_facility(&self) -> Facility {
        self.facility.unwrap_or(Facility::Overnight)
    }

    pub fn exposure_fraction(&self) -> f64 {
        self.exposure_pct as f64 / 100.0
    }
}

impl Default for WholesaleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Role-tagged participant state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleState {
    Depositor(DepositorState),
    Wholesale(WholesaleState),
}

// ============================================================================
// Action Log
// ============================================================================

/// One entry of a participant's action history (reporting only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub at: u64,
    pub phase: Phase,
    #[serde(rename = "type")]
    pub action: String,
    pub payload: serde_json::Value,
}

/// Bounded, most-recent-first action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    capacity: usize,
    entries: VecDeque<ActionRecord>,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(
        &mut self,
        phase: Phase,
        action: impl Into<String>,
        payload: serde_json::Value,
        at: u64,
    ) {
        self.entries.push_front(ActionRecord {
            id: new_id(8),
            at,
            phase,
            action: action.into(),
            payload,
        });
        self.entries.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionRecord> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ActionRecord> {
        self.entries.front()
    }

    pub fn recent(&self, n: usize) -> Vec<ActionRecord> {
        self.entries.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Participant
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub resume_token: String,
    pub joined_at: u64,
    pub quiz_score: u32,
    pub verified_name: bool,
    /// Current realizable value (pence)
    pub balance: i64,
    /// Capital base excluding accrued-but-unbanked interest/spread (pence)
    pub principal: i64,
    pub actions: ActionLog,
    pub last_action_at: u64,
    pub state: RoleState,
}

impl Participant {
    /// Create a participant with the opening balance for `role`
    pub fn new(role: Role, name: String, now_ms: u64, log_capacity: usize) -> Self {
        let (balance, state) = match role {
            Role::Depositor => (
                DEPOSITOR_BASE_BALANCE,
                RoleState::Depositor(DepositorState::new()),
            ),
            Role::Wholesale => (
                WHOLESALE_BASE_BALANCE,
                RoleState::Wholesale(WholesaleState::new()),
            ),
        };
        Self {
            id: new_id(10),
            name,
            resume_token: new_id(24),
            joined_at: now_ms,
            quiz_score: 0,
            verified_name: false,
            balance,
            principal: balance,
            actions: ActionLog::new(log_capacity),
            last_action_at: now_ms,
            state,
        }
    }

    pub fn role(&self) -> Role {
        match self.state {
            RoleState::Depositor(_) => Role::Depositor,
            RoleState::Wholesale(_) => Role::Wholesale,
        }
    }

    pub fn depositor(&self) -> Option<&DepositorState> {
        match &self.state {
            RoleState::Depositor(d) => Some(d),
            RoleState::Wholesale(_) => None,
        }
    }

    pub fn wholesale(&self) -> Option<&WholesaleState> {
        match &self.state {
            RoleState::Wholesale(w) => Some(w),
            RoleState::Depositor(_) => None,
        }
    }

    /// Withdrawn depositor or refusing lender: a read-only spectator
    pub fn is_spectator(&self) -> bool {
        match &self.state {
            RoleState::Depositor(d) => d.withdrew(),
            RoleState::Wholesale(w) => w.refused(),
        }
    }

    /// Pseudonymous tag shown before names are revealed
    pub fn pseudonym(&self) -> String {
        let tail: String = {
            let chars: Vec<char> = self.id.chars().collect();
            chars[chars.len().saturating_sub(4)..].iter().collect()
        };
        format!("User_{}", tail)
    }

    pub fn record_action(
        &mut self,
        phase: Phase,
        action: impl Into<String>,
        payload: serde_json::Value,
        now_ms: u64,
    ) {
        self.actions.record(phase, action, payload, now_ms);
        self.last_action_at = now_ms;
    }
}
