//! Scenario events
//!
//! Facilitator-triggered, phase-gated, one-shot shocks.

pub mod handler;
pub mod types;

pub use handler::trigger_event;
pub use types::{EventDefinition, ScenarioEventKey, EVENT_TABLE};
