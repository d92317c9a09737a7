//! Domain models for the bank run simulator

pub mod catalog;
pub mod event;
pub mod metrics;
pub mod participant;
pub mod session;
pub mod state;

use uuid::Uuid;

// Re-exports
pub use catalog::{BucketAmounts, Facility, HedgeLevel, MaturityBucket, Product, Role};
pub use event::{EventFeed, FeedEvent, FeedKind};
pub use metrics::{Metrics, Scenario};
pub use participant::{
    Commitment, DepositorExit, DepositorState, Participant, QueueMode, QueueState, RoleState,
    WholesaleState, WithdrawalQueue,
};
pub use session::{BankStatus, BoeStatus, JoinCredentials, Phase, Session};
pub use state::GameState;

/// Random lowercase hex identifier of `len` characters
pub(crate) fn new_id(len: usize) -> String {
    let mut id = String::with_capacity(len);
    while id.len() < len {
        id.push_str(&Uuid::new_v4().simple().to_string());
    }
    id.truncate(len);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_lengths() {
        assert_eq!(new_id(6).len(), 6);
        assert_eq!(new_id(24).len(), 24);
        assert_eq!(new_id(40).len(), 40);
        assert_ne!(new_id(16), new_id(16));
    }
}
