//! Deterministic random number generation
//!
//! Uses xorshift64* for the few random draws the game needs (withdrawal
//! queue references, queue positions and drift).
//! CRITICAL: All engine randomness MUST go through this module so a seeded
//! session replays identically.

mod xorshift;

pub use xorshift::RngManager;
