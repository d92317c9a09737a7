//! Core infrastructure shared by every component

pub mod time;
