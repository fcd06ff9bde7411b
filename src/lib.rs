//! Sequential chat quiz: question bank, partial-credit scoring, per-participant
//! sessions, a results store reset at each start, and a ranked leaderboard.
//!
//! The teloxide adapter lives in the binary; everything here is synchronous.

pub mod config;
pub mod keyboard;
pub mod quiz;
