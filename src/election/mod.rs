//! # Leader Election
//!
//! The ring election protocol core. Pure state transitions, no I/O; see
//! [`state_machine`] for the algorithm.

pub mod state_machine;

pub use state_machine::{ElectionState, ElectionStateMachine, Step};
