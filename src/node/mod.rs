//! # Ring Node
//!
//! Runtime around the election core:
//!
//! - [`ring_link`]: one-shot outbound delivery to the successor
//! - [`listener`]: inbound connections from the predecessor
//! - [`middleware`]: the election task, event fan-in and status publication
//! - [`trigger`]: operator input that starts an election

pub mod listener;
pub mod middleware;
pub mod ring_link;
pub mod trigger;

pub use listener::InboundListener;
pub use middleware::{ElectionStatus, NodeHandle, NodeMiddleware};
pub use ring_link::RingLink;
