//! # Common Components
//!
//! Data structures and utilities shared by the election core and the node runtime.
//!
//! ## Modules
//!
//! - [`messages`]: Wire message definition and node identifiers
//! - [`connection`]: Line-delimited framing over a byte stream
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error taxonomy

pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
