//! # Error Taxonomy
//!
//! One error enum per failure category of the ring protocol:
//!
//! - [`ConfigError`]: missing or invalid startup parameters (fatal, node never starts)
//! - [`TransportError`]: socket connect/read/write failures (one hop, election abandoned locally)
//! - [`ParseError`]: malformed inbound payload (connection dropped, listener continues)
//! - [`ProtocolError`]: well-formed payload carrying an invalid protocol state
//!
//! [`NodeError`] wraps all four for call sites that can see more than one.

use std::io;
use thiserror::Error;

use super::messages::NodeId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("node id is not set")]
    MissingId,

    #[error("next node address is not set")]
    MissingSuccessor,

    #[error("invalid next node address '{address}': {reason}")]
    InvalidSuccessor { address: String, reason: String },

    #[error("invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("failed to read config file '{path}': {source}")]
    Io { path: String, source: io::Error },

    #[error("failed to parse config file '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("failed to read frame: {source}")]
    Read { source: io::Error },

    #[error("failed to write to {addr}: {source}")]
    Write { addr: String, source: io::Error },

    #[error("failed to encode message for {addr}: {source}")]
    Encode {
        addr: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("connection closed before message delimiter ({received} bytes received)")]
    Undelimited { received: usize },

    #[error("frame too large: more than {max} bytes without delimiter")]
    TooLarge { max: usize },

    #[error("invalid message payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("announce message carries no participants")]
    EmptyAnnounce,

    #[error("collect message lists {0} more than once")]
    DuplicateParticipant(NodeId),

    #[error("announce for {0} arrived outside an election it leads")]
    StrayAnnounce(NodeId),

    #[error("election already started (node is {0})")]
    AlreadyStarted(&'static str),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("election task is not running")]
    Shutdown,
}
