//! # Message Protocol
//!
//! Defines the single message type exchanged between ring neighbours.
//!
//! On the wire every message is one JSON object followed by a line feed:
//! ```text
//! {"command":"who","ids":["alice","bob"]}\n
//! ```
//!
//! - `command`: `"who"` while identifiers are being collected, `"leader"` once
//!   the leader is being announced
//! - `ids`: the participant identifiers carried by the token
//!
//! Decoding happens in two steps so the two inbound failure kinds stay
//! distinct: bytes that are not a JSON object of the right shape produce a
//! [`ParseError`], a well-formed object with an unrecognized `command`
//! produces a [`ProtocolError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{NodeError, ParseError, ProtocolError};

/// Identifier of a ring participant.
///
/// Identifiers are compared lexicographically over their UTF-8 bytes. Every
/// node uses the same order for sorting and maximum selection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create an identifier from its canonical string form.
    ///
    /// # Arguments
    /// - `id`: the identifier as configured on the node (e.g., `"alice"`)
    ///
    /// # Example
    /// ```ignore
    /// let id = NodeId::new("alice");
    /// assert!(NodeId::new("bob") > id);
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier's canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Protocol phase carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// **Collect** (`"who"`): gather every participant's identifier.
    Collect,
    /// **Announce** (`"leader"`): propagate the elected leader and prune the list.
    Announce,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Collect => "who",
            Command::Announce => "leader",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "who" => Ok(Command::Collect),
            "leader" => Ok(Command::Announce),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Raw wire shape, before the command is validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    command: String,
    ids: Vec<NodeId>,
}

/// The election token as seen by one hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: Command,
    pub ids: Vec<NodeId>,
}

impl Message {
    /// Start of a Collect pass: the initiator is the only participant so far.
    pub fn collect(initiator: NodeId) -> Self {
        Self {
            command: Command::Collect,
            ids: vec![initiator],
        }
    }

    /// Whether `id` is already listed among the participants.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.iter().any(|p| p == id)
    }

    /// Serialize to the JSON payload (without the frame delimiter).
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let wire = WireMessage {
            command: self.command.as_str().to_string(),
            ids: self.ids.clone(),
        };
        serde_json::to_vec(&wire)
    }

    /// Deserialize a JSON payload (without the frame delimiter).
    ///
    /// # Returns
    /// - `Err(NodeError::Parse)`: not a JSON object with `command` and `ids`
    /// - `Err(NodeError::Protocol)`: `command` is neither `"who"` nor `"leader"`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NodeError> {
        let wire: WireMessage = serde_json::from_slice(bytes).map_err(ParseError::from)?;
        let command = wire.command.parse::<Command>()?;
        Ok(Self {
            command,
            ids: wire.ids,
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.ids.iter().map(NodeId::as_str).collect();
        write!(f, "{} [{}]", self.command, ids.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_uses_command_and_ids_fields() {
        let msg = Message {
            command: Command::Announce,
            ids: vec!["c".into(), "a".into()],
        };
        let json = String::from_utf8(msg.to_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"command":"leader","ids":["c","a"]}"#);
    }

    #[test]
    fn test_decode_collect() {
        let msg = Message::from_bytes(br#"{"command":"who","ids":["a","b"]}"#).unwrap();
        assert_eq!(msg.command, Command::Collect);
        assert_eq!(msg.ids, vec![NodeId::from("a"), NodeId::from("b")]);
    }

    #[test]
    fn test_non_json_is_parse_error() {
        let err = Message::from_bytes(b"hello there").unwrap_err();
        assert!(matches!(err, NodeError::Parse(ParseError::Json(_))));
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let err = Message::from_bytes(br#"{"command":"who"}"#).unwrap_err();
        assert!(matches!(err, NodeError::Parse(_)));
    }

    #[test]
    fn test_unknown_command_is_protocol_error() {
        let err = Message::from_bytes(br#"{"command":"elect","ids":[]}"#).unwrap_err();
        match err {
            NodeError::Protocol(ProtocolError::UnknownCommand(cmd)) => assert_eq!(cmd, "elect"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_ids_order_is_lexicographic() {
        let mut ids: Vec<NodeId> = vec!["b".into(), "C".into(), "a".into(), "ab".into()];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(NodeId::as_str).collect();
        assert_eq!(sorted, vec!["C", "a", "ab", "b"]);
    }
}
