//! # Ring Election State Machine
//!
//! Full-information election on a unidirectional ring. The token makes two
//! passes:
//!
//! 1. **Collect** (`who`): every node appends its identifier. When the token
//!    reaches a node that is already listed, the list is complete. If that node
//!    holds the highest identifier it elects itself; otherwise it passes the
//!    complete list on unchanged until it reaches the highest node.
//! 2. **Announce** (`leader`): every other node records the highest identifier
//!    as leader and removes itself from the list. When the token is back at the
//!    leader the election is over.
//!
//! ```text
//! start at C, ring A -> B -> C -> A
//!
//! C: who [C]      -> A: who [C, A]   -> B: who [C, A, B]
//! C: leader [C, A, B] -> A: leader [C, B] -> B: leader [C] -> C: complete
//! ```
//!
//! The machine performs no I/O. Every accepted input yields a [`Step`] that
//! the caller executes, so one owner task can drive it without locks.

use log::{info, warn};
use std::fmt;

use crate::common::error::ProtocolError;
use crate::common::messages::{Command, Message, NodeId};

/// Per-node election state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    /// No election seen yet.
    Idle,
    /// Added itself to (or started) a Collect pass.
    Participant,
    /// Elected itself and emitted the Announce.
    LeaderElect,
    /// Learned the leader from an Announce.
    Follower,
}

impl ElectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionState::Idle => "idle",
            ElectionState::Participant => "participant",
            ElectionState::LeaderElect => "leader-elect",
            ElectionState::Follower => "follower",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ElectionState::LeaderElect | ElectionState::Follower)
    }
}

impl fmt::Display for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the owner must do after an accepted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send the message to the successor.
    Forward(Message),
    /// The Announce returned to the leader; nothing left to send.
    Complete { leader: NodeId },
}

/// Participants in ascending identifier order.
pub fn sorted_participants(ids: &[NodeId]) -> Vec<&NodeId> {
    let mut sorted: Vec<&NodeId> = ids.iter().collect();
    sorted.sort();
    sorted
}

/// Highest identifier among the participants, `None` for an empty list.
pub fn highest(ids: &[NodeId]) -> Option<&NodeId> {
    sorted_participants(ids).pop()
}

fn first_duplicate(ids: &[NodeId]) -> Option<&NodeId> {
    let sorted = sorted_participants(ids);
    sorted.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
}

/// Election state of one ring node.
#[derive(Debug, Clone)]
pub struct ElectionStateMachine {
    self_id: NodeId,
    state: ElectionState,
    leader: Option<NodeId>,
    completed: bool,
}

impl ElectionStateMachine {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            state: ElectionState::Idle,
            leader: None,
            completed: false,
        }
    }

    pub fn self_id(&self) -> &NodeId {
        &self.self_id
    }

    pub fn state(&self) -> ElectionState {
        self.state
    }

    pub fn leader(&self) -> Option<&NodeId> {
        self.leader.as_ref()
    }

    /// `true` only on the leader, once its Announce has gone all the way round.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Begin an election from this node.
    ///
    /// Only valid while [`ElectionState::Idle`]. Returns the Collect token to
    /// send to the successor.
    pub fn start_election(&mut self) -> Result<Message, ProtocolError> {
        if self.state != ElectionState::Idle {
            return Err(ProtocolError::AlreadyStarted(self.state.as_str()));
        }

        self.state = ElectionState::Participant;
        info!("🗳️  Node {} starting election", self.self_id);
        Ok(Message::collect(self.self_id.clone()))
    }

    /// Undo [`start_election`](Self::start_election) when the first send failed,
    /// so the operator can trigger again.
    pub fn rollback_start(&mut self) {
        if self.state == ElectionState::Participant && self.leader.is_none() {
            self.state = ElectionState::Idle;
        }
    }

    /// Apply one inbound message.
    ///
    /// A rejected message leaves the machine untouched.
    pub fn on_receive(&mut self, message: Message) -> Result<Step, ProtocolError> {
        match message.command {
            Command::Collect => self.on_collect(message),
            Command::Announce => self.on_announce(message),
        }
    }

    fn on_collect(&mut self, mut message: Message) -> Result<Step, ProtocolError> {
        if let Some(duplicate) = first_duplicate(&message.ids) {
            return Err(ProtocolError::DuplicateParticipant(duplicate.clone()));
        }

        if !message.contains(&self.self_id) {
            if self.state.is_terminal() {
                info!(
                    "🔄 Node {} joining a new election (previous leader: {:?})",
                    self.self_id,
                    self.leader.as_ref().map(NodeId::as_str)
                );
                self.leader = None;
                self.completed = false;
            }
            message.ids.push(self.self_id.clone());
            self.state = ElectionState::Participant;
            return Ok(Step::Forward(message));
        }

        // The list already holds every participant; self is present so it is non-empty.
        let max = match highest(&message.ids) {
            Some(max) => max.clone(),
            None => return Err(ProtocolError::EmptyAnnounce),
        };

        if max == self.self_id {
            info!(
                "🎉 Node {} has the highest id among {} participants, announcing itself",
                self.self_id,
                message.ids.len()
            );
            self.leader = Some(self.self_id.clone());
            self.state = ElectionState::LeaderElect;
            self.completed = false;
            message.command = Command::Announce;
            return Ok(Step::Forward(message));
        }

        info!(
            "➡️  Node {} saw the complete list, passing it on towards {}",
            self.self_id, max
        );
        Ok(Step::Forward(message))
    }

    fn on_announce(&mut self, mut message: Message) -> Result<Step, ProtocolError> {
        let max = match highest(&message.ids) {
            Some(max) => max.clone(),
            None => return Err(ProtocolError::EmptyAnnounce),
        };

        if max == self.self_id {
            if self.state != ElectionState::LeaderElect || self.completed {
                return Err(ProtocolError::StrayAnnounce(max));
            }
            self.completed = true;
            info!("🏁 Node {} confirmed as leader, election complete", self.self_id);
            return Ok(Step::Complete { leader: max });
        }

        let before = message.ids.len();
        message.ids.retain(|id| id != &self.self_id);
        if message.ids.len() == before {
            warn!(
                "⚠️  Node {} was not listed in the announce for {}",
                self.self_id, max
            );
        }

        info!("👑 Node {} recorded leader {}", self.self_id, max);
        self.leader = Some(max);
        self.state = ElectionState::Follower;
        Ok(Step::Forward(message))
    }
}
