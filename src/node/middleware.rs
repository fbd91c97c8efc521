//! # Node Middleware - Ring Coordination
//!
//! Wraps the [`ElectionStateMachine`] with everything needed to run it on a
//! real ring:
//!
//! - the [`InboundListener`] decodes frames from the predecessor, one task per connection
//! - a single election task owns the state machine and applies events in order
//! - the [`RingLink`] forwards whatever the state machine emits
//! - a [`watch`] channel publishes the node's election status to observers
//!
//! ## Event Flow
//!
//! ```text
//! predecessor -> listener task (decode) ─┐
//! predecessor -> listener task (decode) ─┼─> mpsc<Event> -> election task -> RingLink -> successor
//! operator trigger (NodeHandle) ─────────┘
//! ```
//!
//! Only the election task touches protocol state, so concurrent connections
//! can never interleave two transitions.

use log::{error, info, warn};
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot, watch};

use crate::common::config::NodeConfig;
use crate::common::error::NodeError;
use crate::common::messages::{Message, NodeId};
use crate::election::{ElectionState, ElectionStateMachine, Step};

use super::listener::InboundListener;
use super::ring_link::RingLink;

/// Pending events between the listener tasks and the election task.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Input to the election task.
#[derive(Debug)]
pub enum Event {
    /// A decoded message from the predecessor.
    Inbound { from: SocketAddr, message: Message },
    /// Operator asked this node to start an election.
    Start {
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
}

/// Snapshot of a node's election progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionStatus {
    pub state: ElectionState,
    pub leader: Option<NodeId>,
    /// Set on the leader once its announce has gone round the whole ring.
    pub completed: bool,
}

impl ElectionStatus {
    fn of(core: &ElectionStateMachine) -> Self {
        Self {
            state: core.state(),
            leader: core.leader().cloned(),
            completed: core.is_complete(),
        }
    }
}

/// Cloneable handle for triggering and observing a running node.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    events: mpsc::Sender<Event>,
    status: watch::Receiver<ElectionStatus>,
}

impl NodeHandle {
    /// Ask the node to start an election and wait until the first hop is sent.
    ///
    /// # Returns
    /// - `Ok(())`: the Collect token reached the successor
    /// - `Err(NodeError::Protocol)`: the node is not idle
    /// - `Err(NodeError::Transport)`: the successor could not be reached; the
    ///   node is idle again and the election may be retried
    pub async fn start_election(&self) -> Result<(), NodeError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(Event::Start { reply })
            .await
            .map_err(|_| NodeError::Shutdown)?;
        response.await.map_err(|_| NodeError::Shutdown)?
    }

    /// Current election status of the node.
    ///
    /// # Example
    /// ```ignore
    /// if let Some(leader) = handle.status().leader {
    ///     println!("leader is {}", leader);
    /// }
    /// ```
    pub fn status(&self) -> ElectionStatus {
        self.status.borrow().clone()
    }

    /// Wait until this node knows the leader.
    pub async fn wait_for_leader(&self) -> Result<NodeId, NodeError> {
        let mut status = self.status.clone();
        let leader = status
            .wait_for(|s| s.state.is_terminal() && s.leader.is_some())
            .await
            .map_err(|_| NodeError::Shutdown)?
            .leader
            .clone();
        leader.ok_or(NodeError::Shutdown)
    }

    /// Wait until the announce has returned to this node (leader only).
    pub async fn wait_for_completion(&self) -> Result<NodeId, NodeError> {
        let mut status = self.status.clone();
        let leader = status
            .wait_for(|s| s.completed)
            .await
            .map_err(|_| NodeError::Shutdown)?
            .leader
            .clone();
        leader.ok_or(NodeError::Shutdown)
    }
}

/// One ring node: election core plus its network plumbing.
pub struct NodeMiddleware {
    core: ElectionStateMachine,
    link: RingLink,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    status_tx: watch::Sender<ElectionStatus>,
}

impl NodeMiddleware {
    /// Create a node that is idle until an election reaches it.
    ///
    /// # Arguments
    /// - `id`: this node's identifier, unique in the ring
    /// - `successor`: `host:port` of the next node
    ///
    /// # Example
    /// ```ignore
    /// let listener = InboundListener::bind("0.0.0.0:8080").await?;
    /// let node = NodeMiddleware::new("alice".into(), "10.0.0.2:8080");
    /// let handle = node.handle();
    /// tokio::spawn(node.run(listener));
    /// handle.start_election().await?;
    /// ```
    pub fn new(id: NodeId, successor: impl Into<String>) -> Self {
        let core = ElectionStateMachine::new(id);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = watch::channel(ElectionStatus::of(&core));

        Self {
            core,
            link: RingLink::new(successor),
            events_tx,
            events_rx,
            status_tx,
        }
    }

    /// Create a node from a validated [`NodeConfig`].
    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.id.clone(), config.next.clone())
    }

    /// Handle for triggering and observing this node; take it before [`run`](Self::run).
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            events: self.events_tx.clone(),
            status: self.status_tx.subscribe(),
        }
    }

    /// Run the listener and the election task until either stops.
    pub async fn run(self, listener: InboundListener) {
        let NodeMiddleware {
            core,
            link,
            events_tx,
            events_rx,
            status_tx,
        } = self;

        info!(
            "🚀 Node {} started, next node is {}",
            core.self_id(),
            link.successor()
        );

        let election = ElectionTask {
            core,
            link,
            status_tx,
        };

        tokio::select! {
            _ = listener.run(events_tx) => error!("❌ Listener task terminated"),
            _ = election.run(events_rx) => info!("🔌 Election task finished"),
        }
    }
}

/// Sole owner of the state machine.
struct ElectionTask {
    core: ElectionStateMachine,
    link: RingLink,
    status_tx: watch::Sender<ElectionStatus>,
}

impl ElectionTask {
    async fn run(mut self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            match event {
                Event::Start { reply } => {
                    let result = self.start().await;
                    if let Err(e) = &result {
                        warn!("⚠️  Node {} did not start election: {}", self.core.self_id(), e);
                    }
                    let _ = reply.send(result);
                }
                Event::Inbound { from, message } => self.receive(from, message).await,
            }
            self.publish();
        }
    }

    async fn start(&mut self) -> Result<(), NodeError> {
        let message = self.core.start_election()?;
        self.publish();

        if let Err(e) = self.link.forward(&message).await {
            self.core.rollback_start();
            return Err(e.into());
        }
        info!(
            "📤 Node {} sent {} to {}",
            self.core.self_id(),
            message,
            self.link.successor()
        );
        Ok(())
    }

    async fn receive(&mut self, from: SocketAddr, message: Message) {
        info!(
            "📨 Node {} received {} from {}",
            self.core.self_id(),
            message,
            from
        );

        match self.core.on_receive(message) {
            Ok(Step::Forward(next)) => {
                // Status reflects the transition even while the send is pending.
                self.publish();
                match self.link.forward(&next).await {
                    Ok(()) => info!(
                        "📤 Node {} sent {} to {}",
                        self.core.self_id(),
                        next,
                        self.link.successor()
                    ),
                    Err(e) => error!(
                        "❌ Node {} could not forward {}, election abandoned: {}",
                        self.core.self_id(),
                        next,
                        e
                    ),
                }
            }
            Ok(Step::Complete { leader }) => {
                info!("🏁 Election complete, leader is {}", leader);
            }
            Err(e) => error!(
                "❌ Node {} rejected message from {}: {}",
                self.core.self_id(),
                from,
                e
            ),
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(ElectionStatus::of(&self.core));
    }
}
