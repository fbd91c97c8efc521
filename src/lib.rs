pub mod common;
pub mod election;
pub mod node;

pub use common::config::NodeConfig;
pub use common::messages::{Command, Message, NodeId};
pub use election::{ElectionState, ElectionStateMachine, Step};
pub use node::{InboundListener, NodeHandle, NodeMiddleware};
