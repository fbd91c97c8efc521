//! # Ring Link
//!
//! Outbound delivery to the successor. Every message gets its own connection:
//! connect, write one frame, close. Nothing is retried.

use log::debug;
use tokio::net::TcpStream;

use crate::common::connection::{encode_frame, Connection};
use crate::common::error::TransportError;
use crate::common::messages::Message;

/// Sends protocol messages to the next node in the ring.
#[derive(Debug, Clone)]
pub struct RingLink {
    successor: String,
}

impl RingLink {
    /// Create a link to the next node.
    ///
    /// # Arguments
    /// - `successor`: `host:port` of the next node in the ring
    ///
    /// # Example
    /// ```ignore
    /// let link = RingLink::new("10.0.0.2:8080");
    /// link.forward(&Message::collect("alice".into())).await?;
    /// ```
    pub fn new(successor: impl Into<String>) -> Self {
        Self {
            successor: successor.into(),
        }
    }

    /// Address messages are forwarded to.
    pub fn successor(&self) -> &str {
        &self.successor
    }

    /// Deliver `message` to the successor.
    ///
    /// # Returns
    /// - `Ok(())`: the frame was written and the connection closed
    /// - `Err(TransportError)`: connect, encode or write failed; not retried
    pub async fn forward(&self, message: &Message) -> Result<(), TransportError> {
        send(&self.successor, message).await
    }
}

/// Open a connection to `addr`, write one delimited frame, close it.
///
/// # Arguments
/// - `addr`: `host:port` to connect to
/// - `message`: the message to deliver
///
/// # Returns
/// - `Ok(())`: message delivered
/// - `Err(TransportError::Encode)`: serialization failed, nothing was sent
/// - `Err(TransportError::Connect)`: `addr` could not be reached
/// - `Err(TransportError::Write)`: the connection broke while writing
pub async fn send(addr: &str, message: &Message) -> Result<(), TransportError> {
    let frame = encode_frame(message).map_err(|source| TransportError::Encode {
        addr: addr.to_string(),
        source,
    })?;

    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;

    let mut conn = Connection::new(stream);
    conn.write_frame(&frame)
        .await
        .map_err(|source| TransportError::Write {
            addr: addr.to_string(),
            source,
        })?;

    debug!("📤 Sent {} ({} bytes) to {}", message, frame.len(), addr);
    Ok(())
}
