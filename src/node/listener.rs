//! # Inbound Listener
//!
//! Accepts connections from the predecessor. Each connection is handled in its
//! own task: read exactly one frame, decode it, push it onto the election
//! channel. Decoding runs concurrently; applying messages to the state machine
//! happens in the single task that drains the channel.
//!
//! A bad frame only costs its own connection. The accept loop keeps running.

use log::{debug, error, info};
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;

use crate::common::connection::Connection;
use crate::common::error::NodeError;

use super::middleware::Event;

/// Bound socket waiting for the predecessor's connections.
pub struct InboundListener {
    listener: TcpListener,
}

impl InboundListener {
    /// Bind the listening socket.
    ///
    /// Binding is separate from [`run`](Self::run) so the actual address is
    /// known before the node starts (useful with port `0`).
    ///
    /// # Arguments
    /// - `addr`: local address to listen on (e.g., `"0.0.0.0:8080"`)
    ///
    /// # Example
    /// ```ignore
    /// let listener = InboundListener::bind("127.0.0.1:0").await?;
    /// println!("listening on {}", listener.local_addr()?);
    /// ```
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Address the socket is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the election channel is closed.
    ///
    /// # Arguments
    /// - `events`: channel drained by the election task; every valid message
    ///   is pushed as [`Event::Inbound`]
    pub async fn run(self, events: mpsc::Sender<Event>) {
        if let Ok(addr) = self.local_addr() {
            info!("📡 Listening on {}", addr);
        }

        loop {
            tokio::select! {
                _ = events.closed() => {
                    debug!("🔌 Election task gone, listener stopping");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        debug!("🔗 Accepted connection from {}", peer);
                        let events = events.clone();
                        tokio::spawn(async move {
                            handle_connection(socket, peer, events).await;
                        });
                    }
                    Err(e) => error!("❌ Accept error: {}", e),
                }
            }
        }
    }
}

async fn handle_connection(socket: TcpStream, peer: SocketAddr, events: mpsc::Sender<Event>) {
    let mut conn = Connection::new(socket);

    let message = match conn.read_message().await {
        Ok(message) => message,
        Err(NodeError::Parse(e)) => {
            error!("❌ Dropping connection from {}: {}", peer, e);
            return;
        }
        Err(NodeError::Transport(e)) => {
            error!("❌ Connection from {} failed: {}", peer, e);
            return;
        }
        Err(NodeError::Protocol(e)) => {
            error!("❌ Rejecting message from {}: {}", peer, e);
            return;
        }
        Err(e) => {
            error!("❌ Error reading from {}: {}", peer, e);
            return;
        }
    };

    debug!("📥 {} from {}", message, peer);
    if events
        .send(Event::Inbound { from: peer, message })
        .await
        .is_err()
    {
        debug!("🔌 Election task gone, dropping message from {}", peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::{Message, NodeId};
    use tokio::io::AsyncWriteExt;

    async fn spawn_listener() -> (SocketAddr, mpsc::Receiver<Event>) {
        let listener = InboundListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(listener.run(tx));
        (addr, rx)
    }

    async fn write_raw(addr: SocketAddr, bytes: &[u8]) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(bytes).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    fn expect_inbound(event: Option<Event>) -> Message {
        match event {
            Some(Event::Inbound { message, .. }) => message,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_frame_reaches_channel() {
        let (addr, mut rx) = spawn_listener().await;
        write_raw(addr, b"{\"command\":\"who\",\"ids\":[\"a\"]}\n").await;

        assert_eq!(
            expect_inbound(rx.recv().await),
            Message::collect(NodeId::from("a"))
        );
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_stop_listener() {
        let (addr, mut rx) = spawn_listener().await;

        write_raw(addr, b"definitely not json\n").await;
        write_raw(addr, b"{\"command\":\"who\",\"ids\":[\"a\"]}").await;
        write_raw(addr, b"{\"command\":\"vote\",\"ids\":[\"a\"]}\n").await;
        write_raw(addr, b"{\"command\":\"leader\",\"ids\":[\"b\"]}\n").await;

        let message = expect_inbound(rx.recv().await);
        assert_eq!(message.ids, vec![NodeId::from("b")]);
        assert!(rx.try_recv().is_err());
    }
}
