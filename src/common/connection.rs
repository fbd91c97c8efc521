//! # Line-Delimited Connection
//!
//! Wraps a byte stream with the framing used between ring neighbours.
//!
//! ## Wire Protocol
//!
//! Each connection carries exactly one message: the JSON payload followed by a
//! single line feed.
//! ```text
//! [N bytes: JSON message data] [0x0A]
//! ```
//!
//! Both directions go through this module, so the sender always appends the
//! delimiter the receiver waits for.

use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::error::{NodeError, ParseError, TransportError};
use super::messages::Message;

/// Frame terminator.
pub const DELIMITER: u8 = b'\n';

/// Maximum payload size accepted before the delimiter (1MB).
///
/// A Collect token grows by one identifier per hop, so legitimate frames stay
/// far below this.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Serialize a message and append the frame delimiter.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = message.to_bytes()?;
    frame.push(DELIMITER);
    Ok(frame)
}

/// Stream wrapper that reads and writes delimited frames.
pub struct Connection<S> {
    stream: BufReader<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream.
    ///
    /// # Example
    /// ```ignore
    /// let stream = TcpStream::connect("127.0.0.1:8001").await?;
    /// let mut conn = Connection::new(stream);
    /// ```
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Read exactly one message from the connection.
    ///
    /// # Returns
    /// - `Ok(Message)`: one complete, valid frame
    /// - `Err(NodeError::Transport)`: the socket read failed
    /// - `Err(NodeError::Parse)`: EOF before the delimiter, oversized frame,
    ///   or invalid JSON
    /// - `Err(NodeError::Protocol)`: valid JSON with an unknown command
    pub async fn read_message(&mut self) -> Result<Message, NodeError> {
        let mut frame = Vec::new();
        let limit = (MAX_FRAME_SIZE + 1) as u64;

        let received = (&mut self.stream)
            .take(limit)
            .read_until(DELIMITER, &mut frame)
            .await
            .map_err(|source| TransportError::Read { source })?;

        if frame.last() != Some(&DELIMITER) {
            if received > MAX_FRAME_SIZE {
                return Err(ParseError::TooLarge {
                    max: MAX_FRAME_SIZE,
                }
                .into());
            }
            return Err(ParseError::Undelimited { received }.into());
        }

        frame.pop();
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }

        debug!("📥 Read frame of {} bytes", frame.len());
        Message::from_bytes(&frame)
    }

    /// Write an already encoded frame and shut the write side down.
    pub async fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(frame).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ProtocolError;
    use crate::common::messages::{Command, NodeId};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    #[test]
    fn test_encode_frame_appends_delimiter() {
        let frame = encode_frame(&Message::collect(NodeId::from("a"))).unwrap();
        assert_eq!(frame.last(), Some(&DELIMITER));
        assert_eq!(frame.iter().filter(|b| **b == DELIMITER).count(), 1);
    }

    #[tokio::test]
    async fn test_frame_travels_through_stream() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = Connection::new(client);
        let mut reader = Connection::new(server);

        let msg = Message {
            command: Command::Announce,
            ids: vec!["x".into(), "y".into()],
        };
        writer.write_frame(&encode_frame(&msg).unwrap()).await.unwrap();

        assert_eq!(reader.read_message().await.unwrap(), msg);
    }

    #[tokio::test]
    async fn test_crlf_terminated_frame_is_accepted() {
        let (mut client, server) = tokio::io::duplex(4096);
        client
            .write_all(b"{\"command\":\"who\",\"ids\":[\"a\"]}\r\n")
            .await
            .unwrap();

        let msg = Connection::new(server).read_message().await.unwrap();
        assert_eq!(msg, Message::collect(NodeId::from("a")));
    }

    #[tokio::test]
    async fn test_missing_delimiter_is_parse_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        client
            .write_all(br#"{"command":"who","ids":["a"]}"#)
            .await
            .unwrap();
        drop(client);

        let err = Connection::new(server).read_message().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Parse(ParseError::Undelimited { received: 29 })
        ));
    }

    #[tokio::test]
    async fn test_garbage_is_parse_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        client.write_all(b"\x00\x01not json\n").await.unwrap();

        let err = Connection::new(server).read_message().await.unwrap_err();
        assert!(matches!(err, NodeError::Parse(ParseError::Json(_))));
    }

    #[tokio::test]
    async fn test_unknown_command_is_protocol_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        client
            .write_all(b"{\"command\":\"ping\",\"ids\":[]}\n")
            .await
            .unwrap();

        let err = Connection::new(server).read_message().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Protocol(ProtocolError::UnknownCommand(_))
        ));
    }

    /// Stream whose reads fail as if the peer reset the connection.
    struct ResetStream;

    impl AsyncRead for ResetStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()))
        }
    }

    impl AsyncWrite for ResetStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_socket_read_failure_is_transport_error() {
        let err = Connection::new(ResetStream).read_message().await.unwrap_err();
        match err {
            NodeError::Transport(TransportError::Read { source }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::ConnectionReset)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let writer = tokio::spawn(async move {
            let chunk = vec![b'a'; 64 * 1024];
            let mut sent = 0;
            while sent <= MAX_FRAME_SIZE {
                if client.write_all(&chunk).await.is_err() {
                    break;
                }
                sent += chunk.len();
            }
        });

        let err = Connection::new(server).read_message().await.unwrap_err();
        assert!(matches!(err, NodeError::Parse(ParseError::TooLarge { .. })));
        writer.abort();
    }
}
