//! # Operator Trigger
//!
//! Reads lines from an input (stdin for the binary) and starts the election
//! when the operator enters a single space. Stops after the first election that
//! was started successfully; a failed start can be retried by pressing again.

use log::{debug, error, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::middleware::NodeHandle;

fn is_trigger(line: &str) -> bool {
    line.trim_end_matches('\r') == " "
}

/// Wait for the operator and start the election.
///
/// # Arguments
/// - `input`: line source, stdin in the binary
/// - `handle`: the node to start
///
/// Returns when an election was started, or when `input` ends or fails.
///
/// # Example
/// ```ignore
/// tokio::spawn(run_trigger(BufReader::new(tokio::io::stdin()), node.handle()));
/// ```
pub async fn run_trigger<R>(input: R, handle: NodeHandle)
where
    R: AsyncBufRead + Unpin,
{
    info!("⌨️  Press Space, then Enter, to start choosing the leader");

    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !is_trigger(&line) {
                    continue;
                }
                match handle.start_election().await {
                    Ok(()) => return,
                    Err(e) => error!("❌ Could not start election: {}", e),
                }
            }
            Ok(None) => {
                debug!("Trigger input closed");
                return;
            }
            Err(e) => {
                error!("❌ Failed to read trigger input: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::NodeId;
    use crate::node::{InboundListener, NodeMiddleware};
    use std::time::Duration;

    #[test]
    fn test_only_a_lone_space_triggers() {
        assert!(is_trigger(" "));
        assert!(is_trigger(" \r"));
        assert!(!is_trigger(""));
        assert!(!is_trigger("  "));
        assert!(!is_trigger("start"));
    }

    #[tokio::test]
    async fn test_space_line_starts_election() {
        let listener = InboundListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let node = NodeMiddleware::new("solo".into(), addr);
        let handle = node.handle();
        tokio::spawn(node.run(listener));

        let input: &[u8] = b"hello\n\n \nignored\n";
        run_trigger(input, handle.clone()).await;

        let leader = tokio::time::timeout(Duration::from_secs(5), handle.wait_for_completion())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(leader, NodeId::from("solo"));
    }

    #[tokio::test]
    async fn test_input_without_space_never_starts() {
        let listener = InboundListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let node = NodeMiddleware::new("solo".into(), addr);
        let handle = node.handle();
        tokio::spawn(node.run(listener));

        let input: &[u8] = b"go\nnow\n";
        run_trigger(input, handle.clone()).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.status().leader.is_none());
    }
}
