//! IPC client for daemon communication
//!
//! Connection-per-request over a Unix socket: connect, write one request
//! line, read one response line, done. No connection state to manage.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::protocol::{Request, RequestOp, Response};

/// Client for communicating with the taskdeck daemon
#[derive(Debug, Clone)]
pub struct Client {
    socket_path: PathBuf,
}

impl Client {
    /// Create a new client for the given socket path
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the daemon is reachable and answering
    pub async fn ping(&self) -> Result<bool> {
        match self.request(RequestOp::Ping).await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("Ping failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Send a request to the daemon and wait for the response payload
    pub async fn request(&self, op: RequestOp) -> Result<serde_json::Value> {
        let request = Request::new(op);
        let response = self.send_request(&request).await?;

        // The daemon echoes request_id; a mismatch means crossed wires.
        if response.request_id != request.request_id {
            anyhow::bail!(
                "Response id mismatch: expected {:?}, got {:?}",
                request.request_id,
                response.request_id
            );
        }

        response.into_result().map_err(|e| anyhow::anyhow!(e))
    }

    /// Low-level: send one request line and read one response line
    async fn send_request(&self, request: &Request) -> Result<Response> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to daemon at {}. Is the daemon running?",
                    self.socket_path.display()
                )
            })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut request_json =
            serde_json::to_string(request).context("Failed to serialize request")?;
        request_json.push('\n');

        writer
            .write_all(request_json.as_bytes())
            .await
            .context("Failed to write request")?;
        writer.flush().await.context("Failed to flush request")?;

        trace!("Request sent, waiting for response");

        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .context("Failed to read response")?;

        if response_line.is_empty() {
            anyhow::bail!("Connection closed by daemon");
        }

        serde_json::from_str(&response_line).context("Failed to parse response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keeps_the_socket_path() {
        let client = Client::new("/tmp/test.sock");
        assert_eq!(client.socket_path(), Path::new("/tmp/test.sock"));
    }

    #[tokio::test]
    async fn ping_returns_false_when_no_daemon_listens() {
        let client = Client::new("/tmp/taskdeck-nonexistent-test.sock");
        assert!(!client.ping().await.unwrap());
    }
}
