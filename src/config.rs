use easy_error::{Error, ResultExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a pipe-backed stream and its relay task.
///
/// All fields have defaults, so a partial document (or none at all) is fine:
///
/// ```yaml
/// pollTimeoutMs: 200
/// readChunk: 32768
/// pipeCapacity: 65536
/// peerLabel: "Remote Pipe"
/// localLabel: "Local Pipe"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PipeParams {
    /// Upper bound on one relay wait for remote data. This is also the
    /// cancellation latency bound: the relay re-checks its close flag every
    /// time this interval elapses without data.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Largest single read taken from the remote endpoint.
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
    /// Per-direction buffer size of the in-memory pipe fallback. Ignored on
    /// Unix targets, where the pipe is an OS socketpair.
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,
    /// Default diagnostic label for the peer side when none is set.
    #[serde(default = "default_peer_label")]
    pub peer_label: String,
    /// Default diagnostic label for the local side when none is set.
    #[serde(default = "default_local_label")]
    pub local_label: String,
}

fn default_poll_timeout_ms() -> u64 {
    200
}

fn default_read_chunk() -> usize {
    32768
}

fn default_pipe_capacity() -> usize {
    65536
}

fn default_peer_label() -> String {
    "Remote Pipe".to_owned()
}

fn default_local_label() -> String {
    "Local Pipe".to_owned()
}

impl Default for PipeParams {
    fn default() -> Self {
        PipeParams {
            poll_timeout_ms: default_poll_timeout_ms(),
            read_chunk: default_read_chunk(),
            pipe_capacity: default_pipe_capacity(),
            peer_label: default_peer_label(),
            local_label: default_local_label(),
        }
    }
}

impl PipeParams {
    pub async fn load(path: &str) -> Result<Self, Error> {
        let s = tokio::fs::read(path).await.context("read file")?;
        let s = String::from_utf8(s).context("parse utf8")?;
        serde_yaml_ng::from_str(&s).context("parse yaml")
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
