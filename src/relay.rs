use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicUsize, Ordering},
};
use std::time::Duration;

use tokio::{task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{config::PipeParams, io::Endpoint, sink::RelaySink};

/// Lifecycle of a relay task. Entered once per stream, never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelayState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl RelayState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RelayState::Idle,
            1 => RelayState::Running,
            _ => RelayState::Stopped,
        }
    }
}

/// The background task pumping the remote endpoint into a [`RelaySink`].
///
/// The monitor owns the remote endpoint outright: nothing else reads it, and
/// the definitive close of that endpoint happens on the task's own
/// termination path. Shutdown is strictly cooperative; the cancellation
/// token is observed between bounded waits, never enforced by aborting the
/// task.
pub(crate) struct RelayMonitor {
    remote: Endpoint,
    sink: Arc<dyn RelaySink>,
    token: CancellationToken,
    state: Arc<AtomicU8>,
    relayed: Arc<AtomicUsize>,
    poll_timeout: Duration,
    read_chunk: usize,
}

impl RelayMonitor {
    /// Spawn the relay task for `remote`, delivering into `sink`. Delivered
    /// byte counts accumulate into `relayed`.
    pub(crate) fn spawn(
        remote: Endpoint,
        sink: Arc<dyn RelaySink>,
        params: &PipeParams,
        relayed: Arc<AtomicUsize>,
    ) -> MonitorHandle {
        let token = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(RelayState::Idle as u8));
        let monitor = RelayMonitor {
            remote,
            sink,
            token: token.clone(),
            state: state.clone(),
            relayed: relayed.clone(),
            poll_timeout: params.poll_timeout(),
            read_chunk: params.read_chunk,
        };
        let task = tokio::spawn(monitor.run());
        MonitorHandle {
            token,
            task,
            state,
            relayed,
        }
    }

    async fn run(mut self) {
        self.state
            .store(RelayState::Running as u8, Ordering::SeqCst);
        let mut buf = vec![0u8; self.read_chunk];
        loop {
            if self.token.is_cancelled() {
                debug!("relay: close requested, exiting loop");
                break;
            }
            if self.remote.is_closed() {
                debug!("relay: remote endpoint is gone, exiting loop");
                break;
            }
            let len = match timeout(self.poll_timeout, self.remote.read(&mut buf)).await {
                // nothing ready within the poll interval, re-check the flag
                Err(_) => continue,
                Ok(Ok(0)) => {
                    debug!("relay: end of stream on remote endpoint");
                    break;
                }
                Ok(Ok(len)) => len,
                Ok(Err(e)) => {
                    warn!("relay: read error on remote endpoint: {}", e);
                    break;
                }
            };
            if let Err(e) = self.forward(&buf[..len]).await {
                warn!("relay: failed to deliver to sink: {}", e);
                break;
            }
        }

        // Half-close the sink's write side. Failures here must never escape
        // the task.
        if let Err(e) = self.sink.close_write().await {
            debug!("relay: close_write on sink failed: {}", e);
        }
        self.state
            .store(RelayState::Stopped as u8, Ordering::SeqCst);
        self.remote.close().await;
    }

    /// Deliver `buf` in full, retrying the unsent remainder after partial
    /// acceptance. Bytes are never re-read from the endpoint; only what the
    /// sink has accepted leaves the buffer.
    async fn forward(&mut self, buf: &[u8]) -> std::io::Result<()> {
        // Delivery must go through the layered sink, not the raw endpoint
        // write: the sink may wrap the transport in framing or encryption.
        let mut sent = 0;
        while sent < buf.len() {
            let len = self.sink.send(&buf[sent..]).await?;
            if len == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "sink accepted no bytes",
                ));
            }
            sent += len;
            self.relayed.fetch_add(len, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Owner-side handle to a running relay task.
///
/// Dropping the handle does not stop the task; call [`MonitorHandle::close`]
/// for the cooperative shutdown handshake.
pub struct MonitorHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    state: Arc<AtomicU8>,
    relayed: Arc<AtomicUsize>,
}

impl MonitorHandle {
    pub fn state(&self) -> RelayState {
        RelayState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Total bytes delivered to the sink so far.
    pub fn bytes_relayed(&self) -> usize {
        self.relayed.load(Ordering::Relaxed)
    }

    pub fn close_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Flag the task to stop without waiting for it.
    pub fn request_close(&self) {
        self.token.cancel();
    }

    /// Cooperative close: flag the task, then wait until it has fully
    /// stopped. The remote endpoint is closed by the task itself before
    /// this returns.
    pub async fn close(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!("relay: monitor task failed: {}", e);
        }
    }
}
