use bytes::Bytes;
use easy_error::{Error, bail};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    config::PipeParams,
    io::pipe::{Direction, Endpoint, pipe_pair},
    relay::{MonitorHandle, RelayMonitor, RelayState},
    sink::{Labeled, RelaySink},
};

/// A stream abstraction backed by a duplex pipe.
///
/// The abstraction owns the local endpoint; callers read and write it
/// directly through [`raw_read`](PipeStream::raw_read) and
/// [`raw_write`](PipeStream::raw_write). Once
/// [`start_relay`](PipeStream::start_relay) hands the remote endpoint to the
/// relay task, bytes written locally surface on the sink's layered write
/// path.
pub struct PipeStream {
    local: Endpoint,
    remote: Option<Endpoint>,
    monitor: Option<MonitorHandle>,
    relayed: Arc<AtomicUsize>,
    peer_label: Option<String>,
    local_label: Option<String>,
    params: PipeParams,
    closed: bool,
}

impl PipeStream {
    /// Create the pipe pair backing a new stream abstraction.
    ///
    /// Pipe creation failure is fatal and propagated; it is never retried.
    pub fn new(params: PipeParams) -> Result<Self, Error> {
        let (local, remote) = pipe_pair(params.pipe_capacity)?;
        Ok(PipeStream {
            local,
            remote: Some(remote),
            monitor: None,
            relayed: Arc::new(AtomicUsize::new(0)),
            peer_label: None,
            local_label: None,
            params,
            closed: false,
        })
    }

    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(PipeParams::default())
    }

    /// Hand the remote endpoint to a freshly spawned relay task delivering
    /// into `sink`. At most one relay exists per stream, ever.
    pub fn start_relay(&mut self, sink: Arc<dyn RelaySink>) -> Result<(), Error> {
        if self.closed {
            bail!("stream is closed");
        }
        if self.monitor.is_some() {
            bail!("relay monitor already started");
        }
        let remote = match self.remote.take() {
            Some(remote) => remote,
            None => bail!("remote endpoint is gone"),
        };
        self.monitor = Some(RelayMonitor::spawn(
            remote,
            sink,
            &self.params,
            self.relayed.clone(),
        ));
        Ok(())
    }

    /// Write directly to the local endpoint, bypassing the relay.
    pub async fn raw_write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.local.write(buf).await
    }

    /// Read directly from the local endpoint. `None` is end of stream.
    pub async fn raw_read(&mut self, max_len: usize) -> std::io::Result<Option<Bytes>> {
        if max_len == 0 {
            return Ok(Some(Bytes::new()));
        }
        let mut buf = vec![0u8; max_len];
        let len = self.local.read(&mut buf).await?;
        if len == 0 {
            Ok(None)
        } else {
            buf.truncate(len);
            Ok(Some(Bytes::from(buf)))
        }
    }

    /// Half-close the local endpoint.
    pub async fn shutdown(&mut self, how: Direction) -> std::io::Result<()> {
        self.local.shutdown(how).await
    }

    /// Tear down the relay task and both endpoints.
    ///
    /// Idempotent. The first call flags the relay, waits until it has fully
    /// stopped (the relay closes the remote endpoint on its own termination
    /// path), then closes whatever endpoints are still owned here.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(handle) = self.monitor.take() {
            handle.close().await;
        }
        // no relay ever claimed the remote endpoint, so it is still ours
        if let Some(mut remote) = self.remote.take() {
            remote.close().await;
        }
        self.local.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Lifecycle state of the relay task.
    pub fn relay_state(&self) -> RelayState {
        match &self.monitor {
            Some(handle) => handle.state(),
            None if self.closed => RelayState::Stopped,
            None => RelayState::Idle,
        }
    }

    /// Total bytes the relay has delivered into the sink.
    pub fn bytes_relayed(&self) -> usize {
        self.relayed.load(Ordering::Relaxed)
    }

    /// The running relay's handle, while one exists.
    pub fn monitor(&self) -> Option<&MonitorHandle> {
        self.monitor.as_ref()
    }

    /// Attach diagnostic peer/local labels.
    pub fn set_labels<P: Into<String>, L: Into<String>>(&mut self, peer: P, local: L) {
        self.peer_label = Some(peer.into());
        self.local_label = Some(local.into());
    }
}

impl Labeled for PipeStream {
    fn peer_label(&self) -> &str {
        self.peer_label.as_deref().unwrap_or(&self.params.peer_label)
    }

    fn local_label(&self) -> &str {
        self.local_label
            .as_deref()
            .unwrap_or(&self.params.local_label)
    }
}

impl std::fmt::Debug for PipeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeStream")
            .field("peer", &self.peer_label())
            .field("local", &self.local_label())
            .field("state", &self.relay_state())
            .field("closed", &self.closed)
            .finish()
    }
}
