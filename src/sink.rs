use async_trait::async_trait;

/// The embedding stream's write path, as consumed by the relay task.
///
/// Implementations may layer arbitrary transport concerns (framing,
/// encryption) under `send`; the relay never touches the raw endpoint write
/// when delivering, precisely so those layers are honored.
///
/// Concurrency contract: while a relay is running it is the sole writer into
/// the sink. Callers that need to emit data themselves write to the local
/// endpoint instead (see `PipeStream::raw_write`); calling `send` directly
/// while the relay is active is a contract violation.
#[async_trait]
pub trait RelaySink: Send + Sync {
    /// Deliver bytes through the layered write path.
    ///
    /// Partial acceptance is allowed: returning `Ok(n)` with `n < buf.len()`
    /// makes the relay offer the unsent remainder again. `Ok(0)` signals a
    /// dead sink and stops the relay, as does any error.
    async fn send(&self, buf: &[u8]) -> std::io::Result<usize>;

    /// Best-effort half-close of the sink's write side.
    ///
    /// Invoked once when the relay shuts down. Errors are swallowed by the
    /// caller, so implementations may simply propagate whatever their
    /// transport reports. The default does nothing.
    async fn close_write(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Diagnostic peer/local labels carried by stream-like objects.
pub trait Labeled {
    fn peer_label(&self) -> &str;
    fn local_label(&self) -> &str;
}
