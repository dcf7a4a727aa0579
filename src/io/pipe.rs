use easy_error::{Error, ResultExt};
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// A trait for the type-erased duplex streams backing pipe endpoints
pub trait PipeIo: AsyncRead + AsyncWrite + Send + Sync + Unpin {}
impl<T> PipeIo for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

/// Which side of an endpoint a half-close applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
    Both,
}

/// One side of a duplex pipe.
///
/// Each direction is held as a separate half so it can be shut down
/// independently. An endpoint with both halves gone is closed; byte
/// operations on it fail with `ErrorKind::NotConnected`.
pub struct Endpoint {
    reader: Option<ReadHalf<Box<dyn PipeIo>>>,
    writer: Option<WriteHalf<Box<dyn PipeIo>>>,
}

/// Create the two connected endpoints of a duplex pipe.
///
/// On Unix the pipe is an OS socketpair; elsewhere an in-memory duplex
/// channel buffering `capacity` bytes per direction stands in. Must be
/// called from within a tokio runtime.
pub fn pipe_pair(capacity: usize) -> Result<(Endpoint, Endpoint), Error> {
    #[cfg(unix)]
    {
        let _ = capacity;
        let (a, b) = tokio::net::UnixStream::pair().context("create socket pair")?;
        Ok((Endpoint::new(a), Endpoint::new(b)))
    }
    #[cfg(not(unix))]
    {
        let (a, b) = tokio::io::duplex(capacity);
        Ok((Endpoint::new(a), Endpoint::new(b)))
    }
}

impl Endpoint {
    fn new<T: PipeIo + 'static>(stream: T) -> Self {
        let (reader, writer) = tokio::io::split(Box::new(stream) as Box<dyn PipeIo>);
        Endpoint {
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    fn closed_err() -> IoError {
        IoError::new(IoErrorKind::NotConnected, "endpoint is closed")
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` is end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.reader.as_mut() {
            Some(r) => r.read(buf).await,
            None => Err(Self::closed_err()),
        }
    }

    /// Write from `buf`, returning how many bytes the pipe accepted.
    pub async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.writer.as_mut() {
            Some(w) => {
                let len = w.write(buf).await?;
                w.flush().await?;
                Ok(len)
            }
            None => Err(Self::closed_err()),
        }
    }

    /// Half-close this endpoint. Shutting down an already-gone direction is
    /// a no-op.
    pub async fn shutdown(&mut self, how: Direction) -> std::io::Result<()> {
        if matches!(how, Direction::Write | Direction::Both)
            && let Some(mut w) = self.writer.take()
        {
            w.shutdown().await?;
        }
        if matches!(how, Direction::Read | Direction::Both) {
            self.reader.take();
        }
        Ok(())
    }

    /// Close both directions. Used on teardown paths that must not fail, so
    /// shutdown errors are swallowed.
    pub async fn close(&mut self) {
        if let Some(mut w) = self.writer.take() {
            let _ = w.shutdown().await;
        }
        self.reader.take();
    }
}
