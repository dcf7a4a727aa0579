use anyhow::Result;
use async_trait::async_trait;
use pipebridge::{PipeStream, RelaySink, RelayState};
use std::collections::VecDeque;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

/// Sink recording everything it accepts, with optional partial-acceptance
/// schedule and failure injection.
#[derive(Default)]
struct RecordingSink {
    data: Mutex<Vec<u8>>,
    accepts: Mutex<VecDeque<usize>>,
    calls: Mutex<Vec<usize>>,
    fail_sends: AtomicBool,
    write_closed: AtomicBool,
}

impl RecordingSink {
    fn with_accepts(accepts: &[usize]) -> Self {
        RecordingSink {
            accepts: Mutex::new(accepts.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn data(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelaySink for RecordingSink {
    async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink is broken",
            ));
        }
        let len = match self.accepts.lock().unwrap().pop_front() {
            Some(max) => buf.len().min(max),
            None => buf.len(),
        };
        self.data.lock().unwrap().extend_from_slice(&buf[..len]);
        self.calls.lock().unwrap().push(len);
        Ok(len)
    }

    async fn close_write(&self) -> std::io::Result<()> {
        self.write_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn relay_delivers_exact_byte_sequence() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let mut stream = PipeStream::with_defaults().unwrap();
    stream.start_relay(sink.clone()).unwrap();

    stream.raw_write(b"hello").await?;
    wait_until("sink to receive the write", || sink.data() == b"hello").await;
    assert_eq!(stream.bytes_relayed(), 5);

    stream.close().await;
    Ok(())
}

#[tokio::test]
async fn partial_acceptance_delivers_everything_in_order() -> Result<()> {
    let sink = Arc::new(RecordingSink::with_accepts(&[2, 3]));
    let mut stream = PipeStream::with_defaults().unwrap();
    stream.start_relay(sink.clone()).unwrap();

    stream.raw_write(b"hello").await?;
    wait_until("all five bytes to land", || sink.data() == b"hello").await;

    let calls = sink.calls();
    assert!(calls.len() >= 2, "expected multiple sink calls: {:?}", calls);
    assert_eq!(calls.iter().sum::<usize>(), 5, "no duplication, no loss");

    stream.close().await;
    Ok(())
}

#[tokio::test]
async fn large_transfer_survives_chunking_and_partial_writes() -> Result<()> {
    let payload: Vec<u8> = (0..100_000).map(|i| (i % 256) as u8).collect();

    // prime-sized partial acceptances to force irregular resend offsets
    let schedule: Vec<usize> = std::iter::repeat([997usize, 131, 7919])
        .take(40)
        .flatten()
        .collect();
    let sink = Arc::new(RecordingSink::with_accepts(&schedule));

    let mut stream = PipeStream::with_defaults().unwrap();
    stream.start_relay(sink.clone()).unwrap();

    let mut written = 0;
    while written < payload.len() {
        written += stream.raw_write(&payload[written..]).await?;
    }

    wait_until("the full payload to arrive", || {
        sink.data().len() == payload.len()
    })
    .await;
    assert_eq!(sink.data(), payload, "byte-for-byte identical and in order");
    assert_eq!(stream.bytes_relayed(), payload.len());

    stream.close().await;
    Ok(())
}

#[tokio::test]
async fn sink_failure_stops_relay_and_closes_remote() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    sink.fail_sends.store(true, Ordering::SeqCst);

    let mut stream = PipeStream::with_defaults().unwrap();
    stream.start_relay(sink.clone()).unwrap();

    stream.raw_write(b"doomed").await?;
    wait_until("relay to stop", || {
        stream.relay_state() == RelayState::Stopped
    })
    .await;

    // the relay's own termination path closed the remote endpoint, which
    // surfaces as end of stream on the local side
    let got = stream.raw_read(64).await?;
    assert_eq!(got, None);
    assert!(sink.data().is_empty(), "nothing was forwarded");

    stream.close().await;
    Ok(())
}

#[tokio::test]
async fn remote_eof_shuts_down_without_errors() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let mut stream = PipeStream::with_defaults().unwrap();
    stream.start_relay(sink.clone()).unwrap();

    stream.raw_write(b"bye").await?;
    wait_until("the last bytes to land", || sink.data() == b"bye").await;

    // half-closing our write side is EOF from the relay's point of view
    stream.shutdown(pipebridge::Direction::Write).await?;
    wait_until("relay to stop", || {
        stream.relay_state() == RelayState::Stopped
    })
    .await;
    assert!(
        sink.write_closed.load(Ordering::SeqCst),
        "sink write side was half-closed"
    );

    stream.close().await;
    Ok(())
}

#[tokio::test]
async fn data_before_shutdown_still_arrives() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let mut stream = PipeStream::with_defaults().unwrap();
    stream.start_relay(sink.clone()).unwrap();

    stream.raw_write(b"flush me").await?;
    stream.shutdown(pipebridge::Direction::Write).await?;

    wait_until("relay to stop", || {
        stream.relay_state() == RelayState::Stopped
    })
    .await;
    assert_eq!(sink.data(), b"flush me");

    stream.close().await;
    Ok(())
}
