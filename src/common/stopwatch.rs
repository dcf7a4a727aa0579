use std::future::Future;
use std::time::{Duration, Instant};

/// Time an operation on the monotonic clock, returning its result alongside
/// the elapsed duration.
pub fn elapsed<T>(op: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let ret = op();
    (ret, start.elapsed())
}

/// Like [`elapsed`], for futures.
pub async fn elapsed_async<F: Future>(fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let ret = fut.await;
    (ret, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_result_and_duration() {
        let (ret, took) = elapsed(|| {
            std::thread::sleep(Duration::from_millis(10));
            42
        });
        assert_eq!(ret, 42);
        assert!(took >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn times_futures() {
        let (ret, took) = elapsed_async(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "done"
        })
        .await;
        assert_eq!(ret, "done");
        assert!(took >= Duration::from_millis(10));
    }
}
