//! Rate-limit retry integration tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use nour_classroom::gemini::{RetryPolicy, with_retry};
use nour_classroom::{ApiError, ApiErrorKind, Error};

fn policy(base_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(base_ms),
    }
}

/// Paused-clock timers fire on millisecond ticks
fn assert_close(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(5),
        "expected about {expected:?}, got {actual:?}"
    );
}

fn rate_limited() -> Error {
    ApiError::classify(
        429,
        r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","message":"Resource has been exhausted"}}"#,
    )
    .into()
}

#[tokio::test(start_paused = true)]
async fn test_two_rate_limits_then_success() {
    let calls = AtomicU32::new(0);
    let times = Mutex::new(Vec::new());

    let result = with_retry(&policy(2000), "script", || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst);
        times.lock().unwrap().push(Instant::now());
        async move {
            if attempt < 2 {
                Err(rate_limited())
            } else {
                Ok("lesson")
            }
        }
    })
    .await;

    assert_eq!(tokio_test::assert_ok!(result), "lesson");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let times = times.into_inner().unwrap();
    assert_close(times[1] - times[0], Duration::from_millis(2000));
    assert_close(times[2] - times[1], Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn test_non_rate_limit_error_is_not_retried() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let result: nour_classroom::Result<()> = with_retry(&policy(2000), "exam", || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(ApiError::classify(400, "bad request").into()) }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    match result {
        Err(Error::Api(e)) => {
            assert_eq!(e.status, 400);
            assert_eq!(e.kind, ApiErrorKind::InvalidRequest);
            assert_eq!(e.message, "bad request");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_are_not_retried() {
    let calls = AtomicU32::new(0);

    let result: nour_classroom::Result<()> = with_retry(&policy(10), "speech", || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(Error::Live("connection reset".to_string())) }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(Error::Live(_))));
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_retries() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let result: nour_classroom::Result<()> = with_retry(&policy(100), "summary", || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(rate_limited()) }
    })
    .await;

    // One call plus three retries, waiting 100 + 200 + 400 ms
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_close(started.elapsed(), Duration::from_millis(700));
    assert!(tokio_test::assert_err!(result).is_rate_limited());
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_calls_once() {
    let calls = AtomicU32::new(0);
    let no_retry = RetryPolicy {
        max_retries: 0,
        ..policy(100)
    };

    let result: nour_classroom::Result<()> = with_retry(&no_retry, "script", || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(rate_limited()) }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_each_call_gets_fresh_budget() {
    let calls = AtomicU32::new(0);
    let policy = policy(50);

    for _ in 0..2 {
        let before = calls.load(Ordering::SeqCst);
        let result = with_retry(&policy, "script", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) - before;
            async move {
                if attempt < 3 {
                    Err(rate_limited())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 8);
}
