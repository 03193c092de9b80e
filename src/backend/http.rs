use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::types::{is_retriable_status, BackendError};
use crate::config::RetryPolicy;

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body()
}

fn add_jitter(delay: Duration, divisor: u32) -> Duration {
    if divisor == 0 {
        return delay;
    }
    let max_jitter_ms = delay.as_millis() / u128::from(divisor);
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

/// Send a request, retrying transient failures per `policy`.
///
/// A non-success response that is not retriable (or that is still failing on
/// the last attempt) is returned as-is so the caller can read its body.
pub(super) async fn send_with_retry(
    policy: &RetryPolicy,
    url: &str,
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
) -> Result<reqwest::Response, BackendError> {
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        let last_attempt = attempt + 1 >= max_attempts;
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || !is_retriable_status(status) || last_attempt {
                    return Ok(response);
                }

                let base_delay = policy.base_delay_for(attempt);
                let delay = add_jitter(base_delay, policy.jitter_divisor);
                debug!(
                    "Backend request failed with status {}; retrying in {:?} (base {:?}, attempt {}/{})",
                    status,
                    delay,
                    base_delay,
                    attempt + 1,
                    max_attempts
                );
                let _ = response.bytes().await;
                sleep(delay).await;
            }
            Err(err) => {
                if !is_retriable_send_error(&err) || last_attempt {
                    return Err(BackendError::Transport {
                        url: url.to_string(),
                        attempts: attempt + 1,
                        source: err,
                    });
                }

                let base_delay = policy.base_delay_for(attempt);
                let delay = add_jitter(base_delay, policy.jitter_divisor);
                debug!(
                    "Backend request error: {}; retrying in {:?} (base {:?}, attempt {}/{})",
                    err,
                    delay,
                    base_delay,
                    attempt + 1,
                    max_attempts
                );
                sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_secs(4);
        for _ in 0..50 {
            let delay = add_jitter(base, 4);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_secs(1));
        }
    }

    #[test]
    fn test_jitter_disabled() {
        let base = Duration::from_millis(3);
        assert_eq!(add_jitter(base, 0), base);
        // Too small to jitter.
        assert_eq!(add_jitter(base, 4), base);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener so the port is very likely closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/generate", port);
        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            jitter_divisor: 4,
        };

        let err = send_with_retry(&policy, &url, || client.post(&url))
            .await
            .unwrap_err();
        match err {
            BackendError::Transport { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
