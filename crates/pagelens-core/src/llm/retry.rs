//! Retry utilities for transient provider failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use crate::error::AnalysisError;
use rand::Rng;
use std::time::Duration;

/// Determine whether an analysis error is worth retrying.
///
/// Retryable errors: timeouts, connection failures, rate limits (429),
/// server errors (5xx).
/// Non-retryable: auth failures, bad requests, content blocks, bad images.
pub fn is_retryable(error: &AnalysisError) -> bool {
    match error {
        AnalysisError::Timeout { .. } | AnalysisError::Transport { .. } => true,
        AnalysisError::Api {
            status_code: Some(code),
            ..
        } => *code == 429 || (500..=599).contains(code),
        _ => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Backoff plus up to 10% random jitter so parallel retries spread out.
pub fn jittered_backoff(attempt: u32, base_delay_ms: u64) -> Duration {
    let base = backoff_duration(attempt, base_delay_ms);
    let spread = base.as_millis() as u64 / 10;
    if spread == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::transport_error;
    use std::path::PathBuf;

    #[test]
    fn test_timeout_is_retryable() {
        let err = AnalysisError::Timeout {
            provider: "Gemini".to_string(),
            timeout_ms: 60000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = AnalysisError::Api {
            message: "HTTP 429: rate limit exceeded".to_string(),
            status_code: Some(429),
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_server_error_is_retryable() {
        let err = AnalysisError::Api {
            message: "HTTP 503: service unavailable".to_string(),
            status_code: Some(503),
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_auth_error_not_retryable() {
        let err = AnalysisError::Api {
            message: "HTTP 401: unauthorized".to_string(),
            status_code: Some(401),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_content_block_not_retryable() {
        let err = AnalysisError::ContentBlocked("SAFETY".to_string());
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_decode_error_not_retryable() {
        let err = AnalysisError::Decode {
            path: PathBuf::from("page_1.png"),
            message: "invalid header".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_message_with_500_in_body_not_retryable_without_status() {
        let err = AnalysisError::Api {
            message: "Processed 500 tokens successfully".to_string(),
            status_code: None,
        };
        assert!(!is_retryable(&err));
    }

    #[tokio::test]
    async fn test_refused_connection_is_retryable() {
        // Bind then drop to get a local port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let timeout = Duration::from_secs(5);
        let e = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{port}/models"))
            .timeout(timeout)
            .send()
            .await
            .unwrap_err();

        let err = transport_error("OpenAI", timeout, e);
        assert!(matches!(err, AnalysisError::Transport { .. }), "{err:?}");
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(3, 1000), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_capped_at_30s() {
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        for _ in 0..20 {
            let d = jittered_backoff(1, 1000);
            assert!(d >= Duration::from_millis(2000));
            assert!(d <= Duration::from_millis(2200));
        }
        assert_eq!(jittered_backoff(0, 5), Duration::from_millis(5));
    }
}
