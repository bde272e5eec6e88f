//! Retry decisions for GitHub API requests.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_BACKOFF_DOUBLINGS: u32 = 10;

/// Bounded exponential backoff, shared by every request a client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Both values are clamped to at least one attempt and one millisecond.
    pub fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms.max(1)),
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry_after(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`.
    ///
    /// A server hint wins but never undercuts the base delay.
    pub fn backoff(&self, attempt: usize, server_hint: Option<Duration>) -> Duration {
        if let Some(hint) = server_hint {
            return hint.max(self.base_delay);
        }
        let doublings = u32::try_from(attempt.saturating_sub(1))
            .unwrap_or(MAX_BACKOFF_DOUBLINGS)
            .min(MAX_BACKOFF_DOUBLINGS);
        self.base_delay
            .saturating_mul(1_u32 << doublings)
            .min(MAX_BACKOFF)
    }
}

/// `retry-after` in whole seconds; HTTP-date values are ignored.
pub fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(seconds))
}

pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub fn is_transient_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Clip response text for inclusion in an error message.
pub fn clip_error_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use reqwest::StatusCode;

    use super::{clip_error_text, is_transient_status, retry_after_hint, RetryPolicy};

    #[test]
    fn unit_backoff_doubles_per_attempt_and_caps() {
        let policy = RetryPolicy::new(5, 100);
        assert_eq!(policy.backoff(1, None), Duration::from_millis(100));
        assert_eq!(policy.backoff(2, None), Duration::from_millis(200));
        assert_eq!(policy.backoff(4, None), Duration::from_millis(800));
        assert_eq!(
            RetryPolicy::new(5, 10_000).backoff(9, None),
            Duration::from_secs(30)
        );
        assert_eq!(policy.backoff(usize::MAX, None), Duration::from_secs(30));
    }

    #[test]
    fn unit_backoff_prefers_server_hint_but_not_below_base() {
        let policy = RetryPolicy::new(3, 500);
        assert_eq!(
            policy.backoff(3, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.backoff(1, Some(Duration::ZERO)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn unit_policy_clamps_attempts_and_bounds_retries() {
        let policy = RetryPolicy::new(0, 0);
        assert_eq!(policy, RetryPolicy::new(1, 1));
        assert!(!policy.allows_retry_after(1));

        let policy = RetryPolicy::new(3, 1);
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));
    }

    #[test]
    fn unit_retry_after_hint_reads_integer_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_hint(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 7 "));
        assert_eq!(retry_after_hint(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after_hint(&headers), None);
    }

    #[test]
    fn unit_transient_statuses_cover_rate_limits_and_server_errors() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn unit_clip_error_text_respects_char_boundaries() {
        assert_eq!(clip_error_text("short", 10), "short");
        assert_eq!(clip_error_text("exact", 5), "exact");
        assert_eq!(clip_error_text("ééééé", 2), "éé...");
    }
}
