//! Bounded retry for transient write failures
//!
//! A write that loses a lock race, or whose link synchronization hits a
//! busy database, is rolled back as a whole. Re-running it is safe because
//! link synchronization is idempotent, so the repository simply tries the
//! entire operation again with exponential backoff.

use std::time::Duration;

use crate::core::error::StoreError;

/// Configuration for retry behavior on transient store errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one)
    pub max_attempts: u32,
    /// Initial delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here)
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub fn run<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        ?delay,
                        error = %e,
                        "transient store error, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(operation, attempts, error = %e, "transient store error, giving up");
                    return Err(e);
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn busy() -> StoreError {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.delay_for(1), Duration::from_millis(100));
        assert_eq!(cfg.delay_for(2), Duration::from_millis(200));
        assert_eq!(cfg.delay_for(3), Duration::from_millis(400));
        assert_eq!(cfg.delay_for(10), Duration::from_secs(2));
        assert_eq!(cfg.delay_for(64), Duration::from_secs(2));
    }

    #[test]
    fn test_transient_error_is_retried_until_success() {
        let calls = Cell::new(0);
        let result = fast(4).run("create", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(busy())
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), _> = fast(3).run("create", || {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_exhausted_retries_are_logged() {
        let (result, log) = crate::core::test_log::capture_warnings(|| {
            fast(2).run("update", || -> Result<(), StoreError> { Err(busy()) })
        });
        assert!(result.unwrap_err().is_transient());
        assert!(log.contains("retrying"));
        assert!(log.contains("giving up"));
        assert!(log.contains("update"));
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = fast(4).run("create", || {
            calls.set(calls.get() + 1);
            Err(StoreError::ReadOnlyField {
                field: "isActive".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
