use crate::error::MiddlewareError;

/// Bounded retry policy for statement execution.
///
/// An error the classifier accepts earns a forced reconnect and one more attempt, up to
/// [`RetryPolicy::max_retries`] times per call. Everything else propagates unchanged.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    classifier: fn(&MiddlewareError) -> bool,
    max_retries: u32,
}

impl Default for RetryPolicy {
    /// Retry once after "server has gone away" (2006) or "lost connection" (2013).
    fn default() -> Self {
        Self {
            classifier: MiddlewareError::is_transient,
            max_retries: 1,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries errors accepted by `classifier`, once per call.
    #[must_use]
    pub fn with_classifier(classifier: fn(&MiddlewareError) -> bool) -> Self {
        Self {
            classifier,
            ..Self::default()
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether `err` is worth another attempt after `retries` retries in the current call.
    #[must_use]
    pub fn should_retry(&self, err: &MiddlewareError, retries: u32) -> bool {
        retries < self.max_retries && (self.classifier)(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CR_SERVER_GONE_ERROR, CR_SERVER_LOST, DriverError};

    fn driver(code: u16) -> MiddlewareError {
        DriverError::with_code(code, "boom").into()
    }

    #[test]
    fn retries_transient_codes_once() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&driver(CR_SERVER_GONE_ERROR), 0));
        assert!(policy.should_retry(&driver(CR_SERVER_LOST), 0));
        assert!(!policy.should_retry(&driver(CR_SERVER_LOST), 1));
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(&driver(1062), 0));
        assert!(!policy.should_retry(&MiddlewareError::Query("bad".into()), 0));
        assert!(!RetryPolicy::never().should_retry(&driver(CR_SERVER_LOST), 0));
    }

    #[test]
    fn custom_classifier() {
        let policy = RetryPolicy::with_classifier(|err| err.driver_code() == Some(1213));
        assert!(policy.should_retry(&driver(1213), 0));
        assert!(!policy.should_retry(&driver(CR_SERVER_LOST), 0));
    }
}
