//! Retry decision for failed execution attempts.

use crate::models::ErrorType;

/// Whether a case whose latest attempt ended in `error_type` gets another
/// attempt.
///
/// `attempts` is how many attempts have been made so far (at least 1) and
/// `max_retries` the number of extra attempts allowed on top of the first.
/// Only execution-time failures qualify.
pub fn should_retry(error_type: ErrorType, attempts: u32, max_retries: u32) -> bool {
    error_type.is_retryable() && attempts <= max_retries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget() {
        assert!(should_retry(ErrorType::Timeout, 1, 1));
        assert!(!should_retry(ErrorType::Timeout, 2, 1));
        assert!(!should_retry(ErrorType::ExecutionError, 1, 0));
    }

    #[test]
    fn test_deterministic_failures_never_retry() {
        for error_type in [
            ErrorType::None,
            ErrorType::ValidationError,
            ErrorType::PlannerError,
            ErrorType::RecipeRenderError,
        ] {
            assert!(!should_retry(error_type, 1, 5), "{error_type:?}");
        }
    }
}
