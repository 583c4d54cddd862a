//! Timeout utilities for driver operations
//!
//! Every suspension point in a session (navigation, element waits, clicks
//! that trigger navigation) is bounded. Expiry becomes a
//! [`DriverError::Timeout`] that the session's retry policy understands.

use std::future::Future;
use std::time::Duration;

use super::errors::{DriverError, DriverResult};

/// Run a driver operation with an explicit timeout.
///
/// # Arguments
/// * `operation` - The driver future
/// * `timeout` - Upper bound for the operation
/// * `operation_name` - Human-readable name for error messages
pub async fn with_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &str,
) -> DriverResult<T>
where
    F: Future<Output = DriverResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            operation: operation_name.to_string(),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expiry_maps_to_timeout_error() {
        let result: DriverResult<()> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_millis(10),
            "navigate",
        )
        .await;

        assert_eq!(
            result,
            Err(DriverError::Timeout {
                operation: "navigate".into(),
                after_ms: 10
            })
        );
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let result: DriverResult<()> = with_timeout(
            async { Err(DriverError::StaleElement) },
            Duration::from_secs(1),
            "click",
        )
        .await;
        assert_eq!(result, Err(DriverError::StaleElement));
    }
}
