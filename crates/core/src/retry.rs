//! Retry on expired authorization
//!
//! B2 asks clients to re-authenticate and try again when a request fails
//! with HTTP 401. That is the only automatic retry in bz: network errors,
//! 429 and 503 responses are returned to the caller unchanged.

use crate::error::{Error, Result};

/// Attempts made by an upload before giving up
pub const DEFAULT_UPLOAD_ATTEMPTS: u32 = 5;

/// Run `operation` until it succeeds, fails with something other than a
/// 401, or `max_attempts` runs have been made.
///
/// Before every retry `refresh` is awaited once; if the refresh itself fails
/// its error is returned and no further attempt is made. The operation
/// receives the 1-based attempt number. When the budget is exhausted the
/// last 401 is returned.
///
/// # Example
/// ```ignore
/// let info = retry_on_unauthorized(
///     5,
///     |_attempt| async { bucket.try_upload_once(&body).await },
///     || async { session.refresh(None).await },
/// ).await?;
/// ```
pub async fn retry_on_unauthorized<T, F, Fut, R, RFut>(
    max_attempts: u32,
    mut operation: F,
    mut refresh: R,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: FnMut() -> RFut,
    RFut: std::future::Future<Output = Result<()>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !is_auth_retryable(&e) {
                    return Err(e);
                }

                tracing::debug!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Authorization rejected, refreshing session before retry"
                );

                refresh().await?;
            }
        }
    }
}

/// Check if an error should trigger a session refresh and retry
pub fn is_auth_retryable(error: &Error) -> bool {
    error.is_unauthorized()
}
