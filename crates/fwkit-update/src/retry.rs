//! Bounded retry for backend operations

use std::thread;

use fwkit_errors::DeviceError;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{UpdateError, UpdateResult};

/// Run `op` against `target` until it succeeds or `policy` runs out.
///
/// Between attempts the policy delay elapses and `recover` runs against the
/// same target. Errors for which [`DeviceError::is_fatal_for_retry`] holds
/// end the loop immediately.
///
/// # Errors
///
/// - [`UpdateError::Device`] for a fatal error, or when the policy allows a
///   single attempt
/// - [`UpdateError::RetriesExhausted`] with the last error once every
///   attempt failed
/// - [`UpdateError::RecoveryFailed`] if `recover` fails
pub fn retry_with<S, T, F, R>(
    policy: &RetryPolicy,
    operation: &str,
    target: &mut S,
    mut op: F,
    mut recover: R,
) -> UpdateResult<T>
where
    S: ?Sized,
    F: FnMut(&mut S) -> Result<T, DeviceError>,
    R: FnMut(&mut S) -> Result<(), DeviceError>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1u32;
    loop {
        let error = match op(target) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if error.is_fatal_for_retry() {
            debug!(operation, error = %error, "not retrying fatal error");
            return Err(error.into());
        }
        if attempt >= attempts {
            if attempts == 1 {
                return Err(error.into());
            }
            return Err(UpdateError::RetriesExhausted {
                operation: operation.to_string(),
                retries: attempts.saturating_sub(1),
                source: error,
            });
        }
        warn!(operation, attempt, attempts, error = %error, "operation failed, retrying");
        let delay = policy.delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        recover(target).map_err(|source| UpdateError::RecoveryFailed {
            operation: operation.to_string(),
            source,
        })?;
        attempt = attempt.saturating_add(1);
    }
}

/// [`retry_with`] without a recovery step.
///
/// # Errors
///
/// See [`retry_with`].
pub fn retry<S, T, F>(policy: &RetryPolicy, operation: &str, target: &mut S, op: F) -> UpdateResult<T>
where
    S: ?Sized,
    F: FnMut(&mut S) -> Result<T, DeviceError>,
{
    retry_with(policy, operation, target, op, |_| Ok(()))
}
