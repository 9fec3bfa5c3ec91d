//! Unwrap helpers that report where and why a test step failed.
//!
//! Test code in this workspace does not call `unwrap()`. These helpers
//! panic with the error value and, through `#[track_caller]`, the line of
//! the failing call rather than a line inside this module.

use std::fmt::Debug;

/// Unwrap a `Result` that should succeed.
///
/// # Example
///
/// ```rust
/// use fwkit_test_helpers::must;
///
/// let len: Result<usize, String> = Ok(16);
/// assert_eq!(must(len), 16);
/// ```
///
/// # Panics
///
/// Panics if the result is `Err`, printing the error.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// Unwrap the error of a `Result` that should fail.
///
/// # Example
///
/// ```rust
/// use fwkit_test_helpers::must_err;
///
/// let parsed: Result<u32, &str> = Err("bad magic");
/// assert_eq!(must_err(parsed), "bad magic");
/// ```
///
/// # Panics
///
/// Panics if the result is `Ok`, printing the value.
#[track_caller]
pub fn must_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(v) => panic!("must_err: unexpected Ok: {v:?}"),
        Err(e) => e,
    }
}

/// Unwrap an `Option` that should be `Some`.
///
/// # Panics
///
/// Panics with `msg` if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}

/// Decode a hex string, ignoring whitespace, e.g. a vector copied from a
/// datasheet.
///
/// # Example
///
/// ```rust
/// use fwkit_test_helpers::must_hex;
///
/// assert_eq!(must_hex("55 46 44 10"), b"UFD\x10");
/// ```
///
/// # Panics
///
/// Panics if the string is not valid hex.
#[track_caller]
pub fn must_hex(text: &str) -> Vec<u8> {
    let compact: String = text.split_whitespace().collect();
    match hex::decode(&compact) {
        Ok(v) => v,
        Err(e) => panic!("must_hex: invalid hex {text:?}: {e}"),
    }
}

#[cfg(feature = "async")]
mod async_helpers {
    use super::*;
    use std::future::Future;

    /// Await a fallible future that should succeed.
    ///
    /// # Panics
    ///
    /// Panics if the future resolves to `Err`.
    pub async fn must_async<F, T, E>(future: F) -> T
    where
        F: Future<Output = Result<T, E>>,
        E: Debug,
    {
        match future.await {
            Ok(v) => v,
            Err(e) => panic!("must_async: unexpected Err: {e:?}"),
        }
    }
}

#[cfg(feature = "async")]
pub use async_helpers::must_async;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_must_ok() {
        let result: Result<u8, &str> = Ok(0x1A);
        assert_eq!(must(result), 0x1A);
    }

    #[test]
    #[should_panic(expected = "must: unexpected Err: \"short read\"")]
    fn test_must_err_value() {
        let result: Result<u8, &str> = Err("short read");
        let _ = must(result);
    }

    #[test]
    fn test_must_err_returns_error() {
        let result: Result<u8, &str> = Err("bad magic");
        assert_eq!(must_err(result), "bad magic");
    }

    #[test]
    #[should_panic(expected = "must_err: unexpected Ok: 7")]
    fn test_must_err_on_ok() {
        let result: Result<u8, &str> = Ok(7);
        let _ = must_err(result);
    }

    #[test]
    #[should_panic(expected = "must_some: no child")]
    fn test_must_some_none() {
        let _ = must_some(None::<u8>, "no child");
    }

    #[test]
    fn test_must_hex_ignores_whitespace() {
        assert_eq!(must_hex("de ad\nbe ef"), [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    #[should_panic(expected = "must_hex: invalid hex")]
    fn test_must_hex_rejects_odd_length() {
        let _ = must_hex("abc");
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_must_async_ok() {
        async fn erase() -> Result<usize, String> {
            Ok(4096)
        }
        assert_eq!(must_async(erase()).await, 4096);
    }
}
