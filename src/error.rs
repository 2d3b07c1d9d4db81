//! The error value carried by futures.
//!
//! Failures in a job chain are plain values: an integer code plus a human
//! readable message. A code of zero means "no error" and is what error-aware
//! continuations receive when the upstream step succeeded. Rich error
//! hierarchies are deliberately not modeled; callers encode their domain
//! categories in the integer space.

use thiserror::Error as ThisError;

/// A failure reported through a [`Future`](crate::Future).
///
/// The default value has code `0`, which denotes "no error". Any other code
/// marks a failure. A future can accumulate several errors (see
/// [`Future::add_error`](crate::Future::add_error)); the first one in the list
/// is reported as *the* error of the future.
///
/// # Examples
///
/// ```rust
/// use kasync::Error;
///
/// let err = Error::new(404, "user not found");
/// assert!(err.is_error());
/// assert_eq!(err.code, 404);
///
/// let ok = Error::default();
/// assert!(!ok.is_error());
/// ```
#[derive(ThisError, Debug, Clone, Default, PartialEq, Eq)]
#[error("error {code}: {message}")]
pub struct Error {
    /// Numeric error category. Zero means "no error".
    pub code: i32,
    /// Human readable description.
    pub message: String,
}

impl Error {
    /// Create an error with an explicit code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether this value denotes an actual failure (non-zero code).
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

impl From<&str> for Error {
    /// A message-only error with the implied code `1`.
    fn from(message: &str) -> Self {
        Self::new(1, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_no_error() {
        let err = Error::default();
        assert_eq!(err.code, 0);
        assert!(!err.is_error());
    }

    #[test]
    fn from_message_implies_code_one() {
        let err = Error::from("boom");
        assert_eq!(err.code, 1);
        assert_eq!(err.message, "boom");
        assert!(err.is_error());
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = Error::new(3, "lost connection");
        assert_eq!(err.to_string(), "error 3: lost connection");
    }
}
