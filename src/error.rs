use thiserror::Error as ThisError;

/// Error type returned by the fallible operations of this crate.
///
/// Column-by-name lookup misses are *not* represented here (spec.md §7
/// `NotFound`): a miss is encoded as index `-1` / `None`, never an `Err`.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An error propagated verbatim from the native driver (SQLite or ODBC).
    #[error("the driver reported an error: {0}")]
    Driver(String),
    /// An operation was attempted while the cursor was in the wrong state,
    /// e.g. `bind_parameter` before `prepare`.
    #[error("invalid cursor state: {0}")]
    State(String),
    /// A parameter's variant group has no mapping onto the driver's native
    /// bind types.
    #[error("type mismatch binding parameter {index}: {message}")]
    TypeMismatch {
        /// 1-based parameter index.
        index: usize,
        message: String,
    },
    /// Growing a fixed, variable, or name-arena buffer failed.
    #[error("out of memory growing {what}")]
    OutOfMemory {
        /// Which buffer failed to grow (`"fixed region"`, `"name arena"`, ...).
        what: &'static str,
    },
}

impl Error {
    pub(crate) fn driver(message: impl Into<String>) -> Self {
        Error::Driver(message.into())
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Error::State(message.into())
    }
}

/// Result alias used throughout the crate's internal, idiomatic surface.
pub type Result<T> = std::result::Result<T, Error>;

/// The `(ok, message)` pair shape required by spec.md §6 "Error strings".
///
/// This is the one seam where the crate's idiomatic `Result<T, Error>`
/// degrades to the C-ABI-flavored pair the façade (§4.6) exposes to callers
/// that hold a driver-agnostic handle. Empty message on success.
pub type OkMessage = (bool, String);

/// Converts an idiomatic result into the façade's `(ok, message)` pair,
/// discarding the success value (the façade's fallible operations are all
/// side-effecting: `execute`, `open`, `close`, ...).
pub(crate) fn to_ok_message<T>(result: Result<T>) -> OkMessage {
    match result {
        Ok(_) => (true, String::new()),
        Err(err) => (false, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_empty_message() {
        let (ok, message) = to_ok_message(Ok(()));
        assert!(ok);
        assert!(message.is_empty());
    }

    #[test]
    fn failure_carries_driver_text() {
        let (ok, message) = to_ok_message::<()>(Err(Error::driver("no such table: t")));
        assert!(!ok);
        assert_eq!(message, "the driver reported an error: no such table: t");
    }
}
