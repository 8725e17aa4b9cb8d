//! Error types for lrmap.

use thiserror::Error;

/// Result type alias using LrMapError.
pub type Result<T> = std::result::Result<T, LrMapError>;

/// Errors that can occur in lrmap operations.
///
/// Every variant is a usage or invariant error. The data path itself cannot
/// fail short of running out of memory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LrMapError {
    // Reader protocol violations
    #[error("reader illegal state: must not enter twice")]
    AlreadyEntered,

    #[error("reader illegal state: must enter before operating on data")]
    NotEntered,

    #[error("reader illegal state: handle must leave before release")]
    ReleaseWhileInside,

    #[error("reader illegal state: handle used after release")]
    HandleReleased,

    // Coordinator invariant violations
    #[error("corrupted designator: {0} names neither arena")]
    CorruptDesignator(u8),

    #[error("map poisoned by an earlier internal fault")]
    Poisoned,

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LrMapError {
    /// Returns true if the error was caused by misuse of a reader handle.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            LrMapError::AlreadyEntered
                | LrMapError::NotEntered
                | LrMapError::ReleaseWhileInside
                | LrMapError::HandleReleased
        )
    }

    /// Returns true if the coordinator that produced this error can no
    /// longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LrMapError::CorruptDesignator(_) | LrMapError::Poisoned | LrMapError::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_display() {
        let err = LrMapError::AlreadyEntered;
        assert_eq!(err.to_string(), "reader illegal state: must not enter twice");

        let err = LrMapError::NotEntered;
        assert_eq!(
            err.to_string(),
            "reader illegal state: must enter before operating on data"
        );

        let err = LrMapError::ReleaseWhileInside;
        assert_eq!(
            err.to_string(),
            "reader illegal state: handle must leave before release"
        );

        let err = LrMapError::HandleReleased;
        assert_eq!(err.to_string(), "reader illegal state: handle used after release");
    }

    #[test]
    fn test_corrupt_designator_display() {
        let err = LrMapError::CorruptDesignator(7);
        assert_eq!(err.to_string(), "corrupted designator: 7 names neither arena");
    }

    #[test]
    fn test_poisoned_display() {
        let err = LrMapError::Poisoned;
        assert_eq!(err.to_string(), "map poisoned by an earlier internal fault");
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = LrMapError::InvalidParameter {
            name: "backoff.multiplier".to_string(),
            value: "1".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: backoff.multiplier = 1");
    }

    #[test]
    fn test_internal_error_display() {
        let err = LrMapError::Internal("assertion failed".to_string());
        assert_eq!(err.to_string(), "Internal error: assertion failed");
    }

    #[test]
    fn test_classification() {
        for err in [
            LrMapError::AlreadyEntered,
            LrMapError::NotEntered,
            LrMapError::ReleaseWhileInside,
            LrMapError::HandleReleased,
        ] {
            assert!(err.is_protocol_violation(), "{err}");
            assert!(!err.is_fatal(), "{err}");
        }

        for err in [
            LrMapError::CorruptDesignator(2),
            LrMapError::Poisoned,
            LrMapError::Internal("x".to_string()),
        ] {
            assert!(err.is_fatal(), "{err}");
            assert!(!err.is_protocol_violation(), "{err}");
        }

        let err = LrMapError::InvalidParameter {
            name: "x".to_string(),
            value: "y".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(!err.is_protocol_violation());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(LrMapError::NotEntered)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LrMapError>();
    }
}
