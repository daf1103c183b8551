//! Error types for the collision core.
//!
//! Numerical algorithms never return errors; convergence failure is reported as a
//! negative result plus a logged warning. [`CollisionError`] covers the registration
//! and configuration paths that must fail fast.

use std::fmt;

/// Main error type for shape construction and broad-phase bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionError {
    /// A shape was built with a non-positive or non-finite dimension.
    InvalidShape(String),
    /// A proxy id does not refer to a registered proxy (removed or never added).
    UnknownProxy(String),
    /// An argument is outside its documented range.
    InvalidArgument(String),
    /// Tree storage would grow beyond its hard ceiling.
    CapacityExceeded(String),
}

impl fmt::Display for CollisionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidShape(msg) => write!(f, "Invalid shape: {msg}"),
            Self::UnknownProxy(msg) => write!(f, "Unknown proxy: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::CapacityExceeded(msg) => write!(f, "Capacity exceeded: {msg}"),
        }
    }
}

impl std::error::Error for CollisionError {}

/// Convenient Result type alias for collision operations.
pub type Result<T> = std::result::Result<T, CollisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CollisionError::InvalidShape("radius must be positive".to_string());
        assert!(err.to_string().contains("Invalid shape"));
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn test_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&CollisionError::UnknownProxy("#3".into()));
    }
}
