//! Common error handling utilities and patterns
//!
//! This module provides traits and macros to reduce duplication in error handling
//! across the ingestion crates while maintaining flexibility for crate-specific needs.

/// Common error variants that appear across multiple crates
///
/// This trait provides a standardized interface for common error types
/// while allowing crates to add their own specific variants.
pub trait CommonError: std::error::Error + Send + Sync + 'static {
    /// Create an I/O error variant
    fn io_error(msg: impl Into<String>) -> Self
    where
        Self: Sized;

    /// Create a configuration error variant
    fn config_error(msg: impl Into<String>) -> Self
    where
        Self: Sized;

    /// Create a parsing error variant
    fn parse_error(msg: impl Into<String>) -> Self
    where
        Self: Sized;

    /// Create a generic "other" error variant
    fn other_error(msg: impl Into<String>) -> Self
    where
        Self: Sized;
}

/// Macro to implement common error conversions
///
/// This macro reduces boilerplate for implementing From traits for common error types.
///
/// # Example
/// ```no_run
/// # use ingestor_common::{CommonError, impl_common_conversions};
/// # use thiserror::Error;
/// #
/// # #[derive(Debug, Error)]
/// # enum MyError {
/// #     #[error("IO error: {0}")]
/// #     Io(String),
/// #     #[error("Other error: {0}")]
/// #     Other(String),
/// # }
/// #
/// # impl CommonError for MyError {
/// #     fn io_error(msg: impl Into<String>) -> Self { Self::Io(msg.into()) }
/// #     fn config_error(msg: impl Into<String>) -> Self { Self::Other(msg.into()) }
/// #     fn parse_error(msg: impl Into<String>) -> Self { Self::Other(msg.into()) }
/// #     fn other_error(msg: impl Into<String>) -> Self { Self::Other(msg.into()) }
/// # }
/// #
/// // This macro generates From implementations automatically
/// impl_common_conversions!(MyError);
/// ```
///
/// This will generate:
/// - From<std::io::Error> -> MyError::Io
/// - From<serde_json::Error> -> MyError::Serialization (if applicable)
/// - From<anyhow::Error> -> MyError::Other
#[macro_export]
macro_rules! impl_common_conversions {
    ($error_type:ident) => {
        impl From<std::io::Error> for $error_type {
            fn from(e: std::io::Error) -> Self {
                <$error_type as $crate::CommonError>::io_error(e.to_string())
            }
        }

        impl From<anyhow::Error> for $error_type {
            fn from(e: anyhow::Error) -> Self {
                <$error_type as $crate::CommonError>::other_error(e.to_string())
            }
        }
    };

    // Variant with serde_json support
    ($error_type:ident, with_serde) => {
        impl_common_conversions!($error_type);

        impl From<serde_json::Error> for $error_type {
            fn from(e: serde_json::Error) -> Self {
                <$error_type as $crate::CommonError>::parse_error(format!("JSON: {}", e))
            }
        }
    };
}
