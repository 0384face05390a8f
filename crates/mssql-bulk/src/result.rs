//! Caller-visible outcome of a bulk or SQL operation.

use crate::error::BulkError;

/// Success flag plus an optional diagnostic message.
///
/// Every bulk and staging-SQL operation returns one of these instead of
/// raising; callers decide whether to roll back an ambient transaction
/// based on `success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub message: Option<String>,
}

impl OperationResult {
    /// Successful operation with no message.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Successful operation carrying a diagnostic message.
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    /// Failed operation carrying the underlying error's message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Convert an error into a failure result, keeping only the message.
    pub fn from_error(err: &BulkError) -> Self {
        Self::fail(err.to_string())
    }
}
