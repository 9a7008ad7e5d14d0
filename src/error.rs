//! Error types shared by the runner, the registry and applications.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A value that is not an assignable [`Status`](crate::application::Status).
    #[error("invalid status `{0}`: expected WAITING, RUNNING, SUCCESS or ERROR")]
    InvalidStatus(String),

    #[error("API `{0}` does not exist")]
    ApiNotFound(String),

    /// A registration broke the application contract and was excluded.
    #[error("application `{name}` rejected: {reason}")]
    Contract { name: String, reason: String },

    /// A job body failed and its application asked for the failure to propagate.
    #[error("application `{name}` failed: {message}")]
    Execution { name: String, message: String },

    #[error("invalid recurrence `{expr}`: {reason}")]
    Recurrence { expr: String, reason: String },

    #[error("preview horizon of {0} hours is out of range")]
    Horizon(u64),
}

impl CoreError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CoreError::InvalidStatus(_) => "invalid_status",
            CoreError::ApiNotFound(_) => "api_not_found",
            CoreError::Contract { .. } => "contract_violation",
            CoreError::Execution { .. } => "execution_failure",
            CoreError::Recurrence { .. } => "invalid_recurrence",
            CoreError::Horizon(_) => "invalid_horizon",
        }
    }
}
