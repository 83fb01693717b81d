// crates/core/src/error.rs
use thiserror::Error;

/// Token rejection reasons.
///
/// Every protected operation verifies the presented token before doing
/// anything else; these are the only caller-visible failures of that step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,

    #[error("invalid token format")]
    InvalidFormat,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token payload missing session id")]
    MalformedPayload,
}

/// Failure raised inside a running tool.
///
/// Contained entirely within the owning job's record; it never reaches the
/// launch caller and only surfaces later through the result operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{message}")]
    Failed { kind: String, message: String },

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("canceled")]
    Canceled,
}

impl ToolError {
    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Short error-type tag recorded on the job (`error_type`).
    pub fn kind(&self) -> &str {
        match self {
            Self::Failed { kind, .. } => kind,
            Self::InvalidArgs(_) => "invalid_args",
            Self::Canceled => "canceled",
        }
    }
}

/// Errors raised when registering a tool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool {tool} declares reserved parameter {param}")]
    ReservedParam { tool: String, param: String },

    #[error("tool {0} is already registered")]
    DuplicateTool(String),
}

/// Synchronous launch failures: bad token or structurally invalid
/// parameters. Anything that happens after the job exists is recorded on
/// the job instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid launch parameters: {0}")]
    InvalidParams(String),
}
