//! Provisioning Error Types

use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for provisioning operations.
///
/// `Clone` so a cached account listing, failed or not, can be handed to
/// every caller that shares it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No account matches the given identity
    #[error("Account not found: {username}")]
    AccountNotFound { username: String },

    /// More than one account matches a username that should be unique
    #[error("{count} accounts share the username {username}")]
    DuplicateAccount { username: String, count: usize },

    /// The account exists but an administrator has not verified it yet
    #[error("Account {username} has not been verified by an administrator")]
    NotYetVerified { username: String },

    /// A remote procedure failed on every attempt
    #[error("Remote procedure {procedure} failed after {attempts} attempts: {last_error}")]
    RemoteProcedureExhausted {
        procedure: String,
        attempts: u32,
        last_error: String,
    },

    /// An operation assumed a role exists and it does not
    #[error("Role not found: {name}")]
    RoleNotFound { name: String },

    /// Saving a new role failed
    #[error("Failed to persist role {name}: {message}")]
    RolePersist { name: String, message: String },

    /// Generic persistence failure in the remote store
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// The operation needs a signed-in account
    #[error("No account is signed in")]
    NotAuthenticated,

    /// Error reported by the remote API
    #[error("API error {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before reaching the remote store
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    pub fn account_not_found(username: impl Into<String>) -> Self {
        Self::AccountNotFound {
            username: username.into(),
        }
    }

    pub fn not_yet_verified(username: impl Into<String>) -> Self {
        Self::NotYetVerified {
            username: username.into(),
        }
    }

    pub fn role_not_found(name: impl Into<String>) -> Self {
        Self::RoleNotFound { name: name.into() }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Stable code used in logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Error::DuplicateAccount { .. } => "DUPLICATE_ACCOUNT",
            Error::NotYetVerified { .. } => "NOT_YET_VERIFIED",
            Error::RemoteProcedureExhausted { .. } => "REMOTE_PROCEDURE_EXHAUSTED",
            Error::RoleNotFound { .. } => "ROLE_NOT_FOUND",
            Error::RolePersist { .. } => "ROLE_PERSIST_ERROR",
            Error::Persistence { .. } => "PERSISTENCE_ERROR",
            Error::NotAuthenticated => "NOT_AUTHENTICATED",
            Error::Api { .. } => "API_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            Error::AccountNotFound { .. } => "The account does not exist.".to_string(),
            Error::NotYetVerified { .. } => {
                "Your account has not been verified by a team administrator yet, so you cannot log in."
                    .to_string()
            }
            Error::RemoteProcedureExhausted { attempts, .. } => format!(
                "The server did not respond after {} attempts. Please try again later.",
                attempts
            ),
            Error::NotAuthenticated => "Please log in first.".to_string(),
            Error::Api { message, .. } => message.clone(),
            Error::Validation(message) => message.clone(),
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }

    /// Whether the error is a precondition or ordering defect rather than a
    /// transient failure
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::RoleNotFound { .. } | Error::Config(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
