use thiserror::Error;

/// Failures at the storage and sync boundary. None of these ever reach a
/// level module: the store logs them and keeps its prior state.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("remote store error: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Identity front-door validation. The `Display` text is shown to the user
/// next to the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Email and password required")]
    Missing,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}
