use store::StoreError;
use thiserror::Error;

/// Errors that can occur during authentication and account management.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is malformed, carries a bad signature, or names no user.
    #[error("Invalid token")]
    InvalidToken,

    /// The token's expiry has passed.
    #[error("Token expired")]
    Expired,

    /// The account has been deactivated.
    #[error("Account is inactive")]
    InactiveAccount,

    /// The user lacks the admin flag.
    #[error("Admin privileges required")]
    Forbidden,

    /// Login failed. Deliberately silent on which part was wrong.
    #[error("Invalid username/email or password")]
    InvalidCredentials,

    /// Registration input was rejected.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// The user store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
