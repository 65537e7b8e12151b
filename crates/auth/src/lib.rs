//! Session authentication and account management.
//!
//! Passwords are stored as Argon2 hashes. Sessions are HS256-signed tokens
//! valid for seven days, resolved back to a user from the store on every
//! request.

pub mod account;
pub mod authenticator;
pub mod error;
pub mod password;
pub mod token;

pub use account::{AccountService, Registration, Session};
pub use authenticator::{Authenticator, require_admin};
pub use error::{AuthError, Result};
pub use token::{Claims, IssuedToken, TOKEN_TTL_SECS, TokenSigner};
