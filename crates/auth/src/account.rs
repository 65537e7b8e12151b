use chrono::Utc;
use notify::{Notifier, ShopEvent, UserLoggedInData, UserRegisteredData};
use store::{NewUser, StoreError, User, UserStore};

use crate::authenticator::Authenticator;
use crate::password;
use crate::token::IssuedToken;
use crate::{AuthError, Result};

const MAX_USERNAME_LEN: usize = 50;

/// Input for registering a new account.
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A user together with a fresh session token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: IssuedToken,
}

/// Registration and login.
#[derive(Clone)]
pub struct AccountService<S> {
    store: S,
    authenticator: Authenticator<S>,
    notifier: Notifier,
}

impl<S: UserStore + Clone> AccountService<S> {
    pub fn new(store: S, authenticator: Authenticator<S>, notifier: Notifier) -> Self {
        Self {
            store,
            authenticator,
            notifier,
        }
    }

    /// Creates an account and logs it in.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `Store(Conflict)` when the username
    /// or email is taken.
    #[tracing::instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<Session> {
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_lowercase();
        validate_registration(&username, &email)?;

        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(conflict("username"));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(conflict("email"));
        }

        let password = registration.password;
        let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;

        let user = self
            .store
            .insert_user(NewUser {
                username,
                email,
                password_hash,
                is_admin: false,
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");

        self.notifier
            .notify(ShopEvent::UserRegistered(UserRegisteredData {
                user_id: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
            }))
            .await;

        let token = self.authenticator.issue_token(&user)?;
        Ok(Session { user, token })
    }

    /// Logs in by email or username.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown identifier or a wrong password,
    /// `InactiveAccount` for a deactivated user with the right password.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Session> {
        let result = self.try_login(identifier.trim(), password).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AuthError::InvalidCredentials) => "invalid_credentials",
            Err(AuthError::InactiveAccount) => "inactive_account",
            Err(_) => "error",
        };
        metrics::counter!("logins_total", "outcome" => outcome).increment(1);

        let session = result?;

        self.notifier
            .notify(ShopEvent::UserLoggedIn(UserLoggedInData {
                user_id: session.user.id,
                logged_in_at: Utc::now(),
            }))
            .await;

        Ok(session)
    }

    async fn try_login(&self, identifier: &str, password: &str) -> Result<Session> {
        let user = if identifier.contains('@') {
            self.store
                .find_user_by_email(&identifier.to_lowercase())
                .await?
        } else {
            self.store.find_user_by_username(identifier).await?
        };
        let user = user.ok_or(AuthError::InvalidCredentials)?;

        let stored_hash = user.password_hash.clone();
        let password = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&stored_hash, &password))
                .await
                .map_err(|e| AuthError::Hashing(e.to_string()))??;

        if !matches {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }

        let token = self.authenticator.issue_token(&user)?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(Session { user, token })
    }
}

fn conflict(field: &'static str) -> AuthError {
    AuthError::Store(StoreError::Conflict {
        entity: "user",
        field,
    })
}

fn validate_registration(username: &str, email: &str) -> Result<()> {
    if username.is_empty() {
        return Err(AuthError::Validation("username must not be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(AuthError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if username.contains('@') {
        return Err(AuthError::Validation("username must not contain '@'".to_string()));
    }

    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AuthError::Validation("email address is invalid".to_string()));
    }

    Ok(())
}
