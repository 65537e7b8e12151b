use store::{User, UserStore};

use crate::token::{IssuedToken, TokenSigner};
use crate::{AuthError, Result};

/// Maps session tokens to users.
///
/// The user is always re-read from the store, so deactivating an account
/// or revoking admin takes effect on the next request even though the
/// token itself stays valid.
#[derive(Clone)]
pub struct Authenticator<S> {
    store: S,
    signer: TokenSigner,
}

impl<S: UserStore> Authenticator<S> {
    pub fn new(store: S, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    /// Returns the signer used for issuing tokens.
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Issues a session token for `user`.
    pub fn issue_token(&self, user: &User) -> Result<IssuedToken> {
        self.signer.issue(user.id)
    }

    /// Resolves `token` to an active user.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.signer.verify(token)?;

        let user = self
            .store
            .find_user(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "token presented for inactive account");
            return Err(AuthError::InactiveAccount);
        }

        Ok(user)
    }
}

/// Fails with `Forbidden` unless `user` is an admin.
pub fn require_admin(user: &User) -> Result<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::UserId;
    use store::{InMemoryStore, NewUser};

    use super::*;

    async fn setup() -> (InMemoryStore, Authenticator<InMemoryStore>, User) {
        let store = InMemoryStore::new();
        let user = store
            .insert_user(NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: "hash".into(),
                is_admin: false,
            })
            .await
            .unwrap();
        let auth = Authenticator::new(store.clone(), TokenSigner::new("secret"));
        (store, auth, user)
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let (_, auth, user) = setup().await;
        let issued = auth.issue_token(&user).unwrap();

        let resolved = auth.authenticate(&issued.token).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn expired_token_fails_even_with_valid_signature() {
        let (_, auth, user) = setup().await;
        let issued = auth
            .signer()
            .issue_at(user.id, Utc::now() - Duration::days(8))
            .unwrap();

        assert!(matches!(
            auth.authenticate(&issued.token).await,
            Err(AuthError::Expired)
        ));
    }

    #[tokio::test]
    async fn deactivated_user_is_refused_with_live_token() {
        let (store, auth, user) = setup().await;
        let issued = auth.issue_token(&user).unwrap();

        store.set_user_active(user.id, false).await.unwrap();

        assert!(matches!(
            auth.authenticate(&issued.token).await,
            Err(AuthError::InactiveAccount)
        ));
    }

    #[tokio::test]
    async fn token_for_unknown_user_is_invalid() {
        let (_, auth, _) = setup().await;
        let issued = auth.signer().issue(UserId::new()).unwrap();

        assert!(matches!(
            auth.authenticate(&issued.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn admin_flag_is_read_from_the_store() {
        let (store, auth, user) = setup().await;
        let issued = auth.issue_token(&user).unwrap();

        let resolved = auth.authenticate(&issued.token).await.unwrap();
        assert!(matches!(
            require_admin(&resolved),
            Err(AuthError::Forbidden)
        ));

        let admin = store
            .insert_user(NewUser {
                username: "root".into(),
                email: "root@example.com".into(),
                password_hash: "hash".into(),
                is_admin: true,
            })
            .await
            .unwrap();
        assert!(require_admin(&admin).is_ok());
    }
}
