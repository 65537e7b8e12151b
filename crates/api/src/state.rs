//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use auth::{AccountService, Authenticator, TokenSigner};
use cache::{Cache, ReadThrough};
use domain::{CartService, CatalogService, FavoritesService, OrderService};
use notify::{Notifier, Publisher};
use store::ShopStore;

use crate::config::Config;

/// Settings the state needs beyond its clients.
#[derive(Clone)]
pub struct StateSettings {
    pub jwt_secret: String,
    pub api_key: Option<String>,
    pub cache_ttl: Duration,
}

impl From<&Config> for StateSettings {
    fn from(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            api_key: config.api_key.clone(),
            cache_ttl: config.cache_ttl,
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub authenticator: Authenticator<S>,
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
    pub cart: CartService<S>,
    pub favorites: FavoritesService<S>,
    pub api_key: Option<String>,
}

impl<S: ShopStore> AppState<S> {
    /// Wires every service over one store, cache and publisher.
    pub fn new(
        store: S,
        cache: Arc<dyn Cache>,
        publisher: Arc<dyn Publisher>,
        settings: StateSettings,
    ) -> Self {
        let read_through = ReadThrough::new(cache).with_ttl(settings.cache_ttl);
        let notifier = Notifier::new(publisher);
        let authenticator =
            Authenticator::new(store.clone(), TokenSigner::new(settings.jwt_secret));

        Self {
            accounts: AccountService::new(store.clone(), authenticator.clone(), notifier.clone()),
            authenticator,
            catalog: CatalogService::new(store.clone(), read_through.clone()),
            orders: OrderService::new(store.clone(), read_through.clone(), notifier.clone()),
            cart: CartService::new(store.clone(), read_through.clone(), notifier),
            favorites: FavoritesService::new(store, read_through),
            api_key: settings.api_key,
        }
    }
}
