//! Client state shared across the application.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::Api;
use crate::auth::TokenHolder;
use crate::cart::CartStore;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gateway::Gateway;
use crate::session::{LoginMethod, Reconciliation, SessionError, SessionReconciler};
use crate::storage::{FileStorage, MemoryStorage};

/// Everything a storefront front end needs, built once at startup.
///
/// This struct is cheaply cloneable via `Arc`; clones share the HTTP
/// connection pool, the session credential, and the session state.
#[derive(Clone)]
pub struct ToteClient {
    inner: Arc<ToteClientInner>,
}

struct ToteClientInner {
    config: ClientConfig,
    tokens: TokenHolder,
    api: Api,
    session: SessionReconciler,
}

impl std::fmt::Debug for ToteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToteClient")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("authenticated", &self.inner.tokens.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl ToteClient {
    /// Build the client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Gateway` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let tokens = TokenHolder::new();
        let gateway = Gateway::new(config.api_url.clone(), tokens.clone())?;
        Ok(Self::with_gateway(config, gateway))
    }

    /// Build the client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if configuration fails to load.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Build the client over an existing gateway.
    #[must_use]
    pub fn with_gateway(config: ClientConfig, gateway: Gateway) -> Self {
        let tokens = gateway.tokens().clone();
        let api = Api::new(gateway);
        let session = SessionReconciler::new(api.clone());

        Self {
            inner: Arc::new(ToteClientInner {
                config,
                tokens,
                api,
                session,
            }),
        }
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the session credential holder.
    #[must_use]
    pub fn tokens(&self) -> &TokenHolder {
        &self.inner.tokens
    }

    /// Get a reference to the typed backend API.
    #[must_use]
    pub fn api(&self) -> &Api {
        &self.inner.api
    }

    /// Get a reference to the session reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &SessionReconciler {
        &self.inner.session
    }

    /// Open the cart persisted under the configured data directory.
    #[must_use]
    pub fn open_cart(&self) -> CartStore<FileStorage> {
        let config = &self.inner.config;
        CartStore::open(FileStorage::new(&config.data_dir), config.cart_options())
    }

    /// Log in with `method`, carrying the persisted guest cart into the session.
    ///
    /// The guest cart is snapshotted and merged into a post-login cart that
    /// starts empty, so each snapshot line is counted once. On success the
    /// persisted cart is replaced by the result; on failure it is untouched.
    ///
    /// # Errors
    ///
    /// See [`SessionReconciler::begin`] and [`SessionReconciler::complete`].
    #[instrument(skip(self, method), fields(method = method.kind()))]
    pub async fn login(&self, method: LoginMethod) -> Result<Reconciliation, SessionError> {
        let session = self.reconciler();
        let mut cart = self.open_cart();
        let pending = session.begin(&cart)?;

        let mut session_cart = CartStore::open(MemoryStorage::new(), self.inner.config.cart_options());
        let outcome = session.complete(pending, method, &mut session_cart).await?;

        cart.replace_cart(session_cart.lines().iter().cloned());
        info!(cart_total_items = cart.total_items(), "Session cart saved");
        Ok(outcome)
    }
}
