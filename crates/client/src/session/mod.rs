//! Login-time cart reconciliation.
//!
//! Logging in is a two-step protocol:
//!
//! 1. [`SessionReconciler::begin`] captures a snapshot of the guest cart and
//!    moves the session to `Authenticating`.
//! 2. [`SessionReconciler::complete`] performs the credential exchange. On
//!    success the credential is stored and the snapshot is merged into the
//!    live cart with no `.await` in between; on failure nothing is stored,
//!    nothing is merged, and the session returns to `Anonymous`.
//!
//! The cart may change freely between the two steps. Whatever it holds when
//! `complete` runs is what the snapshot is merged into, so pass the
//! post-login cart, not the store the snapshot was taken from.
//! [`ToteClient::login`](crate::ToteClient::login) does this for the
//! persisted cart.
//!
//! Dropping the `complete` future before it resolves (a timeout, a cancelled
//! task) counts as a failed login: the session returns to `Anonymous`.

mod error;

pub use error::SessionError;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use tote_core::{AuthUser, CartSnapshot, Email};

use crate::api::{Api, AuthGrant, AuthResponse};
use crate::auth::{AuthCredential, TokenHolder};
use crate::cart::CartStore;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::storage::KeyValueStorage;

/// Where the session is in the login protocol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No credential held.
    #[default]
    Anonymous,
    /// A login is in flight; a guest-cart snapshot is pending.
    Authenticating,
    /// A credential is held for this user.
    Authenticated(AuthUser),
}

impl SessionState {
    /// Short name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

/// The credential exchange to perform.
pub enum LoginMethod {
    /// Email and password.
    Password {
        /// Account email.
        email: Email,
        /// Account password.
        password: SecretString,
    },
    /// A one-time passcode previously sent to `email`.
    Otp {
        /// Account email.
        email: Email,
        /// Passcode from the email.
        otp: String,
    },
    /// A Google profile from the OAuth callback.
    Google {
        /// Google account email.
        email: Email,
        /// Google display name.
        name: String,
        /// Google subject ID.
        google_id: String,
    },
    /// Create an account and log in as it.
    Register {
        /// Display name.
        name: String,
        /// Account email.
        email: Email,
        /// Chosen password.
        password: SecretString,
    },
}

impl std::fmt::Debug for LoginMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginMethod")
            .field("kind", &self.kind())
            .field("email", &self.email().as_str())
            .finish_non_exhaustive()
    }
}

impl LoginMethod {
    /// Email/password login.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` if `email` is not a valid address.
    pub fn password(email: &str, password: SecretString) -> Result<Self, SessionError> {
        Ok(Self::Password {
            email: Email::parse(email)?,
            password,
        })
    }

    /// Passcode login.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` if `email` is not a valid address.
    pub fn otp(email: &str, otp: impl Into<String>) -> Result<Self, SessionError> {
        Ok(Self::Otp {
            email: Email::parse(email)?,
            otp: otp.into(),
        })
    }

    /// Google login.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` if `email` is not a valid address.
    pub fn google(
        email: &str,
        name: impl Into<String>,
        google_id: impl Into<String>,
    ) -> Result<Self, SessionError> {
        Ok(Self::Google {
            email: Email::parse(email)?,
            name: name.into(),
            google_id: google_id.into(),
        })
    }

    /// Registration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` if `email` is not a valid address.
    pub fn register(
        name: impl Into<String>,
        email: &str,
        password: SecretString,
    ) -> Result<Self, SessionError> {
        Ok(Self::Register {
            name: name.into(),
            email: Email::parse(email)?,
            password,
        })
    }

    /// Which exchange this is.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Otp { .. } => "otp",
            Self::Google { .. } => "google",
            Self::Register { .. } => "register",
        }
    }

    /// The email the exchange is for.
    #[must_use]
    pub const fn email(&self) -> &Email {
        match self {
            Self::Password { email, .. }
            | Self::Otp { email, .. }
            | Self::Google { email, .. }
            | Self::Register { email, .. } => email,
        }
    }
}

/// A login that has been started but not finished.
///
/// Only [`SessionReconciler::begin`] creates one; [`complete`] and
/// [`abandon`] consume it.
///
/// [`complete`]: SessionReconciler::complete
/// [`abandon`]: SessionReconciler::abandon
#[derive(Debug)]
#[must_use = "a pending login must be completed or abandoned"]
pub struct PendingLogin {
    snapshot: CartSnapshot,
}

impl PendingLogin {
    /// The guest cart as it was when the login began.
    #[must_use]
    pub const fn snapshot(&self) -> &CartSnapshot {
        &self.snapshot
    }
}

/// Outcome of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The authenticated user.
    pub user: AuthUser,
    /// Snapshot lines replayed into the cart.
    pub merged_lines: usize,
    /// Item count of the snapshot.
    pub snapshot_items: u64,
    /// Item count of the cart after the merge.
    pub cart_total_items: u64,
}

/// Drives the login protocol and owns the session state.
///
/// Cheap to clone; clones share state and the token holder.
#[derive(Debug, Clone)]
pub struct SessionReconciler {
    api: Api,
    tokens: TokenHolder,
    state: Arc<Mutex<SessionState>>,
}

impl SessionReconciler {
    /// Create a reconciler in the `Anonymous` state.
    ///
    /// Credentials are stored in the token holder of `api`'s gateway.
    #[must_use]
    pub fn new(api: Api) -> Self {
        Self {
            tokens: api.gateway().tokens().clone(),
            api,
            state: Arc::new(Mutex::new(SessionState::Anonymous)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<AuthUser> {
        match &*self.lock() {
            SessionState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    /// Start a login, snapshotting the guest cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is
    /// `Anonymous`.
    #[instrument(skip(self, cart), fields(cart_items = cart.total_items()))]
    pub fn begin<S: KeyValueStorage>(
        &self,
        cart: &CartStore<S>,
    ) -> Result<PendingLogin, SessionError> {
        let mut state = self.lock();
        if *state != SessionState::Anonymous {
            return Err(SessionError::InvalidTransition {
                from: state.name(),
                to: SessionState::Authenticating.name(),
            });
        }

        let snapshot = cart.get_cart_snapshot();
        *state = SessionState::Authenticating;
        debug!(snapshot_lines = snapshot.lines().len(), "Login started");

        Ok(PendingLogin { snapshot })
    }

    /// Perform the credential exchange and, on success, merge the pending
    /// snapshot into `cart`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the session is no longer
    /// `Authenticating`, `SessionError::Rejected` when the backend refuses the
    /// credentials, and `SessionError::Gateway` for other failures. On any
    /// error the session is `Anonymous` and `cart` is untouched. The same
    /// holds if the future is dropped before it resolves.
    #[instrument(skip(self, pending, method, cart), fields(method = method.kind(), email = %method.email()))]
    pub async fn complete<S: KeyValueStorage>(
        &self,
        pending: PendingLogin,
        method: LoginMethod,
        cart: &mut CartStore<S>,
    ) -> Result<Reconciliation, SessionError> {
        {
            let state = self.lock();
            if *state != SessionState::Authenticating {
                return Err(SessionError::InvalidTransition {
                    from: state.name(),
                    to: "authenticated",
                });
            }
        }

        let reset = ResetOnDrop { session: self };
        let grant = match self.exchange(&method).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Login failed, session back to anonymous");
                return Err(e);
            }
        };

        // From here to the merge there is no suspension point.
        let AuthGrant { token, user } = grant;
        self.tokens.set(AuthCredential::new(token));
        *self.lock() = SessionState::Authenticated(user.clone());
        drop(reset);

        let snapshot_items = pending.snapshot.total_items();
        let merged_lines = cart.merge_cart(pending.snapshot.into_lines());
        let cart_total_items = cart.total_items();

        set_sentry_user(&user.id, Some(user.email.as_str()));
        add_breadcrumb(
            "cart",
            "Merged guest cart after login",
            &[
                ("merged_lines", merged_lines.to_string()),
                ("cart_total_items", cart_total_items.to_string()),
            ],
        );
        info!(
            user_id = %user.id,
            merged_lines,
            cart_total_items,
            "Login complete"
        );

        Ok(Reconciliation {
            user,
            merged_lines,
            snapshot_items,
            cart_total_items,
        })
    }

    async fn exchange(&self, method: &LoginMethod) -> Result<AuthGrant, SessionError> {
        let response: AuthResponse = match method {
            LoginMethod::Password { email, password } => self.api.login(email, password).await?,
            LoginMethod::Otp { email, otp } => self.api.verify_otp(email, otp).await?,
            LoginMethod::Google {
                email,
                name,
                google_id,
            } => self.api.google(email, name, google_id).await?,
            LoginMethod::Register {
                name,
                email,
                password,
            } => self.api.register(name, email, password).await?,
        };

        response
            .into_grant()
            .map_err(|message| SessionError::Rejected {
                status: None,
                message,
            })
    }

    /// Cancel a pending login without contacting the backend.
    pub fn abandon(&self, pending: PendingLogin) {
        let mut state = self.lock();
        if *state == SessionState::Authenticating {
            *state = SessionState::Anonymous;
        }
        debug!(captured_at = %pending.snapshot.captured_at(), "Login abandoned");
    }

    /// Drop the credential and return to `Anonymous`. The cart is kept.
    ///
    /// Logging out while already anonymous does nothing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` while a login is pending.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), SessionError> {
        let mut state = self.lock();
        match &*state {
            SessionState::Authenticating => Err(SessionError::InvalidTransition {
                from: state.name(),
                to: SessionState::Anonymous.name(),
            }),
            SessionState::Anonymous => {
                debug!("Already anonymous");
                Ok(())
            }
            SessionState::Authenticated(user) => {
                info!(user_id = %user.id, "Logged out");
                self.tokens.clear();
                *state = SessionState::Anonymous;
                clear_sentry_user();
                Ok(())
            }
        }
    }
}

/// Returns a session still `Authenticating` to `Anonymous` when dropped.
///
/// Held across the credential exchange so that an error return and a dropped
/// future end the login the same way.
struct ResetOnDrop<'a> {
    session: &'a SessionReconciler,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if *state == SessionState::Authenticating {
            *state = SessionState::Anonymous;
            debug!("Login ended without a credential");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::time::Duration;

    use rust_decimal::Decimal;
    use tote_core::{CartLine, UserId};
    use url::Url;

    use crate::cart::CartOptions;
    use crate::gateway::Gateway;
    use crate::storage::MemoryStorage;

    fn reconciler() -> (SessionReconciler, TokenHolder) {
        let tokens = TokenHolder::new();
        // Port 9 (discard): nothing in these tests reaches the network.
        let gateway = Gateway::new(Url::parse("http://127.0.0.1:9/api").unwrap(), tokens.clone())
            .unwrap();
        (SessionReconciler::new(Api::new(gateway)), tokens)
    }

    fn cart_with_mug() -> CartStore<MemoryStorage> {
        let mut cart = CartStore::open(MemoryStorage::new(), CartOptions::default());
        cart.add_to_cart(CartLine::new("mug", "Mug", Decimal::new(1200, 2), 2));
        cart
    }

    #[test]
    fn test_begin_snapshots_and_moves_to_authenticating() {
        let (session, _) = reconciler();
        let mut cart = cart_with_mug();

        let pending = session.begin(&cart).unwrap();
        assert_eq!(session.state(), SessionState::Authenticating);

        cart.clear_cart();
        assert_eq!(pending.snapshot().total_items(), 2);
        session.abandon(pending);
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let (session, _) = reconciler();
        let cart = cart_with_mug();

        let pending = session.begin(&cart).unwrap();
        let err = session.begin(&cart).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                from: "authenticating",
                ..
            }
        ));
        session.abandon(pending);
    }

    #[test]
    fn test_abandon_returns_to_anonymous_and_keeps_cart() {
        let (session, tokens) = reconciler();
        let cart = cart_with_mug();

        let pending = session.begin(&cart).unwrap();
        session.abandon(pending);

        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!tokens.is_authenticated());
        assert_eq!(cart.total_items(), 2);
        assert!(session.begin(&cart).is_ok());
    }

    #[test]
    fn test_logout_clears_token_and_keeps_cart() {
        let (session, tokens) = reconciler();
        let cart = cart_with_mug();

        tokens.set(AuthCredential::new("tok"));
        *session.lock() = SessionState::Authenticated(AuthUser {
            id: UserId::new("1"),
            email: "a@b.co".to_string(),
            name: None,
            role_id: None,
        });

        session.logout().unwrap();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!tokens.is_authenticated());
        assert_eq!(session.user(), None);
        assert_eq!(cart.total_items(), 2);

        session.logout().unwrap();
    }

    #[test]
    fn test_logout_during_login_is_rejected() {
        let (session, _) = reconciler();
        let pending = session.begin(&cart_with_mug()).unwrap();
        assert!(session.logout().is_err());
        session.abandon(pending);
    }

    #[test]
    fn test_login_method_validates_email() {
        assert!(matches!(
            LoginMethod::password("not-an-email", SecretString::from("pw")),
            Err(SessionError::InvalidEmail(_))
        ));
        let method = LoginMethod::otp("  Ann@Example.com ", "123456").unwrap();
        assert_eq!(method.kind(), "otp");
        assert!(!format!("{method:?}").contains("123456"));
    }

    #[tokio::test]
    async fn test_complete_after_state_reset_is_rejected() {
        let (session, tokens) = reconciler();
        let mut cart = cart_with_mug();

        let pending = session.begin(&cart).unwrap();
        *session.lock() = SessionState::Anonymous;

        let method = LoginMethod::password("a@b.co", SecretString::from("pw")).unwrap();
        let err = session.complete(pending, method, &mut cart).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert!(!tokens.is_authenticated());
        assert_eq!(cart.total_items(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_cart_and_returns_to_anonymous() {
        let (session, tokens) = reconciler();
        let mut cart = cart_with_mug();

        let pending = session.begin(&cart).unwrap();
        let method = LoginMethod::password("a@b.co", SecretString::from("pw")).unwrap();
        let err = session.complete(pending, method, &mut cart).await.unwrap_err();

        assert!(matches!(err, SessionError::Gateway(_)));
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!tokens.is_authenticated());
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_complete_returns_to_anonymous() {
        // Accepts connections into the backlog and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = Url::parse(&format!("http://{}/api", listener.local_addr().unwrap())).unwrap();
        let tokens = TokenHolder::new();
        let session = SessionReconciler::new(Api::new(Gateway::new(api_url, tokens.clone()).unwrap()));
        let mut cart = cart_with_mug();

        let pending = session.begin(&cart).unwrap();
        let method = LoginMethod::password("a@b.co", SecretString::from("pw")).unwrap();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(200),
            session.complete(pending, method, &mut cart),
        )
        .await;

        assert!(timed_out.is_err());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!tokens.is_authenticated());
        assert_eq!(cart.total_items(), 2);
        assert!(session.logout().is_ok());

        let pending = session.begin(&cart).unwrap();
        session.abandon(pending);
        drop(listener);
    }
}
