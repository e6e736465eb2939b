use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::auth::AuthGateway;
use crate::api::error::ApiError;
use crate::models::{Credentials, Role};
use crate::session::store::TokenStore;
use crate::session::token;

/// The current user, rebuilt from the decoded token payload. Exists if and
/// only if a structurally valid token sits in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub name: String,
    pub role: Role,
    pub user_id: i64,
}

impl Session {
    fn from_claims(claims: token::Claims) -> Self {
        Self {
            name: claims.sub,
            role: claims.role,
            user_id: claims.user_id,
        }
    }
}

/// Process-wide session holder. This is the only component that writes the
/// token store or the current session; everyone else observes through
/// [`SessionState::current`] or the watch channel.
pub struct SessionState {
    store: Arc<TokenStore>,
    gateway: Arc<dyn AuthGateway>,
    current: Mutex<Option<Session>>,
    authenticated: watch::Sender<bool>,
}

impl SessionState {
    pub fn new(store: Arc<TokenStore>, gateway: Arc<dyn AuthGateway>) -> Self {
        let (authenticated, _) = watch::channel(false);
        Self {
            store,
            gateway,
            current: Mutex::new(None),
            authenticated,
        }
    }

    /// Rebuild the session from the stored token. A token that cannot be
    /// interpreted is purged on the spot and the state falls back to
    /// logged-out; decode failures are never surfaced as errors.
    pub fn initialize(&self) {
        let Some(raw) = self.store.load() else {
            self.set_session(None);
            return;
        };
        match token::decode(&raw) {
            Ok(claims) => {
                let session = Session::from_claims(claims);
                info!("session restored for {} ({})", session.name, session.role);
                self.set_session(Some(session));
            }
            Err(e) => {
                warn!("stored token is corrupt, purging: {e}");
                self.store.clear();
                self.set_session(None);
            }
        }
    }

    /// Log in against the gateway. The token is persisted and the session
    /// populated only after the reply passes structural decoding; a failed
    /// login leaves the stored state untouched.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let raw = self.gateway.login(credentials).await?;
        let claims =
            token::decode(&raw).map_err(|e| ApiError::Credential(e.to_string()))?;

        self.store.save(&raw)?;
        let session = Session::from_claims(claims);
        info!("logged in as {} ({})", session.name, session.role);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    /// Clear the token and session unconditionally. The gateway is asked
    /// to invalidate the token first, best-effort; the local clear does not
    /// depend on that call succeeding.
    pub async fn logout(&self) {
        if self.store.load().is_some() {
            if let Err(e) = self.gateway.logout().await {
                warn!("server-side logout failed: {e}");
            }
        }
        self.store.clear();
        self.set_session(None);
        info!("logged out");
    }

    pub fn current(&self) -> Option<Session> {
        self.current.lock().expect("session lock poisoned").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    /// Observe authentication changes without polling.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    fn set_session(&self, session: Option<Session>) {
        let authenticated = session.is_some();
        *self.current.lock().expect("session lock poisoned") = session;
        self.authenticated.send_replace(authenticated);
    }
}
