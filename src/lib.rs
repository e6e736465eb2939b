pub mod api;
pub mod config;
pub mod forms;
pub mod models;
pub mod routing;
pub mod session;

use std::sync::Arc;

use crate::api::auth::{AuthClient, AuthGateway};
use crate::api::error::ApiError;
use crate::api::http::HttpClient;
use crate::api::medical_history::MedicalHistoryClient;
use crate::config::PortalConfig;
use crate::session::{SessionState, TokenStore};

/// The assembled component graph. Collaborators are wired here once, at
/// startup, and handed to whoever needs them; the session state is the
/// single writer of the token store.
pub struct Portal {
    pub config: PortalConfig,
    pub auth: Arc<dyn AuthGateway>,
    pub session: Arc<SessionState>,
    pub medical_history: MedicalHistoryClient,
}

impl Portal {
    /// Wire the portal against the configured gateway and rebuild any
    /// persisted session.
    pub fn new(config: PortalConfig) -> Result<Self, ApiError> {
        let store = Arc::new(TokenStore::new(config.token_path.clone()));
        let http = Arc::new(HttpClient::new(&config, store.clone())?);
        let auth: Arc<dyn AuthGateway> = Arc::new(AuthClient::new(http.clone()));
        let session = Arc::new(SessionState::new(store, auth.clone()));
        session.initialize();
        let medical_history = MedicalHistoryClient::new(http);

        Ok(Self {
            config,
            auth,
            session,
            medical_history,
        })
    }
}
