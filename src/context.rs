//! Shared services handed to every view-level component.
//!
//! `ClientContext::send_authed` is the single path for authenticated calls, so the
//! session-invalidation rule (sign out, notify, redirect to login) is applied the
//! same way by every collection and every one-off operation.

use serde_json::Value;
use tracing::{error, warn};

use crate::auth::SessionStore;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{Session, UserId};
use crate::navigator::Navigator;
use crate::notice::Notices;
use crate::rest::{ApiClient, ApiRequest};
use crate::storage::Storage;

#[derive(Clone)]
pub struct ClientContext {
    api: ApiClient,
    session: SessionStore,
    navigator: Navigator,
    notices: Notices,
}

impl ClientContext {
    /// Opens persisted storage at the configured path.
    pub fn open(config: &ClientConfig) -> ClientResult<Self> {
        let storage = Storage::open(&config.storage_path)?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: &ClientConfig, storage: Storage) -> ClientResult<Self> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout)
            .map_err(|e| ClientError::config(format!("cannot build HTTP client: {e}")))?;
        let session = SessionStore::new(storage, api.clone());
        let navigator = Navigator::new(session.clone(), config.authenticated_visit_policy);
        Ok(Self {
            api,
            session,
            navigator,
            notices: Notices::new(),
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn require_session(&self) -> ClientResult<Session> {
        self.session.current_session().ok_or(ClientError::NotSignedIn)
    }

    /// User id of the signed-in principal, for user-scoped endpoints.
    pub fn require_user_id(&self) -> ClientResult<UserId> {
        self.require_session()?
            .user_id
            .ok_or(ClientError::NotSignedIn)
    }

    /// Sends `request` with the current bearer token.
    ///
    /// Auth failures invalidate the session before returning. Other failures are
    /// logged and surfaced as a notice naming `action`; the caller decides what
    /// local state to keep.
    pub async fn send_authed(
        &self,
        request: ApiRequest,
        action: &str,
    ) -> ClientResult<Option<Value>> {
        let session = match self.require_session() {
            Ok(session) => session,
            Err(err) => {
                self.handle_failure(&err, action);
                return Err(err);
            }
        };
        match self.api.send(request, Some(&session.token)).await {
            Ok(body) => Ok(body),
            Err(api_err) => {
                let err = api_err.into_client_error(action);
                self.handle_failure(&err, action);
                Err(err)
            }
        }
    }

    /// Applies the uniform failure policy for an error raised while performing `action`.
    pub fn handle_failure(&self, err: &ClientError, action: &str) {
        match err {
            ClientError::SessionExpired => {
                warn!(%action, "session rejected by backend");
                self.invalidate_session();
                self.notices.error(err.user_message());
            }
            ClientError::NotSignedIn => {
                warn!(%action, "no stored session");
                self.navigator.redirect_to_login();
            }
            ClientError::Validation(validation) => {
                self.notices.error(validation.to_string());
            }
            other => {
                error!(%action, error = %other, "request failed");
                self.notices.error(other.user_message());
            }
        }
    }

    /// Clears the stored session and moves to the login route.
    pub fn invalidate_session(&self) {
        if let Err(err) = self.session.sign_out() {
            error!(error = %err, "failed to clear session during invalidation");
        }
        self.navigator.redirect_to_login();
    }
}
