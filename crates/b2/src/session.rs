//! Authentication session
//!
//! A [`Session`] owns the current [`SessionInfo`] snapshot. Readers clone an
//! `Arc` to the snapshot and never wait on the network; a refresh
//! authenticates from scratch and installs a brand-new snapshot, so no
//! caller can observe a token from one login paired with URLs from another.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use base64::Engine;
use bz_core::{Account, Request, Result, SessionInfo, Transport};

use crate::API_PATH;

/// Credentials used by `b2_authorize_account`
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key_id: String,
    pub application_key: String,
    pub auth_url: String,
}

impl Credentials {
    pub fn new(
        key_id: impl Into<String>,
        application_key: impl Into<String>,
        auth_url: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            application_key: application_key.into(),
            auth_url: auth_url.into(),
        }
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.key_id, self.application_key);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

impl From<&Account> for Credentials {
    fn from(account: &Account) -> Self {
        Self::new(&account.key_id, &account.application_key, &account.auth_url)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("auth_url", &self.auth_url)
            .finish_non_exhaustive()
    }
}

/// Holder of the current authentication state
pub struct Session {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    current: RwLock<Arc<SessionInfo>>,
    logins: AtomicU64,
}

impl Session {
    /// Authenticate and create the first snapshot
    pub async fn authorize(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
    ) -> Result<Self> {
        let info = authorize_account(transport.as_ref(), &credentials).await?;
        tracing::debug!(account_id = %info.account_id, api_url = %info.api_url, "Authorized account");

        Ok(Self {
            transport,
            credentials,
            current: RwLock::new(Arc::new(info)),
            logins: AtomicU64::new(1),
        })
    }

    /// The current snapshot. Never touches the network.
    ///
    /// A refresh holds the lock only to swap in the new snapshot, so a
    /// reader waits at most for that assignment, never for the login itself.
    pub fn current(&self) -> Arc<SessionInfo> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Token of the current snapshot
    pub fn token(&self) -> String {
        self.current().authorization_token.clone()
    }

    /// Number of successful `b2_authorize_account` calls, including the first
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }

    /// Re-authenticate and replace the snapshot.
    ///
    /// `stale_token` is the token the failed request carried. When the
    /// current snapshot already holds a different token another caller has
    /// refreshed in the meantime, and nothing is done. `None` forces a new
    /// login.
    ///
    /// A 401 from the authorize call means the credentials themselves are
    /// bad; callers must not retry it.
    pub async fn refresh(&self, stale_token: Option<&str>) -> Result<()> {
        if let Some(stale) = stale_token
            && self.current().authorization_token != stale
        {
            tracing::debug!("Session already refreshed by another caller");
            return Ok(());
        }

        let info = authorize_account(self.transport.as_ref(), &self.credentials).await?;
        tracing::debug!(account_id = %info.account_id, "Refreshed session");

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(info);
        self.logins.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("credentials", &self.credentials)
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

async fn authorize_account(
    transport: &dyn Transport,
    credentials: &Credentials,
) -> Result<SessionInfo> {
    let url = format!(
        "{}{API_PATH}b2_authorize_account",
        credentials.auth_url.trim_end_matches('/')
    );
    let request = Request::get(url).header("Authorization", &credentials.basic_auth())?;

    transport
        .send(request)
        .await?
        .error_for_status()
        .await?
        .json()
        .await
}
