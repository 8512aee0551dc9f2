use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::{AuthError, GENERIC_LOGIN_FAILURE, GENERIC_REGISTER_FAILURE},
    providers::AuthService,
};

pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";

/// Opaque string persistence for the signed-in credential.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
}

/// Process-wide sign-in state. Only `login` and `logout` mutate it.
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    auth: Arc<dyn AuthService>,
    current: Option<Session>,
}

impl SessionContext {
    pub async fn init_from_store(
        store: Arc<dyn SessionStore>,
        auth: Arc<dyn AuthService>,
    ) -> Result<Self> {
        let token = store.get(TOKEN_KEY).await?;
        let current = match token {
            Some(token) => {
                let username = store.get(USERNAME_KEY).await?.unwrap_or_else(|| {
                    debug!("session token present without a stored username");
                    String::new()
                });
                Some(Session { token, username })
            }
            None => None,
        };
        Ok(Self {
            store,
            auth,
            current,
        })
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    /// Gate for protected surfaces; callers route to the login flow on error.
    pub fn require_session(&self) -> Result<&Session, AuthError> {
        self.current.as_ref().ok_or(AuthError::NotAuthenticated)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&Session, AuthError> {
        let response = self.auth.login(username, password).await.map_err(|err| {
            warn!(username, "login rejected: {err}");
            AuthError::Rejected(
                err.service_message()
                    .unwrap_or(GENERIC_LOGIN_FAILURE)
                    .to_string(),
            )
        })?;

        self.store
            .set(TOKEN_KEY, &response.access_token)
            .await
            .map_err(AuthError::Store)?;
        if let Err(err) = self.store.set(USERNAME_KEY, &response.username).await {
            let _ = self.store.remove(TOKEN_KEY).await;
            return Err(AuthError::Store(err));
        }

        info!(username = %response.username, "signed in");
        let session = self.current.insert(Session {
            token: response.access_token,
            username: response.username,
        });
        Ok(&*session)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.auth.register(username, password).await.map_err(|err| {
            warn!(username, "registration rejected: {err}");
            AuthError::Rejected(
                err.service_message()
                    .unwrap_or(GENERIC_REGISTER_FAILURE)
                    .to_string(),
            )
        })
    }

    pub async fn logout(&mut self) -> Result<(), AuthError> {
        self.store
            .remove(TOKEN_KEY)
            .await
            .map_err(AuthError::Store)?;
        self.store
            .remove(USERNAME_KEY)
            .await
            .map_err(AuthError::Store)?;
        if let Some(session) = self.current.take() {
            info!(username = %session.username, "signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
