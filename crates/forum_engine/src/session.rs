use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use forum_core::BotConfig;
use forum_logging::{forum_debug, forum_info, forum_warn};
use serde_json::Value;

use crate::{FetchError, QueueClass, Scheduler, Task};

pub const CSRF_HEADER: &str = "X-CSRF-Token";
const CSRF_PATH: &str = "/session/csrf.json";
const LOGIN_PATH: &str = "/session";

/// Process-wide request context: the headers injected into every outgoing
/// request and the identity returned by login.
///
/// Written once by [`SessionManager::login`] and read by both queue classes.
#[derive(Debug)]
pub struct Session {
    headers: RwLock<BTreeMap<String, String>>,
    identity: RwLock<Option<Value>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("X-Requested-With".to_string(), "XMLHttpRequest".to_string());
        Self {
            headers: RwLock::new(headers),
            identity: RwLock::new(None),
        }
    }

    /// Snapshot of the headers to send with the next request.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(CSRF_HEADER)
            .cloned()
    }

    pub fn identity(&self) -> Option<Value> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_header(&self, name: &str, value: &str) {
        self.headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
    }

    fn set_identity(&self, identity: Value) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("csrf request failed: {0}")]
    Csrf(FetchError),
    #[error("csrf response carried no token")]
    MissingToken,
    #[error("login request failed: {0}")]
    Login(FetchError),
    #[error("login rejected: {0}")]
    Rejected(String),
    #[error("login response carried no identity")]
    MissingIdentity,
}

/// Runs the two-step login: fetch the anti-forgery token, then post credentials.
pub struct SessionManager {
    scheduler: Scheduler,
    username: String,
    password: String,
}

impl SessionManager {
    pub fn new(scheduler: Scheduler, config: &BotConfig) -> Self {
        Self {
            scheduler,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    /// Both steps go through `class`, so they serialize with that class's
    /// other traffic. The credentials are only sent once a token is in place.
    pub async fn login(&self, class: QueueClass) -> Result<Value, SessionError> {
        self.acquire_csrf(class).await?;

        let form = vec![
            ("login".to_string(), self.username.clone()),
            ("password".to_string(), self.password.clone()),
        ];
        let body = self
            .scheduler
            .request(class, Task::post(LOGIN_PATH, form))
            .await
            .map_err(SessionError::Login)?
            .ok_or(SessionError::MissingIdentity)?;

        if let Some(reason) = body.get("error").and_then(Value::as_str) {
            forum_warn!("Login as {} rejected: {}", self.username, reason);
            return Err(SessionError::Rejected(reason.to_string()));
        }

        let identity = body.get("user").cloned().unwrap_or(body);
        self.scheduler.session().set_identity(identity.clone());
        forum_info!("Logged in as {}", self.username);
        Ok(identity)
    }

    async fn acquire_csrf(&self, class: QueueClass) -> Result<(), SessionError> {
        let body = self
            .scheduler
            .request(class, Task::get(CSRF_PATH))
            .await
            .map_err(|err| {
                forum_warn!("CSRF request failed on {} queue: {}", class, err);
                SessionError::Csrf(err)
            })?;
        let token = body
            .as_ref()
            .and_then(|body| body.get("csrf"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::MissingToken)?;
        self.scheduler.session().set_header(CSRF_HEADER, token);
        forum_debug!("CSRF token acquired ({} chars)", token.len());
        Ok(())
    }
}
