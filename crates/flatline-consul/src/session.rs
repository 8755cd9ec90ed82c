//! Sessions and the session-backed KV lock.
//!
//! None of these calls retry: the lock protocol has to see failures as
//! they happen.

use serde_json::json;
use tracing::debug;

use crate::client::{Consul, ConsulRequest, Transport};
use crate::error::{ConsulError, ConsulResult};
use crate::types::{KvEntry, SessionCreated, SessionId};

/// Ownership of the lock key as seen by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// The key is locked by our session.
    Held,
    /// The key is missing or unlocked.
    Free,
    /// The key is locked by another session.
    HeldByOther(String),
}

impl<T: Transport> Consul<T> {
    /// `PUT /v1/session/create`.
    pub async fn create_session(&self, name: &str) -> ConsulResult<SessionId> {
        let request = ConsulRequest::put("v1/session/create").json(json!({ "Name": name }));
        let response = self.call(request, false).await?;
        let created: SessionCreated = serde_json::from_value(response.body)?;
        if created.id.is_empty() {
            return Err(ConsulError::Unexpected("session create returned an empty ID".to_string()));
        }
        debug!(session = %created.id, %name, "session created");
        Ok(SessionId::new(created.id))
    }

    /// `PUT /v1/session/destroy/<id>`.
    pub async fn destroy_session(&self, session: &SessionId) -> ConsulResult<bool> {
        let path = format!("v1/session/destroy/{session}");
        let response = self.call(ConsulRequest::put(path), false).await?;
        Ok(response.body.as_bool().unwrap_or(false))
    }

    /// Try once to take `key` for `session`. `Ok(false)` means someone else holds it.
    pub async fn acquire_lock(&self, key: &str, session: &SessionId) -> ConsulResult<bool> {
        let request = ConsulRequest::put(kv_path(key)).param("acquire", session.as_str());
        let response = self.call(request, false).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// Give `key` up, if `session` holds it.
    pub async fn release_lock(&self, key: &str, session: &SessionId) -> ConsulResult<bool> {
        let request = ConsulRequest::put(kv_path(key)).param("release", session.as_str());
        let response = self.call(request, false).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// Read the lock key. A missing key is an empty list, not an error.
    pub async fn read_lock(&self, key: &str) -> ConsulResult<Vec<KvEntry>> {
        match self.call(ConsulRequest::get(kv_path(key)), false).await {
            Ok(response) if response.body.is_null() => Ok(Vec::new()),
            Ok(response) => Ok(serde_json::from_value(response.body)?),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Compare the lock holder against `session`.
    pub async fn check_lock(&self, key: &str, session: &SessionId) -> ConsulResult<LockStatus> {
        let entries = self.read_lock(key).await?;
        let holder = entries
            .into_iter()
            .next()
            .and_then(|entry| entry.session)
            .filter(|s| !s.is_empty());
        Ok(match holder {
            None => LockStatus::Free,
            Some(holder) if holder == session.as_str() => LockStatus::Held,
            Some(holder) => LockStatus::HeldByOther(holder),
        })
    }
}

fn kv_path(key: &str) -> String {
    format!("v1/kv/{}", key.trim_start_matches('/'))
}
