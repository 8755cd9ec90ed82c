//! Blocking query on `/v1/health/state/any`.
//!
//! The first call carries no cursor and returns at once. Later calls pass
//! the last cursor and a `wait`; Consul holds the request until something
//! changes or the wait runs out. Either way the full check list comes back,
//! so the cursor only decides *when* the call returns.

use std::time::Duration;

use flatline_core::format_wait;

use crate::client::{Consul, ConsulRequest, Transport};
use crate::error::ConsulResult;
use crate::types::{Cursor, HealthCheck};

const HEALTH_STATE_PATH: &str = "v1/health/state/any";

/// Result of one blocking health query.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthQuery {
    pub checks: Vec<HealthCheck>,
    /// Cursor to pass to the next query. Falls back to the one sent when
    /// Consul omits the index header.
    pub cursor: Option<Cursor>,
}

impl<T: Transport> Consul<T> {
    /// Fetch every check in the datacenter, blocking on `cursor` if given.
    pub async fn health_state(
        &self,
        cursor: Option<&Cursor>,
        wait: Duration,
    ) -> ConsulResult<HealthQuery> {
        let mut request = ConsulRequest::get(HEALTH_STATE_PATH);
        if let Some(cursor) = cursor {
            request = request
                .param("wait", format_wait(wait))
                .param("index", cursor.as_str());
        }

        let response = self.call(request, false).await?;
        let checks: Vec<HealthCheck> = if response.body.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(response.body)?
        };

        Ok(HealthQuery {
            checks,
            cursor: response.index.or_else(|| cursor.cloned()),
        })
    }
}
