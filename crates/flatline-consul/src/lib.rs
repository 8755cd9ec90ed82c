//! flatline-consul: the slice of the Consul HTTP API flatline consumes.
//!
//! # Architecture
//!
//! ```text
//! Consul<T: Transport>
//!   ├── call(request, retry)      retry-with-backoff wrapper
//!   ├── health_state(cursor)      blocking query on /v1/health/state/any
//!   ├── create/destroy_session    /v1/session/*
//!   ├── acquire/release/check     /v1/kv/<lock>?acquire|release
//!   └── node_address(name)        /v1/catalog/node/<name>
//!
//! Transport
//!   ├── HyperTransport            hyper legacy client, bounded by a timeout
//!   └── ScriptedTransport         canned responses for tests (feature "testing")
//! ```
//!
//! Retrying calls sleep a fixed backoff and repeat the identical request
//! forever. They are only used for idempotent requests that must
//! eventually succeed; the locking protocol always calls with
//! `retry = false` so failures surface promptly.

pub mod catalog;
pub mod client;
pub mod error;
pub mod health;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Consul, ConsulRequest, ConsulResponse, Transport};
pub use error::{ConsulError, ConsulResult};
pub use health::HealthQuery;
pub use session::LockStatus;
pub use transport::HyperTransport;
pub use types::{Cursor, HealthCheck, KvEntry, SessionId};
