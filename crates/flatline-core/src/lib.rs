//! flatline-core: configuration and the types every other crate shares.
//!
//! ```text
//! flatline.toml ──▶ FlatlineConfig ──validate()──▶ timings for the gateway,
//!                   ├── consul                     the worker and the
//!                   ├── lock                       lock supervisor
//!                   └── aws
//! ```
//!
//! Durations stay strings in the file ("5s", "500ms", "1m") and are parsed
//! on access, so a bad value is reported with the field it came from.

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::{AwsConfig, ConsulConfig, FlatlineConfig, LockConfig};
pub use duration::{format_wait, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
