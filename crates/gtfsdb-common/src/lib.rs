//! gtfsdb Common Library
//!
//! Shared plumbing for the gtfsdb workspace members:
//!
//! - **Logging**: tracing subscriber setup driven by environment variables
//! - **Configuration**: environment lookup that reports every missing key at once
//!
//! # Example
//!
//! ```no_run
//! use gtfsdb_common::env::{process_env, EnvReader};
//!
//! let mut env = EnvReader::new(process_env);
//! let host = env.require("DB_HOST");
//! let name = env.require("DB_NAME");
//! env.finish().expect("missing configuration");
//! println!("{host}/{name}");
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod env;
pub mod error;
pub mod logging;

pub use error::ConfigError;
