//! Logging utilities.
//!
//! All crates in the workspace log through the `log` facade. This module only
//! owns the one-time `env_logger` initialization used by binaries and tests.

mod init;

pub use init::{init_logging, LoggingConfig};
