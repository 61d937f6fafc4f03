//! Lumen runtime crate.
//!
//! This crate owns the backend-agnostic pieces of the compute runtime: the
//! interned type system, kernel recording, typed resources, command lists and
//! argument binding. Backends plug in through [`DeviceInterface`].

pub mod ast;
pub mod command;
pub mod device;
pub mod resource;
pub mod rtx;
pub mod shader;

pub mod config;
pub mod error;
pub mod logging;

#[cfg(test)]
mod testing;

pub use config::{init, RuntimeConfig};
pub use device::{Device, DeviceId, DeviceInterface};
pub use error::{Error, ErrorPolicy, Result};
