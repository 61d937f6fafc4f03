//! Host-memory backend for the lumen runtime.
//!
//! This crate implements [`lumen_runtime::DeviceInterface`] without a GPU:
//! - buffers and textures are byte vectors guarded by one lock per table
//! - each stream is a worker thread draining a FIFO channel
//! - events are fence counters shared between streams and the host
//! - dispatches run host closures registered per kernel

mod config;
mod device;
mod event;
mod executor;
mod kernel;
mod memory;
mod slots;
mod stream;

pub use config::HostDeviceConfig;
pub use device::HostDevice;
pub use kernel::{DispatchContext, KernelFn};
