//! Recording mock backend for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::ast::Function;
use crate::command::{CommandKind, CommandList};
use crate::device::{DeviceInterface, ResourceTag};
use crate::error::Result;
use crate::resource::TextureDesc;

#[derive(Default)]
struct Calls {
    destroyed: HashMap<ResourceTag, Vec<u64>>,
    dispatched: Vec<(u64, Vec<CommandKind>)>,
    heap_usage: HashMap<u64, usize>,
    textures: Vec<TextureDesc>,
}

/// Shared view of what a [`MockDevice`] was asked to do.
#[derive(Clone, Default)]
pub struct MockLog {
    calls: Arc<Mutex<Calls>>,
}

impl MockLog {
    /// Handles destroyed for `tag`, in call order.
    pub fn destroyed(&self, tag: ResourceTag) -> Vec<u64> {
        self.calls.lock().destroyed.get(&tag).cloned().unwrap_or_default()
    }

    /// Command kinds of every dispatched list, with the stream handle.
    pub fn dispatched(&self) -> Vec<(u64, Vec<CommandKind>)> {
        self.calls.lock().dispatched.clone()
    }

    pub fn textures(&self) -> Vec<TextureDesc> {
        self.calls.lock().textures.clone()
    }
}

/// Backend that hands out increasing handles and records calls.
pub struct MockDevice {
    next: AtomicU64,
    log: MockLog,
}

impl MockDevice {
    pub fn new() -> (Self, MockLog) {
        let log = MockLog::default();
        (
            Self {
                next: AtomicU64::new(1),
                log: log.clone(),
            },
            log,
        )
    }

    fn handle(&self) -> Result<u64> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn destroy(&self, tag: ResourceTag, handle: u64) {
        self.log.calls.lock().destroyed.entry(tag).or_default().push(handle);
    }
}

impl DeviceInterface for MockDevice {
    fn name(&self) -> &str {
        "mock"
    }

    fn create_buffer(&self, size_bytes: usize, heap_handle: u64, _index_in_heap: u32) -> Result<u64> {
        if heap_handle != 0 {
            *self.log.calls.lock().heap_usage.entry(heap_handle).or_default() += size_bytes;
        }
        self.handle()
    }

    fn destroy_buffer(&self, handle: u64) {
        self.destroy(ResourceTag::Buffer, handle);
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<u64> {
        self.log.calls.lock().textures.push(desc.clone());
        self.handle()
    }

    fn destroy_texture(&self, handle: u64) {
        self.destroy(ResourceTag::Texture, handle);
    }

    fn create_heap(&self, _size_bytes: usize) -> Result<u64> {
        self.handle()
    }

    fn destroy_heap(&self, handle: u64) {
        self.destroy(ResourceTag::Heap, handle);
    }

    fn query_heap_memory_usage(&self, handle: u64) -> usize {
        self.log.calls.lock().heap_usage.get(&handle).copied().unwrap_or(0)
    }

    fn create_stream(&self) -> Result<u64> {
        self.handle()
    }

    fn destroy_stream(&self, handle: u64) {
        self.destroy(ResourceTag::Stream, handle);
    }

    fn dispatch(&self, stream: u64, commands: CommandList) -> Result<()> {
        let kinds = commands.iter().map(|c| c.kind()).collect();
        self.log.calls.lock().dispatched.push((stream, kinds));
        Ok(())
    }

    fn synchronize_stream(&self, _stream: u64) -> Result<()> {
        Ok(())
    }

    fn create_shader(&self, _kernel: Arc<Function>) -> Result<u64> {
        self.handle()
    }

    fn destroy_shader(&self, handle: u64) {
        self.destroy(ResourceTag::Shader, handle);
    }

    fn create_event(&self) -> Result<u64> {
        self.handle()
    }

    fn destroy_event(&self, handle: u64) {
        self.destroy(ResourceTag::Event, handle);
    }

    fn signal_event(&self, _event: u64, _stream: u64) -> Result<()> {
        Ok(())
    }

    fn wait_event(&self, _event: u64, _stream: u64) -> Result<()> {
        Ok(())
    }

    fn synchronize_event(&self, _event: u64) -> Result<()> {
        Ok(())
    }

    fn create_mesh(&self) -> Result<u64> {
        self.handle()
    }

    fn destroy_mesh(&self, handle: u64) {
        self.destroy(ResourceTag::Mesh, handle);
    }

    fn create_accel(&self) -> Result<u64> {
        self.handle()
    }

    fn destroy_accel(&self, handle: u64) {
        self.destroy(ResourceTag::Accel, handle);
    }
}

/// A device backed by a fresh [`MockDevice`].
pub fn mock_device() -> (crate::device::Device, MockLog) {
    let (mock, log) = MockDevice::new();
    (crate::device::Device::new(mock), log)
}
