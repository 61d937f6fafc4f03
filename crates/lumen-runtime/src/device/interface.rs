use std::sync::Arc;

use crate::ast::Function;
use crate::command::CommandList;
use crate::error::Result;
use crate::resource::TextureDesc;

/// Backend substitution point.
///
/// Every method acts on one backend instance; handles it returns are opaque
/// and only meaningful to that instance. Successful creates never return
/// [`super::INVALID_HANDLE`].
///
/// Implementations must tolerate concurrent calls from independent threads.
/// `dispatch` is asynchronous: it enqueues the list on the stream in order and
/// returns without waiting. Streams run FIFO; ordering across streams is only
/// established through events.
pub trait DeviceInterface: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    // ── buffers ───────────────────────────────────────────────────────────

    /// Creates a buffer of `size_bytes`. `heap_handle` is
    /// [`super::INVALID_HANDLE`] for a standalone buffer, otherwise the buffer is
    /// placed in slot `index_in_heap` of that heap.
    fn create_buffer(&self, size_bytes: usize, heap_handle: u64, index_in_heap: u32) -> Result<u64>;
    fn destroy_buffer(&self, handle: u64);

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&self, desc: &TextureDesc) -> Result<u64>;
    fn destroy_texture(&self, handle: u64);

    // ── heaps ─────────────────────────────────────────────────────────────

    fn create_heap(&self, size_bytes: usize) -> Result<u64>;
    fn destroy_heap(&self, handle: u64);

    /// Bytes currently allocated from the heap.
    fn query_heap_memory_usage(&self, handle: u64) -> usize;

    // ── streams ───────────────────────────────────────────────────────────

    fn create_stream(&self) -> Result<u64>;
    fn destroy_stream(&self, handle: u64);

    /// Enqueues every command of `commands` on `stream`, taking ownership.
    fn dispatch(&self, stream: u64, commands: CommandList) -> Result<()>;

    /// Blocks until all work enqueued on `stream` has completed.
    fn synchronize_stream(&self, stream: u64) -> Result<()>;

    // ── shaders ───────────────────────────────────────────────────────────

    fn create_shader(&self, kernel: Arc<Function>) -> Result<u64>;
    fn destroy_shader(&self, handle: u64);

    // ── events ────────────────────────────────────────────────────────────

    fn create_event(&self) -> Result<u64>;
    fn destroy_event(&self, handle: u64);

    /// Signals `event` after all work enqueued so far on `stream` completes.
    fn signal_event(&self, event: u64, stream: u64) -> Result<()>;

    /// Holds later work on `stream` until `event` is signaled.
    fn wait_event(&self, event: u64, stream: u64) -> Result<()>;

    /// Blocks the calling thread until `event` is signaled.
    fn synchronize_event(&self, event: u64) -> Result<()>;

    // ── ray tracing ───────────────────────────────────────────────────────

    fn create_mesh(&self) -> Result<u64>;
    fn destroy_mesh(&self, handle: u64);

    fn create_accel(&self) -> Result<u64>;
    fn destroy_accel(&self, handle: u64);
}
