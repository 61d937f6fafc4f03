use std::sync::Arc;

use anyhow::{anyhow, Context};
use glam::Mat4;
use lumen_runtime::ast::{Function, Kernel};
use lumen_runtime::command::{Command, CommandList};
use lumen_runtime::device::{DeviceInterface, ResourceTag};
use lumen_runtime::resource::TextureDesc;
use lumen_runtime::{Error, Result};
use parking_lot::Mutex;

use crate::config::HostDeviceConfig;
use crate::event::HostEvent;
use crate::kernel::DispatchContext;
use crate::memory::{HostAccel, HostHeap, HostMesh, Memory};
use crate::slots::SlotTable;
use crate::stream::{HostStream, StreamWork};

/// A dispatched list, cut at its event commands.
enum Step {
    Commands(CommandList),
    Signal(Arc<HostEvent>),
    Wait(Arc<HostEvent>),
}

struct HostShared {
    config: HostDeviceConfig,
    memory: Arc<Memory>,
    streams: Mutex<SlotTable<HostStream>>,
}

/// Device backed by host memory and one worker thread per stream.
///
/// Cloning is cheap and yields another handle to the same device. Keep a clone
/// after handing one to [`lumen_runtime::Device::new`] to register kernel
/// bodies and inspect state:
///
/// ```ignore
/// let host = HostDevice::new(HostDeviceConfig::default())?;
/// let device = Device::new(host.clone());
/// host.register_kernel(&kernel, |ctx| { /* ... */ Ok(()) });
/// ```
#[derive(Clone)]
pub struct HostDevice {
    shared: Arc<HostShared>,
}

impl HostDevice {
    pub fn new(config: HostDeviceConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid host device configuration")?;
        log::info!(
            "{}: host device ready (max heap {} bytes)",
            config.name,
            config.max_heap_size
        );
        Ok(Self {
            shared: Arc::new(HostShared {
                config,
                memory: Arc::default(),
                streams: Mutex::default(),
            }),
        })
    }

    #[inline]
    pub fn config(&self) -> &HostDeviceConfig {
        &self.shared.config
    }

    #[inline]
    fn memory(&self) -> &Memory {
        &self.shared.memory
    }

    /// Runs `body` for every dispatch of shaders compiled from `kernel`.
    pub fn register_kernel<const N: usize>(
        &self,
        kernel: &Kernel<N>,
        body: impl Fn(&DispatchContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.memory().kernels.register(kernel.function(), Arc::new(body));
    }

    /// Current instance transforms of an accel, as last built or refit.
    pub fn accel_transforms(&self, handle: u64) -> Option<Vec<Mat4>> {
        self.memory()
            .accels
            .lock()
            .get(handle)
            .map(|accel| accel.transforms.clone())
    }

    /// Number of live resources of one kind.
    pub fn resource_count(&self, tag: ResourceTag) -> usize {
        let memory = self.memory();
        match tag {
            ResourceTag::Buffer => memory.buffers.lock().len(),
            ResourceTag::Texture => memory.textures.lock().len(),
            ResourceTag::Heap => memory.heaps.lock().len(),
            ResourceTag::Stream => self.shared.streams.lock().len(),
            ResourceTag::Shader => memory.shaders.lock().len(),
            ResourceTag::Event => memory.events.lock().len(),
            ResourceTag::Mesh => memory.meshes.lock().len(),
            ResourceTag::Accel => memory.accels.lock().len(),
        }
    }

    fn event(&self, handle: u64) -> Result<Arc<HostEvent>> {
        self.memory()
            .event(handle)
            .ok_or(Error::InvalidHandle(ResourceTag::Event))
    }

    /// Runs `f` on `stream` with the stream table locked.
    ///
    /// Fence values are claimed inside `f`, so claim order always matches the
    /// order in which work lands on stream queues.
    fn with_stream<R>(&self, stream: u64, f: impl FnOnce(&HostStream) -> Result<R>) -> Result<R> {
        let streams = self.shared.streams.lock();
        let stream = streams
            .get(stream)
            .ok_or(Error::InvalidHandle(ResourceTag::Stream))?;
        f(stream)
    }

    /// Splits a list at its event commands, resolving every event up front.
    fn schedule(&self, commands: CommandList) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        let mut run = CommandList::new();
        for cmd in commands {
            let step = match cmd {
                Command::EventSignal(signal) => Step::Signal(self.event(signal.handle)?),
                Command::EventWait(wait) => Step::Wait(self.event(wait.handle)?),
                other => {
                    run.append(other);
                    continue;
                }
            };
            if !run.is_empty() {
                steps.push(Step::Commands(std::mem::take(&mut run)));
            }
            steps.push(step);
        }
        if !run.is_empty() {
            steps.push(Step::Commands(run));
        }
        Ok(steps)
    }

    fn destroyed(&self, tag: ResourceTag, handle: u64, found: bool) {
        if found {
            log::trace!("{}: destroyed {tag:?} #{handle}", self.name());
        } else {
            log::warn!("{}: destroy of unknown {tag:?} #{handle}", self.name());
        }
    }
}

impl DeviceInterface for HostDevice {
    fn name(&self) -> &str {
        &self.shared.config.name
    }

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&self, size_bytes: usize, heap_handle: u64, index_in_heap: u32) -> Result<u64> {
        let handle = self.memory().create_buffer(size_bytes, heap_handle)?;
        log::trace!(
            "{}: buffer #{handle} ({size_bytes} bytes, heap #{heap_handle}[{index_in_heap}])",
            self.name()
        );
        Ok(handle)
    }

    fn destroy_buffer(&self, handle: u64) {
        let found = self.memory().destroy_buffer(handle).is_some();
        self.destroyed(ResourceTag::Buffer, handle, found);
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&self, desc: &TextureDesc) -> Result<u64> {
        let handle = self.memory().create_texture(desc)?;
        log::trace!(
            "{}: texture #{handle} ({:?}, {}, {} level(s))",
            self.name(),
            desc.storage,
            desc.size,
            desc.mip_levels
        );
        Ok(handle)
    }

    fn destroy_texture(&self, handle: u64) {
        let found = self.memory().destroy_texture(handle).is_some();
        self.destroyed(ResourceTag::Texture, handle, found);
    }

    // ── heaps ─────────────────────────────────────────────────────────────

    fn create_heap(&self, size_bytes: usize) -> Result<u64> {
        let max = self.shared.config.max_heap_size;
        if size_bytes > max {
            return Err(anyhow!("heap of {size_bytes} bytes exceeds the {max}-byte limit").into());
        }
        let handle = self.memory().heaps.lock().insert(HostHeap {
            capacity: size_bytes,
            used: 0,
        });
        log::trace!("{}: heap #{handle} ({size_bytes} bytes)", self.name());
        Ok(handle)
    }

    fn destroy_heap(&self, handle: u64) {
        let found = self.memory().heaps.lock().remove(handle).is_some();
        self.destroyed(ResourceTag::Heap, handle, found);
    }

    fn query_heap_memory_usage(&self, handle: u64) -> usize {
        self.memory().heaps.lock().get(handle).map_or(0, |heap| heap.used)
    }

    // ── streams ───────────────────────────────────────────────────────────

    fn create_stream(&self) -> Result<u64> {
        let mut streams = self.shared.streams.lock();
        let handle = streams.vacant_handle();
        let stream = HostStream::spawn(self.name(), handle, Arc::clone(&self.shared.memory))?;
        let inserted = streams.insert(stream);
        debug_assert_eq!(inserted, handle);
        log::debug!("{}: stream #{handle} created", self.name());
        Ok(handle)
    }

    fn destroy_stream(&self, handle: u64) {
        // Joining the worker happens outside the table lock.
        let stream = self.shared.streams.lock().remove(handle);
        let found = stream.is_some();
        drop(stream);
        self.destroyed(ResourceTag::Stream, handle, found);
    }

    fn dispatch(&self, stream: u64, commands: CommandList) -> Result<()> {
        log::debug!(
            "{}: stream #{stream} <- {} command(s)",
            self.name(),
            commands.len()
        );
        self.with_stream(stream, |queue| {
            // Events in the list claim fence values now, like `signal_event`
            // and `wait_event` do.
            for step in self.schedule(commands)? {
                let work = match step {
                    Step::Commands(run) => StreamWork::Commands(run),
                    Step::Signal(event) => {
                        let value = event.enqueue_signal();
                        StreamWork::Signal(event, value)
                    }
                    Step::Wait(event) => {
                        let target = event.wait_target();
                        StreamWork::Wait(event, target)
                    }
                };
                queue.enqueue(work)?;
            }
            Ok(())
        })
    }

    fn synchronize_stream(&self, stream: u64) -> Result<()> {
        let done = {
            let streams = self.shared.streams.lock();
            streams
                .get(stream)
                .ok_or(Error::InvalidHandle(ResourceTag::Stream))?
                .fence()?
        };
        done.recv()
            .with_context(|| format!("worker of stream #{stream} exited before the fence"))?;
        Ok(())
    }

    // ── shaders ───────────────────────────────────────────────────────────

    fn create_shader(&self, kernel: Arc<Function>) -> Result<u64> {
        let hash = kernel.hash();
        let handle = self.memory().shaders.lock().insert(kernel);
        log::debug!("{}: shader #{handle} for kernel #{hash:016x}", self.name());
        Ok(handle)
    }

    fn destroy_shader(&self, handle: u64) {
        let found = self.memory().shaders.lock().remove(handle).is_some();
        self.destroyed(ResourceTag::Shader, handle, found);
    }

    // ── events ────────────────────────────────────────────────────────────

    fn create_event(&self) -> Result<u64> {
        let handle = self.memory().events.lock().insert(Arc::default());
        log::trace!("{}: event #{handle}", self.name());
        Ok(handle)
    }

    fn destroy_event(&self, handle: u64) {
        let found = self.memory().events.lock().remove(handle).is_some();
        self.destroyed(ResourceTag::Event, handle, found);
    }

    fn signal_event(&self, event: u64, stream: u64) -> Result<()> {
        let host_event = self.event(event)?;
        self.with_stream(stream, |queue| {
            let value = host_event.enqueue_signal();
            Ok(queue.enqueue(StreamWork::Signal(host_event, value))?)
        })
    }

    fn wait_event(&self, event: u64, stream: u64) -> Result<()> {
        let host_event = self.event(event)?;
        self.with_stream(stream, |queue| {
            let target = host_event.wait_target();
            Ok(queue.enqueue(StreamWork::Wait(host_event, target))?)
        })
    }

    fn synchronize_event(&self, event: u64) -> Result<()> {
        let host_event = self.event(event)?;
        host_event.wait_for(host_event.wait_target());
        Ok(())
    }

    // ── ray tracing ───────────────────────────────────────────────────────

    fn create_mesh(&self) -> Result<u64> {
        let handle = self.memory().meshes.lock().insert(HostMesh::default());
        log::trace!("{}: mesh #{handle}", self.name());
        Ok(handle)
    }

    fn destroy_mesh(&self, handle: u64) {
        let found = self.memory().meshes.lock().remove(handle).is_some();
        self.destroyed(ResourceTag::Mesh, handle, found);
    }

    fn create_accel(&self) -> Result<u64> {
        let handle = self.memory().accels.lock().insert(HostAccel::default());
        log::trace!("{}: accel #{handle}", self.name());
        Ok(handle)
    }

    fn destroy_accel(&self, handle: u64) {
        let found = self.memory().accels.lock().remove(handle).is_some();
        self.destroyed(ResourceTag::Accel, handle, found);
    }
}
