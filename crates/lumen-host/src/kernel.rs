//! Host callbacks standing in for compiled kernel bodies.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use bytemuck::Pod;
use glam::UVec3;
use lumen_runtime::ast::{Function, Variable};
use lumen_runtime::command::{Argument, ShaderDispatchCommand};
use parking_lot::Mutex;

use crate::memory::Memory;

/// Body run by a stream worker for each dispatch of a registered kernel.
pub type KernelFn = dyn Fn(&DispatchContext<'_>) -> Result<()> + Send + Sync;

/// Callbacks keyed by the identity of a kernel's recorded [`Function`].
///
/// The structural hash ignores captured handles, so two kernels of the same
/// shape share it; keying by identity keeps their bodies apart.
#[derive(Default)]
pub(crate) struct KernelRegistry {
    entries: Mutex<HashMap<usize, (Arc<Function>, Arc<KernelFn>)>>,
}

impl KernelRegistry {
    #[inline]
    fn key(function: &Arc<Function>) -> usize {
        Arc::as_ptr(function) as usize
    }

    pub fn register(&self, function: &Arc<Function>, body: Arc<KernelFn>) {
        // The stored clone keeps the address (and so the key) alive.
        let replaced = self
            .entries
            .lock()
            .insert(Self::key(function), (Arc::clone(function), body));
        if replaced.is_some() {
            log::debug!("replaced host body of kernel #{:016x}", function.hash());
        }
    }

    pub fn get(&self, function: &Arc<Function>) -> Option<Arc<KernelFn>> {
        self.entries
            .lock()
            .get(&Self::key(function))
            .map(|(_, body)| Arc::clone(body))
    }
}

impl std::fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("kernels", &self.entries.lock().len())
            .finish()
    }
}

/// What a host kernel body sees of its dispatch.
///
/// Arguments are addressed by the [`Variable`]s the kernel declared or
/// captured while it was recorded.
pub struct DispatchContext<'a> {
    command: &'a ShaderDispatchCommand,
    memory: &'a Memory,
}

impl<'a> DispatchContext<'a> {
    pub(crate) fn new(command: &'a ShaderDispatchCommand, memory: &'a Memory) -> Self {
        Self { command, memory }
    }

    #[inline]
    pub fn dispatch_size(&self) -> UVec3 {
        self.command.dispatch_size
    }

    #[inline]
    pub fn command(&self) -> &'a ShaderDispatchCommand {
        self.command
    }

    pub fn argument(&self, variable: Variable) -> Result<&'a Argument> {
        self.command
            .arguments
            .iter()
            .find(|a| a.variable_uid() == variable.uid())
            .with_context(|| format!("variable {} is not bound", variable.uid()))
    }

    fn buffer_slot(&self, variable: Variable) -> Result<(u64, usize)> {
        match self.argument(variable)? {
            Argument::Buffer {
                handle, offset_bytes, ..
            } => Ok((*handle, *offset_bytes)),
            other => anyhow::bail!("variable {} is bound to {other:?}, not a buffer", variable.uid()),
        }
    }

    /// Elements of the bound buffer view, from its offset to the buffer's end.
    pub fn read_buffer<T: Pod>(&self, variable: Variable) -> Result<Vec<T>> {
        let (handle, offset) = self.buffer_slot(variable)?;
        let buffers = self.memory.buffers.lock();
        let buffer = buffers.get(handle).with_context(|| format!("unknown buffer #{handle}"))?;
        let bytes = buffer
            .bytes
            .get(offset..)
            .with_context(|| format!("offset {offset} past the end of buffer #{handle}"))?;
        Ok(bytes
            .chunks_exact(size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Writes `data` at the bound view's offset. The variable must have been
    /// marked writable.
    pub fn write_buffer<T: Pod>(&self, variable: Variable, data: &[T]) -> Result<()> {
        ensure!(
            self.command.kernel.usage(variable).is_writable(),
            "variable {} is not writable",
            variable.uid()
        );
        let (handle, offset) = self.buffer_slot(variable)?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let mut buffers = self.memory.buffers.lock();
        let buffer = buffers
            .get_mut(handle)
            .with_context(|| format!("unknown buffer #{handle}"))?;
        let target = buffer
            .bytes
            .get_mut(offset..offset + bytes.len())
            .with_context(|| format!("{} byte(s) at {offset} overflow buffer #{handle}", bytes.len()))?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    pub fn uniform<T: Pod>(&self, variable: Variable) -> Result<T> {
        match self.argument(variable)? {
            Argument::Uniform { data, .. } => {
                ensure!(
                    data.len() == size_of::<T>(),
                    "uniform {} holds {} byte(s), asked for {}",
                    variable.uid(),
                    data.len(),
                    size_of::<T>()
                );
                Ok(bytemuck::pod_read_unaligned(data))
            }
            other => anyhow::bail!("variable {} is bound to {other:?}, not a uniform", variable.uid()),
        }
    }
}
