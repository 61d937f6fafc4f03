use glam::UVec3;

use super::{KernelArg, Shader};
use crate::ast::{known, Type, Usage, Variable, VariableTag};
use crate::command::ShaderDispatchCommand;
use crate::device::DeviceId;
use crate::error::{raise, Error, Result};

/// One pending dispatch of a [`Shader`].
///
/// Captured resources are encoded on creation (buffers, textures, heaps,
/// accels, each with its recorded usage). Explicit arguments are then bound
/// left to right, one slot at a time, and `dispatch` yields the command.
#[derive(Debug)]
pub struct ShaderInvoke<'a, const N: usize> {
    shader: &'a Shader<N>,
    command: ShaderDispatchCommand,
    cursor: usize,
}

impl<'a, const N: usize> ShaderInvoke<'a, N> {
    pub(super) fn new(shader: &'a Shader<N>) -> Result<Self> {
        let kernel = shader.function();
        let mut command = ShaderDispatchCommand::new(shader.handle(), kernel.clone());
        for c in kernel.captured_buffers() {
            command.encode_buffer(c.variable.uid(), c.handle, c.offset_bytes, kernel.usage(c.variable))?;
        }
        for c in kernel.captured_textures() {
            command.encode_texture(c.variable.uid(), c.handle, kernel.usage(c.variable))?;
        }
        for c in kernel.captured_heaps() {
            command.encode_heap(c.variable.uid(), c.handle)?;
        }
        for c in kernel.captured_accels() {
            command.encode_accel(c.variable.uid(), c.handle)?;
        }
        Ok(Self {
            shader,
            command,
            cursor: 0,
        })
    }

    /// Binds the next explicit argument.
    pub fn arg(mut self, arg: impl KernelArg) -> Result<Self> {
        arg.bind(&mut self)?;
        Ok(self)
    }

    /// Number of explicit slots bound so far.
    #[inline]
    pub fn bound(&self) -> usize {
        self.cursor
    }

    // ── slot encoding, used by `KernelArg` impls ──────────────────────────

    pub(crate) fn bind_buffer(
        &mut self,
        ty: &'static Type,
        device: DeviceId,
        handle: u64,
        offset_bytes: usize,
    ) -> Result<()> {
        self.shader.device().ensure_owns(device)?;
        let slot = self.next_slot(VariableTag::Buffer, ty)?;
        let usage = self.usage(slot);
        self.command.encode_buffer(slot.uid(), handle, offset_bytes, usage)
    }

    /// Binds a texture slot followed by its implicit offset slot.
    pub(crate) fn bind_texture(
        &mut self,
        ty: &'static Type,
        device: DeviceId,
        handle: u64,
        offset: UVec3,
    ) -> Result<()> {
        self.shader.device().ensure_owns(device)?;
        let slot = self.next_slot(VariableTag::Texture, ty)?;
        let usage = self.usage(slot);
        self.command.encode_texture(slot.uid(), handle, usage)?;
        if ty.dimension() == 2 {
            self.bind_uniform(Type::of::<glam::UVec2>(), bytemuck::bytes_of(&offset.truncate()))
        } else {
            self.bind_uniform(known("vector<uint,3>"), bytemuck::bytes_of(&offset.extend(0)))
        }
    }

    pub(crate) fn bind_heap(&mut self, ty: &'static Type, device: DeviceId, handle: u64) -> Result<()> {
        self.shader.device().ensure_owns(device)?;
        let slot = self.next_slot(VariableTag::Heap, ty)?;
        self.command.encode_heap(slot.uid(), handle)
    }

    pub(crate) fn bind_accel(&mut self, ty: &'static Type, device: DeviceId, handle: u64) -> Result<()> {
        self.shader.device().ensure_owns(device)?;
        let slot = self.next_slot(VariableTag::Accel, ty)?;
        self.command.encode_accel(slot.uid(), handle)
    }

    pub(crate) fn bind_uniform(&mut self, ty: &'static Type, bytes: &[u8]) -> Result<()> {
        if bytes.len() != ty.size() {
            return raise(Error::ArgumentMismatch(format!(
                "`{ty}` takes {} byte(s), got {}",
                ty.size(),
                bytes.len()
            )));
        }
        let slot = self.next_slot(VariableTag::Local, ty)?;
        self.command.encode_uniform(slot.uid(), bytes.to_vec(), ty.alignment())
    }

    fn usage(&self, slot: Variable) -> Usage {
        self.command.kernel.usage(slot)
    }

    /// Claims the next formal argument, which must have `tag` and type `ty`.
    fn next_slot(&mut self, tag: VariableTag, ty: &'static Type) -> Result<Variable> {
        let arguments = self.command.kernel.arguments();
        let Some(&slot) = arguments.get(self.cursor) else {
            return raise(Error::ArgumentMismatch(format!(
                "shader #{} takes {} argument slot(s), got more",
                self.shader.handle(),
                arguments.len()
            )));
        };
        if slot.tag() != tag || slot.ty() != ty {
            return raise(Error::ArgumentMismatch(format!(
                "slot {} of shader #{} is `{}` ({:?}), got `{ty}` ({tag:?})",
                self.cursor,
                self.shader.handle(),
                slot.ty(),
                slot.tag()
            )));
        }
        self.cursor += 1;
        Ok(slot)
    }

    fn finish(self, size: UVec3) -> Result<ShaderDispatchCommand> {
        let declared = self.command.kernel.arguments().len();
        if self.cursor != declared {
            return raise(Error::ArgumentMismatch(format!(
                "shader #{} takes {declared} argument slot(s), {} bound",
                self.shader.handle(),
                self.cursor
            )));
        }
        if size.min_element() == 0 {
            return raise(Error::InvalidDispatchSize(size.x, size.y, size.z));
        }
        let mut command = self.command;
        command.dispatch_size = size;
        Ok(command)
    }
}

impl ShaderInvoke<'_, 1> {
    /// Finishes the invocation with `x` threads.
    pub fn dispatch(self, x: u32) -> Result<ShaderDispatchCommand> {
        self.finish(UVec3::new(x, 1, 1))
    }
}

impl ShaderInvoke<'_, 2> {
    pub fn dispatch(self, x: u32, y: u32) -> Result<ShaderDispatchCommand> {
        self.finish(UVec3::new(x, y, 1))
    }
}

impl ShaderInvoke<'_, 3> {
    pub fn dispatch(self, x: u32, y: u32, z: u32) -> Result<ShaderDispatchCommand> {
        self.finish(UVec3::new(x, y, z))
    }
}
