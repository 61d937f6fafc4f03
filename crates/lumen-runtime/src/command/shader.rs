use std::sync::Arc;

use glam::UVec3;

use crate::ast::{Function, Usage};
use crate::error::{raise, Error, Result};

/// Maximum number of argument slots one dispatch may encode.
pub const MAX_ARGUMENT_COUNT: usize = 64;

/// One encoded argument slot of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Buffer {
        variable_uid: u32,
        handle: u64,
        offset_bytes: usize,
        usage: Usage,
    },
    Texture {
        variable_uid: u32,
        handle: u64,
        usage: Usage,
    },
    /// Inline value bytes, laid out as the slot's type.
    Uniform {
        variable_uid: u32,
        data: Vec<u8>,
        alignment: usize,
    },
    Heap {
        variable_uid: u32,
        handle: u64,
    },
    Accel {
        variable_uid: u32,
        handle: u64,
    },
}

impl Argument {
    #[inline]
    pub fn variable_uid(&self) -> u32 {
        match self {
            Self::Buffer { variable_uid, .. }
            | Self::Texture { variable_uid, .. }
            | Self::Uniform { variable_uid, .. }
            | Self::Heap { variable_uid, .. }
            | Self::Accel { variable_uid, .. } => *variable_uid,
        }
    }
}

/// Kernel launch: shader handle, encoded arguments and a 3-extent dispatch size.
///
/// Captured resources come first (buffers, textures, heaps, accels), then the
/// kernel's formal arguments in declaration order.
#[derive(Debug, Clone)]
pub struct ShaderDispatchCommand {
    pub handle: u64,
    pub kernel: Arc<Function>,
    pub arguments: Vec<Argument>,
    pub dispatch_size: UVec3,
}

impl ShaderDispatchCommand {
    pub(crate) fn new(handle: u64, kernel: Arc<Function>) -> Self {
        let capacity = kernel.captured_count() + kernel.arguments().len();
        Self {
            handle,
            kernel,
            arguments: Vec::with_capacity(capacity.min(MAX_ARGUMENT_COUNT)),
            dispatch_size: UVec3::ONE,
        }
    }

    /// Slots filled by captured resources.
    #[inline]
    pub fn captured_arguments(&self) -> &[Argument] {
        &self.arguments[..self.kernel.captured_count().min(self.arguments.len())]
    }

    /// Slots filled at the call site.
    #[inline]
    pub fn explicit_arguments(&self) -> &[Argument] {
        &self.arguments[self.kernel.captured_count().min(self.arguments.len())..]
    }

    pub(crate) fn encode_buffer(
        &mut self,
        variable_uid: u32,
        handle: u64,
        offset_bytes: usize,
        usage: Usage,
    ) -> Result<()> {
        self.push(Argument::Buffer {
            variable_uid,
            handle,
            offset_bytes,
            usage,
        })
    }

    pub(crate) fn encode_texture(&mut self, variable_uid: u32, handle: u64, usage: Usage) -> Result<()> {
        self.push(Argument::Texture {
            variable_uid,
            handle,
            usage,
        })
    }

    pub(crate) fn encode_uniform(&mut self, variable_uid: u32, data: Vec<u8>, alignment: usize) -> Result<()> {
        self.push(Argument::Uniform {
            variable_uid,
            data,
            alignment,
        })
    }

    pub(crate) fn encode_heap(&mut self, variable_uid: u32, handle: u64) -> Result<()> {
        self.push(Argument::Heap {
            variable_uid,
            handle,
        })
    }

    pub(crate) fn encode_accel(&mut self, variable_uid: u32, handle: u64) -> Result<()> {
        self.push(Argument::Accel {
            variable_uid,
            handle,
        })
    }

    fn push(&mut self, argument: Argument) -> Result<()> {
        if self.arguments.len() == MAX_ARGUMENT_COUNT {
            return raise(Error::TooManyArguments {
                handle: self.handle,
                limit: MAX_ARGUMENT_COUNT,
            });
        }
        self.arguments.push(argument);
        Ok(())
    }
}
