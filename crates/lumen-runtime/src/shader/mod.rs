//! Compiled kernels and dispatch command construction.
//!
//! This module is responsible for:
//! - compiling a [`Kernel`] into a device [`Shader`]
//! - binding call-site arguments to the kernel's slots ([`ShaderInvoke`])
//! - the [`KernelArg`] protocol through which values encode themselves

mod arg;
mod invoke;

use std::sync::Arc;

pub use arg::{KernelArg, KernelArgs, Uniform};
pub use invoke::ShaderInvoke;

use crate::ast::{Function, Kernel};
use crate::device::{Device, Resource, ResourceTag};
use crate::error::Result;

/// Device-side executable for a kernel of dimension `N`.
///
/// Shaders compiled from the same [`Kernel`] share its recorded [`Function`].
#[derive(Debug)]
pub struct Shader<const N: usize> {
    resource: Resource,
    kernel: Arc<Function>,
}

pub type Shader1D = Shader<1>;
pub type Shader2D = Shader<2>;
pub type Shader3D = Shader<3>;

impl Device {
    /// Compiles `kernel` for this device.
    ///
    /// Every resource the kernel captured must belong to this device.
    pub fn compile<const N: usize>(&self, kernel: &Kernel<N>) -> Result<Shader<N>> {
        let function = kernel.function();
        for captured in function.captured() {
            self.ensure_owns(captured.device)?;
        }
        let resource = Resource::create(self, ResourceTag::Shader, |i| i.create_shader(Arc::clone(function)))?;
        log::debug!(
            "{}: compiled kernel #{:016x} into shader #{}",
            self.name(),
            function.hash(),
            resource.handle()
        );
        Ok(Shader {
            resource,
            kernel: Arc::clone(function),
        })
    }
}

impl<const N: usize> Shader<N> {
    #[inline]
    pub fn handle(&self) -> u64 {
        self.resource.handle()
    }

    #[inline]
    pub fn device(&self) -> &Device {
        self.resource.device()
    }

    #[inline]
    pub fn function(&self) -> &Arc<Function> {
        &self.kernel
    }

    /// Starts an invocation with captured resources already bound.
    pub fn invoke(&self) -> Result<ShaderInvoke<'_, N>> {
        ShaderInvoke::new(self)
    }

    /// Starts an invocation and binds `args` (a tuple) left to right.
    ///
    /// ```ignore
    /// let cmd = shader.call((data.as_view(), 12u32))?.dispatch(1024)?;
    /// ```
    pub fn call(&self, args: impl KernelArgs) -> Result<ShaderInvoke<'_, N>> {
        let mut invoke = ShaderInvoke::new(self)?;
        args.bind_all(&mut invoke)?;
        Ok(invoke)
    }
}
