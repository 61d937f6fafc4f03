//! Kernel-visible type system and recorded bodies.
//!
//! This module is responsible for:
//! - interning structural types ([`Type`], [`TypeRegistry`])
//! - deduplicating embedded constants ([`ConstantData`])
//! - the AST leaf model ([`Variable`], [`Usage`])
//! - recording kernels and callables ([`FunctionBuilder`], [`Kernel`])

mod constant_data;
mod function;
mod type_desc;
mod type_registry;
mod types;
mod usage;
mod variable;

pub use constant_data::{ConstantData, ConstantView};
pub use function::{
    default_block_size, Callable, CapturedResource, Function, FunctionBuilder, FunctionTag, Kernel,
    Kernel1D, Kernel2D, Kernel3D,
};
pub use type_desc::{TypeDesc, ValueDesc};
pub use type_registry::TypeRegistry;
pub(crate) use type_registry::known;
pub use types::{Type, TypeTag};
pub use usage::Usage;
pub use variable::{Variable, VariableTag};
