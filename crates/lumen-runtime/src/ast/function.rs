//! Recorded kernel and callable bodies.
//!
//! Responsibilities:
//! - assign variable ids in declaration order
//! - keep formal arguments apart from captured resources
//! - accumulate per-variable usage and referenced constants
//! - freeze the record into a shareable, hashed [`Function`]

use std::sync::Arc;

use glam::UVec3;

use super::{known, ConstantData, ConstantView, Type, TypeTag, Usage, ValueDesc, Variable, VariableTag};
use crate::device::DeviceId;
use crate::resource::{Buffer, BufferView, Heap, Image, Texel, Volume};
use crate::rtx::Accel;

/// Whether a body is dispatchable on its own.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FunctionTag {
    Kernel,
    Callable,
}

/// A resource used by a body without being passed as an argument.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CapturedResource {
    pub variable: Variable,
    pub device: DeviceId,
    pub handle: u64,
    /// Byte offset into the buffer; 0 for other resource kinds.
    pub offset_bytes: usize,
}

/// Default block size for a kernel of `dimension` (256, 16x16, 8x8x8).
pub const fn default_block_size(dimension: usize) -> UVec3 {
    match dimension {
        1 => UVec3::new(256, 1, 1),
        2 => UVec3::new(16, 16, 1),
        _ => UVec3::new(8, 8, 8),
    }
}

/// Immutable result of recording a body.
#[derive(Debug)]
pub struct Function {
    tag: FunctionTag,
    dimension: usize,
    block_size: UVec3,
    arguments: Vec<Variable>,
    captured_buffers: Vec<CapturedResource>,
    captured_textures: Vec<CapturedResource>,
    captured_heaps: Vec<CapturedResource>,
    captured_accels: Vec<CapturedResource>,
    locals: Vec<Variable>,
    shared: Vec<Variable>,
    builtins: Vec<Variable>,
    usages: Vec<Usage>,
    constants: Vec<u64>,
    hash: u64,
}

impl Function {
    #[inline]
    pub fn tag(&self) -> FunctionTag {
        self.tag
    }

    /// Dispatch dimension of a kernel; 0 for callables.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn block_size(&self) -> UVec3 {
        self.block_size
    }

    /// Formal arguments in declaration order, including implicit texture offsets.
    #[inline]
    pub fn arguments(&self) -> &[Variable] {
        &self.arguments
    }

    #[inline]
    pub fn captured_buffers(&self) -> &[CapturedResource] {
        &self.captured_buffers
    }

    #[inline]
    pub fn captured_textures(&self) -> &[CapturedResource] {
        &self.captured_textures
    }

    #[inline]
    pub fn captured_heaps(&self) -> &[CapturedResource] {
        &self.captured_heaps
    }

    #[inline]
    pub fn captured_accels(&self) -> &[CapturedResource] {
        &self.captured_accels
    }

    /// Every captured resource, in binding order (buffers, textures, heaps, accels).
    pub fn captured(&self) -> impl Iterator<Item = &CapturedResource> {
        self.captured_buffers
            .iter()
            .chain(&self.captured_textures)
            .chain(&self.captured_heaps)
            .chain(&self.captured_accels)
    }

    #[inline]
    pub fn captured_count(&self) -> usize {
        self.captured_buffers.len()
            + self.captured_textures.len()
            + self.captured_heaps.len()
            + self.captured_accels.len()
    }

    #[inline]
    pub fn locals(&self) -> &[Variable] {
        &self.locals
    }

    #[inline]
    pub fn shared_variables(&self) -> &[Variable] {
        &self.shared
    }

    #[inline]
    pub fn builtins(&self) -> &[Variable] {
        &self.builtins
    }

    /// Accumulated usage of `variable`.
    #[inline]
    pub fn usage(&self, variable: Variable) -> Usage {
        self.usages.get(variable.uid() as usize).copied().unwrap_or_default()
    }

    /// Hashes of constant blocks referenced by the body.
    #[inline]
    pub fn constants(&self) -> &[u64] {
        &self.constants
    }

    /// Structural hash over shape, variables, usages and constants.
    ///
    /// Captured handles are not part of the hash; they are bound per dispatch.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

/// Records a kernel or callable body.
#[derive(Debug)]
pub struct FunctionBuilder {
    tag: FunctionTag,
    dimension: usize,
    block_size: UVec3,
    arguments: Vec<Variable>,
    captured_buffers: Vec<CapturedResource>,
    captured_textures: Vec<CapturedResource>,
    captured_heaps: Vec<CapturedResource>,
    captured_accels: Vec<CapturedResource>,
    locals: Vec<Variable>,
    shared: Vec<Variable>,
    builtins: Vec<Variable>,
    usages: Vec<Usage>,
    constants: Vec<u64>,
}

impl FunctionBuilder {
    fn new(tag: FunctionTag, dimension: usize) -> Self {
        Self {
            tag,
            dimension,
            block_size: default_block_size(dimension.max(1)),
            arguments: Vec::new(),
            captured_buffers: Vec::new(),
            captured_textures: Vec::new(),
            captured_heaps: Vec::new(),
            captured_accels: Vec::new(),
            locals: Vec::new(),
            shared: Vec::new(),
            builtins: Vec::new(),
            usages: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Starts a kernel body. `dimension` must be 1, 2 or 3.
    pub(crate) fn kernel(dimension: usize) -> Self {
        debug_assert!((1..=3).contains(&dimension));
        Self::new(FunctionTag::Kernel, dimension)
    }

    pub(crate) fn callable() -> Self {
        Self::new(FunctionTag::Callable, 0)
    }

    fn declare(&mut self, ty: &'static Type, tag: VariableTag) -> Variable {
        let v = Variable::new(ty, self.usages.len() as u32, tag);
        self.usages.push(Usage::None);
        v
    }

    // ── formal arguments ──────────────────────────────────────────────────

    /// Declares the next formal argument.
    ///
    /// A texture argument is followed by an implicit `uint2`/`uint3` offset
    /// argument that the binder fills from the bound view.
    pub fn argument(&mut self, ty: &'static Type) -> Variable {
        let v = self.declare(ty, VariableTag::for_argument(ty));
        self.arguments.push(v);
        if ty.tag() == TypeTag::Texture {
            let offset = if ty.dimension() == 2 {
                Type::of::<glam::UVec2>()
            } else {
                known("vector<uint,3>")
            };
            let o = self.declare(offset, VariableTag::Local);
            self.arguments.push(o);
        }
        v
    }

    /// Declares a by-value argument of type `T`.
    #[inline]
    pub fn uniform_argument<T: ValueDesc>(&mut self) -> Variable {
        self.argument(Type::of::<T>())
    }

    #[inline]
    pub fn buffer_argument<T: ValueDesc>(&mut self) -> Variable {
        self.argument(Type::of::<Buffer<T>>())
    }

    #[inline]
    pub fn image_argument<T: Texel>(&mut self) -> Variable {
        self.argument(Type::of::<Image<T>>())
    }

    #[inline]
    pub fn volume_argument<T: Texel>(&mut self) -> Variable {
        self.argument(Type::of::<Volume<T>>())
    }

    #[inline]
    pub fn heap_argument(&mut self) -> Variable {
        self.argument(Type::of::<Heap>())
    }

    #[inline]
    pub fn accel_argument(&mut self) -> Variable {
        self.argument(Type::of::<Accel>())
    }

    // ── captured resources ────────────────────────────────────────────────

    /// Captures a buffer view. Capturing the same view twice yields the same variable.
    pub fn capture_buffer<T: ValueDesc>(&mut self, view: BufferView<'_, T>) -> Variable {
        let (device, handle, offset) = (view.device().id(), view.handle(), view.offset_bytes());
        self.capture(
            CaptureList::Buffers,
            Type::of::<Buffer<T>>(),
            VariableTag::Buffer,
            device,
            handle,
            offset,
        )
    }

    pub fn capture_image<T: Texel>(&mut self, image: &Image<T>) -> Variable {
        self.capture(
            CaptureList::Textures,
            Type::of::<Image<T>>(),
            VariableTag::Texture,
            image.device().id(),
            image.handle(),
            0,
        )
    }

    pub fn capture_volume<T: Texel>(&mut self, volume: &Volume<T>) -> Variable {
        self.capture(
            CaptureList::Textures,
            Type::of::<Volume<T>>(),
            VariableTag::Texture,
            volume.device().id(),
            volume.handle(),
            0,
        )
    }

    pub fn capture_heap(&mut self, heap: &Heap) -> Variable {
        self.capture(
            CaptureList::Heaps,
            Type::of::<Heap>(),
            VariableTag::Heap,
            heap.device().id(),
            heap.handle(),
            0,
        )
    }

    pub fn capture_accel(&mut self, accel: &Accel) -> Variable {
        self.capture(
            CaptureList::Accels,
            Type::of::<Accel>(),
            VariableTag::Accel,
            accel.device().id(),
            accel.handle(),
            0,
        )
    }

    fn capture(
        &mut self,
        list: CaptureList,
        ty: &'static Type,
        tag: VariableTag,
        device: DeviceId,
        handle: u64,
        offset_bytes: usize,
    ) -> Variable {
        let existing = self
            .capture_list(list)
            .iter()
            .find(|c| c.device == device && c.handle == handle && c.offset_bytes == offset_bytes)
            .map(|c| c.variable);
        if let Some(v) = existing {
            return v;
        }
        let variable = self.declare(ty, tag);
        self.capture_list_mut(list).push(CapturedResource {
            variable,
            device,
            handle,
            offset_bytes,
        });
        variable
    }

    fn capture_list(&self, list: CaptureList) -> &Vec<CapturedResource> {
        match list {
            CaptureList::Buffers => &self.captured_buffers,
            CaptureList::Textures => &self.captured_textures,
            CaptureList::Heaps => &self.captured_heaps,
            CaptureList::Accels => &self.captured_accels,
        }
    }

    fn capture_list_mut(&mut self, list: CaptureList) -> &mut Vec<CapturedResource> {
        match list {
            CaptureList::Buffers => &mut self.captured_buffers,
            CaptureList::Textures => &mut self.captured_textures,
            CaptureList::Heaps => &mut self.captured_heaps,
            CaptureList::Accels => &mut self.captured_accels,
        }
    }

    // ── body variables ────────────────────────────────────────────────────

    pub fn local(&mut self, ty: &'static Type) -> Variable {
        let v = self.declare(ty, VariableTag::Local);
        self.locals.push(v);
        v
    }

    /// Declares block-shared storage.
    pub fn shared(&mut self, ty: &'static Type) -> Variable {
        let v = self.declare(ty, VariableTag::Shared);
        self.shared.push(v);
        v
    }

    #[inline]
    pub fn thread_id(&mut self) -> Variable {
        self.builtin(VariableTag::ThreadId)
    }

    #[inline]
    pub fn block_id(&mut self) -> Variable {
        self.builtin(VariableTag::BlockId)
    }

    #[inline]
    pub fn dispatch_id(&mut self) -> Variable {
        self.builtin(VariableTag::DispatchId)
    }

    #[inline]
    pub fn dispatch_size(&mut self) -> Variable {
        self.builtin(VariableTag::DispatchSize)
    }

    fn builtin(&mut self, tag: VariableTag) -> Variable {
        if let Some(v) = self.builtins.iter().find(|v| v.tag() == tag) {
            return *v;
        }
        let v = self.declare(known("vector<uint,3>"), tag);
        self.builtins.push(v);
        v
    }

    /// Records an access to `variable`. Marks accumulate.
    pub fn mark_usage(&mut self, variable: Variable, usage: Usage) {
        if let Some(u) = self.usages.get_mut(variable.uid() as usize) {
            *u |= usage;
        }
    }

    /// Embeds a constant array and returns its content hash.
    pub fn constant<'a>(&mut self, view: impl Into<ConstantView<'a>>) -> u64 {
        let hash = ConstantData::create(view);
        if !self.constants.contains(&hash) {
            self.constants.push(hash);
        }
        hash
    }

    /// Overrides the default block size.
    pub fn set_block_size(&mut self, block_size: UVec3) {
        self.block_size = block_size.max(UVec3::ONE);
    }

    /// Freezes the record.
    pub(crate) fn finish(self) -> Arc<Function> {
        let hash = self.structural_hash();
        log::debug!(
            "recorded {:?} #{hash:016x}: {} argument(s), {} capture(s), {} variable(s)",
            self.tag,
            self.arguments.len(),
            self.captured_buffers.len()
                + self.captured_textures.len()
                + self.captured_heaps.len()
                + self.captured_accels.len(),
            self.usages.len()
        );
        Arc::new(Function {
            tag: self.tag,
            dimension: self.dimension,
            block_size: self.block_size,
            arguments: self.arguments,
            captured_buffers: self.captured_buffers,
            captured_textures: self.captured_textures,
            captured_heaps: self.captured_heaps,
            captured_accels: self.captured_accels,
            locals: self.locals,
            shared: self.shared,
            builtins: self.builtins,
            usages: self.usages,
            constants: self.constants,
            hash,
        })
    }

    fn structural_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.tag as u8, self.dimension as u8]);
        hasher.update(bytemuck::bytes_of(&self.block_size));

        let variable = |hasher: &mut blake3::Hasher, v: &Variable| {
            hasher.update(&v.uid().to_le_bytes());
            hasher.update(&[v.tag() as u8, self.usages[v.uid() as usize] as u8]);
            hasher.update(v.ty().description().as_bytes());
            hasher.update(&[0]);
        };
        for (section, vars) in [
            (b'a', &self.arguments),
            (b'l', &self.locals),
            (b's', &self.shared),
            (b'b', &self.builtins),
        ] {
            hasher.update(&[section]);
            for v in vars {
                variable(&mut hasher, v);
            }
        }
        for (section, captures) in [
            (b'B', &self.captured_buffers),
            (b'T', &self.captured_textures),
            (b'H', &self.captured_heaps),
            (b'A', &self.captured_accels),
        ] {
            hasher.update(&[section]);
            for c in captures {
                variable(&mut hasher, &c.variable);
            }
        }
        hasher.update(&[b'c']);
        for c in &self.constants {
            hasher.update(&c.to_le_bytes());
        }

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(prefix)
    }
}

#[derive(Copy, Clone)]
enum CaptureList {
    Buffers,
    Textures,
    Heaps,
    Accels,
}

// ── definitions ───────────────────────────────────────────────────────────

/// A dispatchable kernel of dimension `N` (1, 2 or 3).
///
/// ```
/// use lumen_runtime::ast::{Kernel1D, Usage};
///
/// let kernel = Kernel1D::define(|b| {
///     let data = b.buffer_argument::<f32>();
///     let _scale = b.uniform_argument::<u32>();
///     b.mark_usage(data, Usage::ReadWrite);
/// });
/// assert_eq!(kernel.function().arguments().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Kernel<const N: usize> {
    function: Arc<Function>,
}

pub type Kernel1D = Kernel<1>;
pub type Kernel2D = Kernel<2>;
pub type Kernel3D = Kernel<3>;

impl<const N: usize> Kernel<N> {
    /// Records `body` once and keeps the result.
    pub fn define(body: impl FnOnce(&mut FunctionBuilder)) -> Self {
        const { assert!(N >= 1 && N <= 3, "kernel dimension must be 1, 2 or 3") };
        let mut builder = FunctionBuilder::kernel(N);
        body(&mut builder);
        Self {
            function: builder.finish(),
        }
    }

    /// Shared recorded body; every shader compiled from this kernel holds a clone.
    #[inline]
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }
}

/// An inlineable helper body. Cannot be compiled on its own.
#[derive(Debug, Clone)]
pub struct Callable {
    function: Arc<Function>,
}

impl Callable {
    pub fn define(body: impl FnOnce(&mut FunctionBuilder)) -> Self {
        let mut builder = FunctionBuilder::callable();
        body(&mut builder);
        Self {
            function: builder.finish(),
        }
    }

    #[inline]
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_declaration_order() {
        let kernel = Kernel1D::define(|b| {
            let a = b.buffer_argument::<f32>();
            let n = b.uniform_argument::<u32>();
            let t = b.thread_id();
            let l = b.local(Type::of::<f32>());
            assert_eq!([a.uid(), n.uid(), t.uid(), l.uid()], [0, 1, 2, 3]);
        });
        let f = kernel.function();
        assert_eq!(f.tag(), FunctionTag::Kernel);
        assert_eq!(f.arguments()[0].tag(), VariableTag::Buffer);
        assert_eq!(f.arguments()[1].tag(), VariableTag::Local);
        assert_eq!(f.block_size(), UVec3::new(256, 1, 1));
    }

    #[test]
    fn texture_arguments_declare_an_offset_slot() {
        let kernel = Kernel2D::define(|b| {
            b.image_argument::<f32>();
            b.volume_argument::<u32>();
        });
        let args = kernel.function().arguments();
        assert_eq!(args.len(), 4);
        assert_eq!(args[0].tag(), VariableTag::Texture);
        assert_eq!(args[1].ty().description(), "vector<uint,2>");
        assert_eq!(args[3].ty().description(), "vector<uint,3>");
        assert_eq!(kernel.function().block_size(), UVec3::new(16, 16, 1));
    }

    #[test]
    fn usage_marks_accumulate_per_variable() {
        let kernel = Kernel3D::define(|b| {
            let buf = b.buffer_argument::<u32>();
            b.mark_usage(buf, Usage::Read);
            b.mark_usage(buf, Usage::Write);
        });
        let f = kernel.function();
        assert_eq!(f.usage(f.arguments()[0]), Usage::ReadWrite);
        assert_eq!(f.block_size(), UVec3::splat(8));
    }

    #[test]
    fn builtins_are_declared_once() {
        Kernel1D::define(|b| {
            let a = b.dispatch_id();
            let c = b.dispatch_id();
            assert_eq!(a, c);
            assert_ne!(a, b.dispatch_size());
            assert_eq!(a.tag(), VariableTag::DispatchId);
            assert!(a.tag().is_builtin());
        });
    }

    #[test]
    fn constants_are_deduplicated_by_content() {
        let kernel = Kernel1D::define(|b| {
            let x = b.constant(&[1u32, 2, 3][..]);
            let y = b.constant(&[1u32, 2, 3][..]);
            assert_eq!(x, y);
        });
        assert_eq!(kernel.function().constants().len(), 1);
    }

    #[test]
    fn hash_tracks_structure_and_usage() {
        let plain = Kernel1D::define(|b| {
            b.buffer_argument::<f32>();
        });
        let same = Kernel1D::define(|b| {
            b.buffer_argument::<f32>();
        });
        let written = Kernel1D::define(|b| {
            let v = b.buffer_argument::<f32>();
            b.mark_usage(v, Usage::Write);
        });
        let wider = Kernel2D::define(|b| {
            b.buffer_argument::<f32>();
        });
        assert_eq!(plain.function().hash(), same.function().hash());
        assert_ne!(plain.function().hash(), written.function().hash());
        assert_ne!(plain.function().hash(), wider.function().hash());
    }

    #[test]
    fn callables_have_no_dimension() {
        let callable = Callable::define(|b| {
            b.uniform_argument::<f32>();
        });
        assert_eq!(callable.function().tag(), FunctionTag::Callable);
        assert_eq!(callable.function().dimension(), 0);
    }
}
