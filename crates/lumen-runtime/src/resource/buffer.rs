use core::fmt;
use core::marker::PhantomData;
use core::ops::{Bound, Range, RangeBounds};

use bytemuck::Pod;

use super::Readback;
use crate::ast::ValueDesc;
use crate::command::{BufferCopyCommand, BufferDownloadCommand, BufferUploadCommand};
use crate::device::{Device, Resource, ResourceTag, INVALID_HANDLE};
use crate::error::{raise, Error, Result};

/// Typed linear device memory holding `len` elements of `T`.
pub struct Buffer<T> {
    resource: Resource,
    len: usize,
    _marker: PhantomData<fn() -> T>,
}

impl Device {
    /// Creates a standalone buffer of `len` elements.
    pub fn create_buffer<T: ValueDesc + Pod>(&self, len: usize) -> Result<Buffer<T>> {
        Buffer::create(self, len, INVALID_HANDLE, 0)
    }
}

impl<T: ValueDesc + Pod> Buffer<T> {
    pub(crate) fn create(device: &Device, len: usize, heap_handle: u64, index_in_heap: u32) -> Result<Self> {
        let Some(size_bytes) = len.checked_mul(size_of::<T>()) else {
            return raise(Error::OutOfRange(format!(
                "{len} element(s) of `{}` overflow the address space",
                T::description()
            )));
        };
        let resource = Resource::create(device, ResourceTag::Buffer, |i| {
            i.create_buffer(size_bytes, heap_handle, index_in_heap)
        })?;
        Ok(Self {
            resource,
            len,
            _marker: PhantomData,
        })
    }

    /// View over the whole buffer.
    #[inline]
    pub fn as_view(&self) -> BufferView<'_, T> {
        BufferView {
            buffer: self,
            offset: 0,
            len: self.len,
        }
    }

    /// View over `range` (in elements).
    pub fn view(&self, range: impl RangeBounds<usize>) -> Result<BufferView<'_, T>> {
        self.as_view().subview(range)
    }

    /// Records an upload of `data` into the whole buffer.
    pub fn copy_from(&self, data: &[T]) -> Result<BufferUploadCommand> {
        self.as_view().copy_from(data)
    }

    /// Records a download of the whole buffer into `target`.
    pub fn copy_to(&self, target: &Readback) -> BufferDownloadCommand {
        self.as_view().copy_to(target)
    }

    /// Records a copy of `src` into this buffer. Both must have the same length.
    pub fn copy_from_buffer(&self, src: &Buffer<T>) -> Result<BufferCopyCommand> {
        self.as_view().copy_from_view(src.as_view())
    }
}

impl<T> Buffer<T> {
    #[inline]
    pub fn handle(&self) -> u64 {
        self.resource.handle()
    }

    #[inline]
    pub fn device(&self) -> &Device {
        self.resource.device()
    }

    /// Element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.len * size_of::<T>()
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("resource", &self.resource)
            .field("len", &self.len)
            .finish()
    }
}

/// Element range of a [`Buffer`].
pub struct BufferView<'a, T> {
    buffer: &'a Buffer<T>,
    offset: usize,
    len: usize,
}

impl<T> Clone for BufferView<'_, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BufferView<'_, T> {}

impl<T> fmt::Debug for BufferView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("handle", &self.handle())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl<'a, T> BufferView<'a, T> {
    #[inline]
    pub fn buffer(&self) -> &'a Buffer<T> {
        self.buffer
    }

    #[inline]
    pub fn handle(&self) -> u64 {
        self.buffer.handle()
    }

    #[inline]
    pub fn device(&self) -> &'a Device {
        self.buffer.device()
    }

    /// First element, relative to the buffer start.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn offset_bytes(&self) -> usize {
        self.offset * size_of::<T>()
    }

    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.len * size_of::<T>()
    }

    /// Narrows this view to `range`, relative to the view start.
    pub fn subview(&self, range: impl RangeBounds<usize>) -> Result<Self> {
        let r = resolve_range(range, self.len)?;
        Ok(Self {
            buffer: self.buffer,
            offset: self.offset + r.start,
            len: r.len(),
        })
    }
}

impl<T: Pod> BufferView<'_, T> {
    /// Records an upload of `data`; the bytes are copied now.
    pub fn copy_from(&self, data: &[T]) -> Result<BufferUploadCommand> {
        if data.len() != self.len {
            return raise(Error::OutOfRange(format!(
                "upload of {} element(s) into a view of {}",
                data.len(),
                self.len
            )));
        }
        Ok(BufferUploadCommand {
            handle: self.handle(),
            offset_bytes: self.offset_bytes(),
            data: bytemuck::cast_slice(data).to_vec(),
        })
    }

    pub fn copy_to(&self, target: &Readback) -> BufferDownloadCommand {
        BufferDownloadCommand {
            handle: self.handle(),
            offset_bytes: self.offset_bytes(),
            size_bytes: self.size_bytes(),
            target: target.clone(),
        }
    }

    /// Records a copy of `src` into this view.
    pub fn copy_from_view(&self, src: BufferView<'_, T>) -> Result<BufferCopyCommand> {
        self.device().ensure_owns(src.device().id())?;
        if src.len != self.len {
            return raise(Error::OutOfRange(format!(
                "copy of {} element(s) into a view of {}",
                src.len, self.len
            )));
        }
        Ok(BufferCopyCommand {
            src_handle: src.handle(),
            src_offset_bytes: src.offset_bytes(),
            dst_handle: self.handle(),
            dst_offset_bytes: self.offset_bytes(),
            size_bytes: self.size_bytes(),
        })
    }
}

fn resolve_range(range: impl RangeBounds<usize>, len: usize) -> Result<Range<usize>> {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e + 1,
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    if start > end || end > len {
        return raise(Error::OutOfRange(format!("{start}..{end} of a view of {len}")));
    }
    Ok(start..end)
}
