use bytemuck::Pod;
use glam::UVec2;

use super::{Buffer, Image, PixelStorage, Texel, TextureDesc, TextureSampler};
use crate::ast::ValueDesc;
use crate::device::{Device, Resource, ResourceTag};
use crate::error::Result;

/// Bindless resource heap. Buffers and images are placed at slot indices and
/// reached by kernels through the heap.
#[derive(Debug)]
pub struct Heap {
    resource: Resource,
    capacity_bytes: usize,
}

impl Device {
    pub fn create_heap(&self, capacity_bytes: usize) -> Result<Heap> {
        let resource = Resource::create(self, ResourceTag::Heap, |i| i.create_heap(capacity_bytes))?;
        Ok(Heap {
            resource,
            capacity_bytes,
        })
    }
}

impl Heap {
    #[inline]
    pub fn handle(&self) -> u64 {
        self.resource.handle()
    }

    #[inline]
    pub fn device(&self) -> &Device {
        self.resource.device()
    }

    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Allocates a buffer of `len` elements at slot `index`.
    pub fn create_buffer<T: ValueDesc + Pod>(&self, index: u32, len: usize) -> Result<Buffer<T>> {
        Buffer::create(self.device(), len, self.handle(), index)
    }

    /// Allocates a 2D texture at slot `index`, sampled with `sampler`.
    pub fn create_image<T: Texel>(
        &self,
        index: u32,
        storage: PixelStorage,
        size: UVec2,
        mip_levels: u32,
        sampler: TextureSampler,
    ) -> Result<Image<T>> {
        Image::create(
            self.device(),
            TextureDesc {
                storage,
                dimension: 2,
                size: size.extend(1),
                mip_levels,
                sampler,
                heap_handle: self.handle(),
                index_in_heap: index,
            },
        )
    }

    /// Bytes currently allocated from this heap, as reported by the backend.
    pub fn memory_usage(&self) -> usize {
        self.device().interface().query_heap_memory_usage(self.handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_device;

    #[test]
    fn heap_allocations_carry_the_heap_handle() {
        let (device, log) = mock_device();
        let heap = device.create_heap(1 << 20).unwrap();
        let _a = heap.create_buffer::<f32>(0, 256).unwrap();
        let _b = heap.create_buffer::<u32>(1, 64).unwrap();
        assert_eq!(heap.memory_usage(), 256 * 4 + 64 * 4);

        let sampler = TextureSampler::default();
        let _img = heap
            .create_image::<f32>(2, PixelStorage::Byte4, UVec2::new(8, 8), 1, sampler)
            .unwrap();
        let desc = &log.textures()[0];
        assert_eq!((desc.heap_handle, desc.index_in_heap), (heap.handle(), 2));
    }
}
