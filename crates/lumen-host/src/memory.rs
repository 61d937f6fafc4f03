//! Resource tables shared by the device front and the stream workers.

use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use glam::{Mat4, UVec3};
use lumen_runtime::ast::Function;
use lumen_runtime::device::INVALID_HANDLE;
use lumen_runtime::resource::{PixelStorage, TextureDesc};
use parking_lot::Mutex;

use crate::event::HostEvent;
use crate::kernel::KernelRegistry;
use crate::slots::SlotTable;

#[derive(Debug)]
pub(crate) struct HostBuffer {
    pub bytes: Vec<u8>,
    pub heap: u64,
}

#[derive(Debug)]
pub(crate) struct HostTexture {
    pub desc: TextureDesc,
    /// One tightly packed byte vector per mip level.
    pub levels: Vec<Vec<u8>>,
}

impl HostTexture {
    fn new(desc: &TextureDesc) -> Result<Self> {
        let levels = (0..desc.mip_levels)
            .map(|level| {
                let size = desc.level_size(level);
                let bytes = desc
                    .storage
                    .region_bytes(size)
                    .with_context(|| format!("level {level} of {size} texels overflows"))?;
                Ok(vec![0; bytes])
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            desc: desc.clone(),
            levels,
        })
    }

    pub fn size_bytes(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Byte ranges of each row of the region `offset..offset + size` in `level`,
    /// in upload order (x fastest, then y, then z).
    pub fn rows(
        &self,
        storage: PixelStorage,
        level: u32,
        offset: UVec3,
        size: UVec3,
    ) -> Result<impl Iterator<Item = std::ops::Range<usize>> + use<>> {
        ensure!(
            storage == self.desc.storage,
            "pixel storage {storage:?} does not match texture storage {:?}",
            self.desc.storage
        );
        ensure!(level < self.desc.mip_levels, "mip level {level} out of range");
        let extent = self.desc.level_size(level);
        ensure!(
            (offset.as_u64vec3() + size.as_u64vec3()).cmple(extent.as_u64vec3()).all(),
            "region {offset}+{size} exceeds level extent {extent}"
        );
        // In bounds of a level that is allocated, so texel indices fit `usize`.
        let pixel = storage.pixel_size();
        let row = size.x as usize * pixel;
        let (width, height) = (extent.x as usize, extent.y as usize);
        let (x, y0, z0) = (offset.x as usize, offset.y as usize, offset.z as usize);
        Ok((0..size.z as usize).flat_map(move |z| {
            (0..size.y as usize).map(move |y| {
                let texel = ((z0 + z) * height + y0 + y) * width + x;
                let start = texel * pixel;
                start..start + row
            })
        }))
    }
}

#[derive(Debug)]
pub(crate) struct HostHeap {
    pub capacity: usize,
    pub used: usize,
}

#[derive(Debug, Default)]
pub(crate) struct HostMesh {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub updates: u64,
}

#[derive(Debug, Default)]
pub(crate) struct HostAccel {
    pub meshes: Vec<u64>,
    pub transforms: Vec<Mat4>,
    pub refits: u64,
}

/// Every table except streams. Stream workers hold an `Arc<Memory>`; streams
/// themselves live on the device so dropping the device joins the workers.
#[derive(Debug, Default)]
pub(crate) struct Memory {
    pub buffers: Mutex<SlotTable<HostBuffer>>,
    pub textures: Mutex<SlotTable<HostTexture>>,
    pub heaps: Mutex<SlotTable<HostHeap>>,
    pub shaders: Mutex<SlotTable<Arc<Function>>>,
    pub meshes: Mutex<SlotTable<HostMesh>>,
    pub accels: Mutex<SlotTable<HostAccel>>,
    pub events: Mutex<SlotTable<Arc<HostEvent>>>,
    pub kernels: KernelRegistry,
}

impl Memory {
    pub fn create_buffer(&self, size_bytes: usize, heap: u64) -> Result<u64> {
        self.charge_heap(heap, size_bytes)?;
        let handle = self.buffers.lock().insert(HostBuffer {
            bytes: vec![0; size_bytes],
            heap,
        });
        Ok(handle)
    }

    pub fn destroy_buffer(&self, handle: u64) -> Option<usize> {
        let buffer = self.buffers.lock().remove(handle)?;
        self.release_heap(buffer.heap, buffer.bytes.len());
        Some(buffer.bytes.len())
    }

    pub fn create_texture(&self, desc: &TextureDesc) -> Result<u64> {
        let texture = HostTexture::new(desc)?;
        self.charge_heap(desc.heap_handle, texture.size_bytes())?;
        Ok(self.textures.lock().insert(texture))
    }

    pub fn destroy_texture(&self, handle: u64) -> Option<usize> {
        let texture = self.textures.lock().remove(handle)?;
        let size = texture.size_bytes();
        self.release_heap(texture.desc.heap_handle, size);
        Some(size)
    }

    fn charge_heap(&self, heap: u64, size_bytes: usize) -> Result<()> {
        if heap == INVALID_HANDLE {
            return Ok(());
        }
        let mut heaps = self.heaps.lock();
        let entry = heaps.get_mut(heap).with_context(|| format!("unknown heap #{heap}"))?;
        let used = entry.used + size_bytes;
        if used > entry.capacity {
            bail!(
                "heap #{heap} exhausted: {used} of {} bytes requested",
                entry.capacity
            );
        }
        entry.used = used;
        Ok(())
    }

    fn release_heap(&self, heap: u64, size_bytes: usize) {
        if heap == INVALID_HANDLE {
            return;
        }
        // The heap may already be gone; its allocations went with it.
        if let Some(entry) = self.heaps.lock().get_mut(heap) {
            entry.used = entry.used.saturating_sub(size_bytes);
        }
    }

    pub fn event(&self, handle: u64) -> Option<Arc<HostEvent>> {
        self.events.lock().get(handle).cloned()
    }
}

#[cfg(test)]
mod tests {
    use lumen_runtime::resource::TextureSampler;

    use super::*;

    fn desc(size: UVec3, mip_levels: u32, heap_handle: u64) -> TextureDesc {
        TextureDesc {
            storage: PixelStorage::Byte4,
            dimension: 2,
            size,
            mip_levels,
            sampler: TextureSampler::default(),
            heap_handle,
            index_in_heap: 0,
        }
    }

    #[test]
    fn heaps_are_charged_and_released() {
        let memory = Memory::default();
        let heap = memory.heaps.lock().insert(HostHeap {
            capacity: 1024,
            used: 0,
        });

        let a = memory.create_buffer(256, heap).unwrap();
        let t = memory.create_texture(&desc(UVec3::new(8, 8, 1), 1, heap)).unwrap();
        assert_eq!(memory.heaps.lock().get(heap).unwrap().used, 256 + 256);
        assert!(memory.create_buffer(1024, heap).is_err());

        assert_eq!(memory.destroy_buffer(a), Some(256));
        assert_eq!(memory.destroy_buffer(a), None);
        assert_eq!(memory.destroy_texture(t), Some(256));
        assert_eq!(memory.heaps.lock().get(heap).unwrap().used, 0);
        assert!(memory.create_buffer(16, 99).is_err());
    }

    #[test]
    fn texture_rows_walk_the_region() {
        let texture = HostTexture::new(&desc(UVec3::new(4, 4, 1), 3, INVALID_HANDLE)).unwrap();
        assert_eq!(
            texture.levels.iter().map(Vec::len).collect::<Vec<_>>(),
            [64, 16, 4]
        );
        let rows: Vec<_> = texture
            .rows(PixelStorage::Byte4, 0, UVec3::new(1, 2, 0), UVec3::new(2, 2, 1))
            .unwrap()
            .collect();
        assert_eq!(rows, [36..44, 52..60]);

        assert!(texture
            .rows(PixelStorage::Float4, 0, UVec3::ZERO, UVec3::ONE)
            .is_err());
        assert!(texture
            .rows(PixelStorage::Byte4, 1, UVec3::new(1, 0, 0), UVec3::new(2, 1, 1))
            .is_err());
        assert!(texture
            .rows(PixelStorage::Byte4, 0, UVec3::new(u32::MAX, 0, 0), UVec3::new(2, 1, 1))
            .is_err());
    }

    #[test]
    fn oversized_textures_are_refused() {
        let memory = Memory::default();
        let huge = desc(UVec3::new(u32::MAX, u32::MAX, 1 << 30), 1, INVALID_HANDLE);
        assert!(memory.create_texture(&huge).is_err());
        assert_eq!(memory.textures.lock().len(), 0);
    }

    #[test]
    fn rows_of_deep_volumes_index_in_usize() {
        let mut volume = desc(UVec3::new(2048, 2048, 1025), 1, INVALID_HANDLE);
        volume.storage = PixelStorage::Byte1;
        volume.dimension = 3;
        // Rows only need the extent; skip allocating the 4 GiB level.
        let texture = HostTexture {
            desc: volume,
            levels: Vec::new(),
        };
        let last = texture
            .rows(PixelStorage::Byte1, 0, UVec3::new(0, 2047, 1024), UVec3::new(4, 1, 1))
            .unwrap()
            .next()
            .unwrap();
        let start = 1024 * 2048 * 2048 + 2047 * 2048;
        assert_eq!(last, start..start + 4);
    }
}
