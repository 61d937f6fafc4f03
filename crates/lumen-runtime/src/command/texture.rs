use glam::UVec3;

use crate::resource::{PixelStorage, Readback};

/// Host → texture region copy.
///
/// `data` holds `size.x * size.y * size.z` pixels in `storage` format, rows
/// tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureUploadCommand {
    pub handle: u64,
    pub storage: PixelStorage,
    pub level: u32,
    pub offset: UVec3,
    pub size: UVec3,
    pub data: Vec<u8>,
}

/// Texture region → host copy.
#[derive(Debug, Clone)]
pub struct TextureDownloadCommand {
    pub handle: u64,
    pub storage: PixelStorage,
    pub level: u32,
    pub offset: UVec3,
    pub size: UVec3,
    pub target: Readback,
}

impl TextureUploadCommand {
    /// Byte size of the copied region, `None` if it overflows `usize`.
    #[inline]
    pub fn region_bytes(&self) -> Option<usize> {
        self.storage.region_bytes(self.size)
    }
}

impl TextureDownloadCommand {
    #[inline]
    pub fn region_bytes(&self) -> Option<usize> {
        self.storage.region_bytes(self.size)
    }
}
