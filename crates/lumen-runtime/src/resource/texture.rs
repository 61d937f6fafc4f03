//! 2D images and 3D volumes.

use core::fmt;
use core::marker::PhantomData;

use bytemuck::Pod;
use glam::{UVec2, UVec3};

use super::Readback;
use crate::ast::ValueDesc;
use crate::command::{TextureDownloadCommand, TextureUploadCommand};
use crate::device::{Device, Resource, ResourceTag, INVALID_HANDLE};
use crate::error::{raise, Error, Result};

/// Per-pixel storage format: channel type × channel count.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelStorage {
    Byte1,
    Byte2,
    Byte4,
    Short1,
    Short2,
    Short4,
    Int1,
    Int2,
    Int4,
    Half1,
    Half2,
    Half4,
    Float1,
    Float2,
    Float4,
}

impl PixelStorage {
    pub const fn channel_count(self) -> usize {
        use PixelStorage::*;
        match self {
            Byte1 | Short1 | Int1 | Half1 | Float1 => 1,
            Byte2 | Short2 | Int2 | Half2 | Float2 => 2,
            Byte4 | Short4 | Int4 | Half4 | Float4 => 4,
        }
    }

    /// Bytes per channel.
    pub const fn channel_size(self) -> usize {
        use PixelStorage::*;
        match self {
            Byte1 | Byte2 | Byte4 => 1,
            Short1 | Short2 | Short4 | Half1 | Half2 | Half4 => 2,
            Int1 | Int2 | Int4 | Float1 | Float2 | Float4 => 4,
        }
    }

    #[inline]
    pub const fn pixel_size(self) -> usize {
        self.channel_size() * self.channel_count()
    }

    /// Bytes of a tightly packed region of `size` texels, `None` on overflow.
    pub fn region_bytes(self, size: UVec3) -> Option<usize> {
        [size.x, size.y, size.z]
            .into_iter()
            .try_fold(self.pixel_size(), |bytes, n| bytes.checked_mul(n as usize))
    }

    #[inline]
    const fn is_floating(self) -> bool {
        use PixelStorage::*;
        matches!(self, Half1 | Half2 | Half4 | Float1 | Float2 | Float4)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum SamplerFilter {
    #[default]
    Point,
    Bilinear,
    Trilinear,
    Anisotropic,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum SamplerAddress {
    #[default]
    Edge,
    Repeat,
    Mirror,
    Zero,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TextureSampler {
    pub filter: SamplerFilter,
    pub address: SamplerAddress,
}

/// Everything a backend needs to create a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub storage: PixelStorage,
    /// 2 or 3.
    pub dimension: u32,
    /// Level-0 extent; `z` is 1 for 2D textures.
    pub size: UVec3,
    pub mip_levels: u32,
    pub sampler: TextureSampler,
    /// [`INVALID_HANDLE`] for a standalone texture.
    pub heap_handle: u64,
    pub index_in_heap: u32,
}

impl TextureDesc {
    /// Extent of mip `level`.
    #[inline]
    pub fn level_size(&self, level: u32) -> UVec3 {
        (self.size >> level).max(UVec3::ONE)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
}

/// Element type a kernel reads from a texture: `f32`, `i32` or `u32`.
pub trait Texel: ValueDesc + Pod + sealed::Sealed {
    /// Whether `storage` can back textures of this texel type.
    fn accepts(storage: PixelStorage) -> bool;
}

impl Texel for f32 {
    fn accepts(storage: PixelStorage) -> bool {
        !matches!(
            storage,
            PixelStorage::Int1 | PixelStorage::Int2 | PixelStorage::Int4
        )
    }
}

impl Texel for i32 {
    fn accepts(storage: PixelStorage) -> bool {
        !storage.is_floating()
    }
}

impl Texel for u32 {
    fn accepts(storage: PixelStorage) -> bool {
        !storage.is_floating()
    }
}

fn validate<T: Texel>(desc: &TextureDesc) -> Result<()> {
    if !T::accepts(desc.storage) {
        return raise(Error::ArgumentMismatch(format!(
            "{:?} storage cannot hold `{}` texels",
            desc.storage,
            T::description()
        )));
    }
    if desc.size.min_element() == 0 {
        return raise(Error::OutOfRange(format!("texture size {} has a zero extent", desc.size)));
    }
    if desc.storage.region_bytes(desc.size).is_none() {
        return raise(Error::OutOfRange(format!(
            "texture of {} {:?} texels overflows the address space",
            desc.size, desc.storage
        )));
    }
    let max_levels = 32 - desc.size.max_element().leading_zeros();
    if desc.mip_levels == 0 || desc.mip_levels > max_levels {
        return raise(Error::OutOfRange(format!(
            "{} mip level(s) for size {} (at most {max_levels})",
            desc.mip_levels, desc.size
        )));
    }
    Ok(())
}

macro_rules! texture_type {
    ($(#[$doc:meta])* $name:ident, $view:ident, $extent:ty, $to3:expr, $at3:expr, $from3:expr) => {
        $(#[$doc])*
        pub struct $name<T> {
            resource: Resource,
            desc: TextureDesc,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T: Texel> $name<T> {
            pub(crate) fn create(device: &Device, desc: TextureDesc) -> Result<Self> {
                validate::<T>(&desc)?;
                let resource = Resource::create(device, ResourceTag::Texture, |i| i.create_texture(&desc))?;
                Ok(Self {
                    resource,
                    desc,
                    _marker: PhantomData,
                })
            }
        }

        impl<T> $name<T> {
            #[inline]
            pub fn handle(&self) -> u64 {
                self.resource.handle()
            }

            #[inline]
            pub fn device(&self) -> &Device {
                self.resource.device()
            }

            #[inline]
            pub fn storage(&self) -> PixelStorage {
                self.desc.storage
            }

            /// Level-0 extent.
            #[inline]
            pub fn size(&self) -> $extent {
                ($from3)(self.desc.size)
            }

            #[inline]
            pub fn mip_levels(&self) -> u32 {
                self.desc.mip_levels
            }

            #[inline]
            pub fn sampler(&self) -> TextureSampler {
                self.desc.sampler
            }

            #[inline]
            pub fn desc(&self) -> &TextureDesc {
                &self.desc
            }

            /// Whole mip level 0.
            #[inline]
            pub fn as_view(&self) -> $view<'_, T> {
                $view {
                    texture: self,
                    level: 0,
                    offset: <$extent>::ZERO,
                    size: self.size(),
                }
            }

            /// Whole mip `level`.
            pub fn view(&self, level: u32) -> Result<$view<'_, T>> {
                if level >= self.desc.mip_levels {
                    return raise(Error::OutOfRange(format!(
                        "mip level {level} of a texture with {} level(s)",
                        self.desc.mip_levels
                    )));
                }
                Ok($view {
                    texture: self,
                    level,
                    offset: <$extent>::ZERO,
                    size: ($from3)(self.desc.level_size(level)),
                })
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("resource", &self.resource)
                    .field("desc", &self.desc)
                    .finish()
            }
        }

        /// Rectangular region of one mip level.
        pub struct $view<'a, T> {
            texture: &'a $name<T>,
            level: u32,
            offset: $extent,
            size: $extent,
        }

        impl<T> Clone for $view<'_, T> {
            #[inline]
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $view<'_, T> {}

        impl<T> fmt::Debug for $view<'_, T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($view))
                    .field("handle", &self.handle())
                    .field("level", &self.level)
                    .field("offset", &self.offset)
                    .field("size", &self.size)
                    .finish()
            }
        }

        impl<'a, T> $view<'a, T> {
            #[inline]
            pub fn texture(&self) -> &'a $name<T> {
                self.texture
            }

            #[inline]
            pub fn handle(&self) -> u64 {
                self.texture.handle()
            }

            #[inline]
            pub fn device(&self) -> &'a Device {
                self.texture.device()
            }

            #[inline]
            pub fn level(&self) -> u32 {
                self.level
            }

            /// Region origin within the level.
            #[inline]
            pub fn offset(&self) -> $extent {
                self.offset
            }

            #[inline]
            pub fn size(&self) -> $extent {
                self.size
            }

            /// Narrows the view to `size` texels at `offset`, relative to this view.
            pub fn region(&self, offset: $extent, size: $extent) -> Result<Self> {
                let end = ($at3)(offset).as_u64vec3() + ($at3)(size).as_u64vec3();
                if size.min_element() == 0 || end.cmpgt(($at3)(self.size).as_u64vec3()).any() {
                    return raise(Error::OutOfRange(format!(
                        "region {offset} + {size} of a view of {}",
                        self.size
                    )));
                }
                Ok(Self {
                    texture: self.texture,
                    level: self.level,
                    offset: self.offset + offset,
                    size,
                })
            }

            /// Records an upload of `pixels`, tightly packed in the texture's storage format.
            pub fn copy_from<P: Pod>(&self, pixels: &[P]) -> Result<TextureUploadCommand> {
                let data: &[u8] = bytemuck::cast_slice(pixels);
                let storage = self.texture.desc.storage;
                let expected = storage.region_bytes(($to3)(self.size));
                if expected != Some(data.len()) {
                    return raise(Error::OutOfRange(format!(
                        "{} byte(s) uploaded into a region of {} texel(s)",
                        data.len(),
                        ($to3)(self.size)
                    )));
                }
                Ok(TextureUploadCommand {
                    handle: self.handle(),
                    storage,
                    level: self.level,
                    offset: ($at3)(self.offset),
                    size: ($to3)(self.size),
                    data: data.to_vec(),
                })
            }

            pub fn copy_to(&self, target: &Readback) -> TextureDownloadCommand {
                TextureDownloadCommand {
                    handle: self.handle(),
                    storage: self.texture.desc.storage,
                    level: self.level,
                    offset: ($at3)(self.offset),
                    size: ($to3)(self.size),
                    target: target.clone(),
                }
            }
        }
    };
}

texture_type!(
    /// Typed 2D texture.
    Image,
    ImageView,
    UVec2,
    |v: UVec2| v.extend(1),
    |v: UVec2| v.extend(0),
    |v: UVec3| v.truncate()
);

texture_type!(
    /// Typed 3D texture.
    Volume,
    VolumeView,
    UVec3,
    |v: UVec3| v,
    |v: UVec3| v,
    |v: UVec3| v
);

impl Device {
    /// Creates a standalone 2D texture with the default sampler.
    pub fn create_image<T: Texel>(&self, storage: PixelStorage, size: UVec2, mip_levels: u32) -> Result<Image<T>> {
        Image::create(
            self,
            TextureDesc {
                storage,
                dimension: 2,
                size: size.extend(1),
                mip_levels,
                sampler: TextureSampler::default(),
                heap_handle: INVALID_HANDLE,
                index_in_heap: 0,
            },
        )
    }

    /// Creates a standalone 3D texture with the default sampler.
    pub fn create_volume<T: Texel>(&self, storage: PixelStorage, size: UVec3, mip_levels: u32) -> Result<Volume<T>> {
        Volume::create(
            self,
            TextureDesc {
                storage,
                dimension: 3,
                size,
                mip_levels,
                sampler: TextureSampler::default(),
                heap_handle: INVALID_HANDLE,
                index_in_heap: 0,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{set_error_policy, ErrorPolicy};
    use crate::testing::mock_device;

    #[test]
    fn storage_sizes() {
        assert_eq!(PixelStorage::Byte4.pixel_size(), 4);
        assert_eq!(PixelStorage::Half2.pixel_size(), 4);
        assert_eq!(PixelStorage::Float4.pixel_size(), 16);
        assert_eq!(PixelStorage::Short1.channel_count(), 1);
    }

    #[test]
    fn creation_passes_a_full_description() {
        let (device, log) = mock_device();
        let image = device
            .create_image::<f32>(PixelStorage::Byte4, UVec2::new(64, 32), 3)
            .unwrap();
        assert_eq!(image.size(), UVec2::new(64, 32));

        let desc = &log.textures()[0];
        assert_eq!(desc.dimension, 2);
        assert_eq!(desc.size, UVec3::new(64, 32, 1));
        assert_eq!(desc.level_size(2), UVec3::new(16, 8, 1));
        assert_eq!(desc.heap_handle, INVALID_HANDLE);
    }

    #[test]
    fn views_cover_one_mip_level() {
        let (device, _) = mock_device();
        let volume = device
            .create_volume::<u32>(PixelStorage::Int1, UVec3::new(8, 8, 4), 2)
            .unwrap();
        let level1 = volume.view(1).unwrap();
        assert_eq!(level1.size(), UVec3::new(4, 4, 2));

        let region = level1.region(UVec3::new(1, 1, 0), UVec3::new(2, 2, 2)).unwrap();
        assert_eq!(region.offset(), UVec3::new(1, 1, 0));
        let cmd = region.copy_from(&[0u32; 8]).unwrap();
        assert_eq!((cmd.level, cmd.size, cmd.region_bytes()), (1, UVec3::splat(2), Some(32)));
    }

    #[test]
    fn invalid_textures_and_regions_are_rejected() {
        set_error_policy(ErrorPolicy::Return);
        let (device, _) = mock_device();
        assert!(matches!(
            device.create_image::<i32>(PixelStorage::Float1, UVec2::new(4, 4), 1),
            Err(Error::ArgumentMismatch(_))
        ));
        assert!(matches!(
            device.create_image::<f32>(PixelStorage::Float1, UVec2::new(4, 4), 4),
            Err(Error::OutOfRange(_))
        ));

        let image = device
            .create_image::<f32>(PixelStorage::Float4, UVec2::new(4, 4), 1)
            .unwrap();
        assert!(image.view(1).is_err());
        assert!(image.as_view().region(UVec2::new(3, 0), UVec2::new(2, 1)).is_err());
        assert!(image.as_view().copy_from(&[0.0f32; 4]).is_err());
        assert!(matches!(
            image.as_view().region(UVec2::new(u32::MAX, 0), UVec2::new(2, 1)),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            device.create_image::<f32>(PixelStorage::Float4, UVec2::splat(u32::MAX), 1),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn image_regions_address_the_first_slice() {
        let (device, _) = mock_device();
        let image = device
            .create_image::<f32>(PixelStorage::Float1, UVec2::new(8, 8), 1)
            .unwrap();
        let region = image.as_view().region(UVec2::new(2, 3), UVec2::new(4, 2)).unwrap();
        let cmd = region.copy_from(&[0.0f32; 8]).unwrap();
        assert_eq!((cmd.offset, cmd.size), (UVec3::new(2, 3, 0), UVec3::new(4, 2, 1)));
        assert_eq!(region.copy_to(&Readback::new()).offset, UVec3::new(2, 3, 0));
    }
}
