//! Typed wrappers over backend resources.
//!
//! Each wrapper owns a [`crate::device::Resource`] and is created through a
//! `Device::create_*` method defined next to it.

mod buffer;
mod event;
mod heap;
mod readback;
mod stream;
mod texture;

pub use buffer::{Buffer, BufferView};
pub use event::Event;
pub use heap::Heap;
pub use readback::Readback;
pub use stream::Stream;
pub use texture::{
    Image, ImageView, PixelStorage, SamplerAddress, SamplerFilter, Texel, TextureDesc, TextureSampler,
    Volume, VolumeView,
};
