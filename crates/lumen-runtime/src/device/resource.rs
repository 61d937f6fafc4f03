use core::fmt;

use super::{Device, DeviceInterface, INVALID_HANDLE};
use crate::error::{check, raise, Error, Result};

/// Kind of backend object a [`Resource`] owns.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceTag {
    Buffer,
    Texture,
    Heap,
    Shader,
    Stream,
    Event,
    Mesh,
    Accel,
}

/// Owning (device, kind, handle) triple.
///
/// Move-only. Dropping it calls the matching `destroy_*` exactly once.
pub struct Resource {
    device: Device,
    tag: ResourceTag,
    handle: u64,
}

impl Resource {
    /// Runs `create` against `device` and takes ownership of the returned handle.
    pub(crate) fn create(
        device: &Device,
        tag: ResourceTag,
        create: impl FnOnce(&dyn DeviceInterface) -> Result<u64>,
    ) -> Result<Self> {
        let handle = check(create(device.interface()))?;
        if handle == INVALID_HANDLE {
            return raise(Error::InvalidHandle(tag));
        }
        log::trace!("{}: created {tag:?} #{handle}", device.name());
        Ok(Self {
            device: device.clone(),
            tag,
            handle,
        })
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn tag(&self) -> ResourceTag {
        self.tag
    }

    #[inline]
    pub fn handle(&self) -> u64 {
        self.handle
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        let interface = self.device.interface();
        match self.tag {
            ResourceTag::Buffer => interface.destroy_buffer(self.handle),
            ResourceTag::Texture => interface.destroy_texture(self.handle),
            ResourceTag::Heap => interface.destroy_heap(self.handle),
            ResourceTag::Shader => interface.destroy_shader(self.handle),
            ResourceTag::Stream => interface.destroy_stream(self.handle),
            ResourceTag::Event => interface.destroy_event(self.handle),
            ResourceTag::Mesh => interface.destroy_mesh(self.handle),
            ResourceTag::Accel => interface.destroy_accel(self.handle),
        }
        log::trace!("{}: destroyed {:?} #{}", self.device.name(), self.tag, self.handle);
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("device", &self.device.id())
            .field("tag", &self.tag)
            .field("handle", &self.handle)
            .finish()
    }
}
