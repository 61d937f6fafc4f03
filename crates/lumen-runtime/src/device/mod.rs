//! Device handle and the backend contract.
//!
//! This module is responsible for:
//! - the [`DeviceInterface`] trait every backend implements
//! - the cloneable [`Device`] handle user code creates resources from
//! - owning backend handles through [`Resource`]
//!
//! Typed `create_*` helpers live next to the resource wrappers they return.

mod interface;
mod resource;

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use interface::DeviceInterface;
pub use resource::{Resource, ResourceTag};

use crate::error::{raise, Error, Result};

/// Invalid/unset handle value. Backends never return it from a successful create.
pub const INVALID_HANDLE: u64 = 0;

/// Process-unique identity of a [`Device`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl DeviceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct DeviceShared {
    id: DeviceId,
    interface: Box<dyn DeviceInterface>,
}

/// Cloneable handle to one backend instance.
///
/// Clones share the instance; equality is instance identity.
#[derive(Clone)]
pub struct Device {
    shared: Arc<DeviceShared>,
}

impl Device {
    pub fn new(interface: impl DeviceInterface + 'static) -> Self {
        let id = DeviceId::next();
        log::debug!("device {id}: {}", interface.name());
        Self {
            shared: Arc::new(DeviceShared {
                id,
                interface: Box::new(interface),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> DeviceId {
        self.shared.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.shared.interface.name()
    }

    /// The backend behind this device.
    #[inline]
    pub fn interface(&self) -> &dyn DeviceInterface {
        self.shared.interface.as_ref()
    }

    /// Fails with [`Error::DeviceMismatch`] unless `owner` is this device.
    pub fn ensure_owns(&self, owner: DeviceId) -> Result<()> {
        if owner == self.id() {
            Ok(())
        } else {
            raise(Error::DeviceMismatch {
                expected: self.id(),
                found: owner,
            })
        }
    }
}

impl PartialEq for Device {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({} {})", self.id(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{set_error_policy, ErrorPolicy};
    use crate::testing::MockDevice;

    #[test]
    fn ids_are_unique_per_instance() {
        let a = Device::new(MockDevice::new().0);
        let b = Device::new(MockDevice::new().0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone(), a);
        assert_eq!(a.name(), "mock");
    }

    #[test]
    fn foreign_ids_are_rejected() {
        set_error_policy(ErrorPolicy::Return);
        let a = Device::new(MockDevice::new().0);
        let b = Device::new(MockDevice::new().0);
        assert!(a.ensure_owns(a.id()).is_ok());
        assert_eq!(
            a.ensure_owns(b.id()),
            Err(Error::DeviceMismatch {
                expected: a.id(),
                found: b.id()
            })
        );
    }

    #[test]
    fn invalid_handles_are_refused() {
        set_error_policy(ErrorPolicy::Return);
        let device = Device::new(MockDevice::new().0);
        let r = Resource::create(&device, ResourceTag::Event, |_| Ok(INVALID_HANDLE));
        assert_eq!(r.unwrap_err(), Error::InvalidHandle(ResourceTag::Event));
    }

    #[test]
    fn backend_failures_surface_as_errors() {
        set_error_policy(ErrorPolicy::Return);
        let device = Device::new(MockDevice::new().0);
        let r = Resource::create(&device, ResourceTag::Heap, |_| {
            Err(Error::Backend("out of memory".to_string()))
        });
        assert_eq!(r.unwrap_err(), Error::Backend("out of memory".to_string()));
    }

    #[test]
    fn dropping_a_resource_destroys_it_once() {
        let (mock, log) = MockDevice::new();
        let device = Device::new(mock);
        let r = Resource::create(&device, ResourceTag::Mesh, |i| i.create_mesh()).unwrap();
        let handle = r.handle();
        let moved = r;
        assert_eq!(log.destroyed(ResourceTag::Mesh), Vec::<u64>::new());
        drop(moved);
        assert_eq!(log.destroyed(ResourceTag::Mesh), vec![handle]);
    }
}
