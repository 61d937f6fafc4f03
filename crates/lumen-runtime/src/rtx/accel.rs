//! Top-level acceleration structure and its build/refit protocol.
//!
//! An [`Accel`] starts `Unbuilt`. `build` records the expensive full build and
//! moves it to `Built`; `refit`/`refit_range` record cheap transform updates and
//! are only legal once built. A later `build` replaces the instance set.

use glam::Mat4;

use super::{AccelBuildHint, Mesh};
use crate::command::{AccelBuildCommand, AccelUpdateCommand, AccelUpdateScope};
use crate::device::{Device, Resource, ResourceTag};
use crate::error::{raise, Error, Result};

/// Build state of an [`Accel`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum AccelState {
    #[default]
    Unbuilt,
    Built { instance_count: usize },
}

#[derive(Debug)]
pub struct Accel {
    resource: Resource,
    state: AccelState,
}

impl Device {
    pub fn create_accel(&self) -> Result<Accel> {
        let resource = Resource::create(self, ResourceTag::Accel, |i| i.create_accel())?;
        Ok(Accel {
            resource,
            state: AccelState::Unbuilt,
        })
    }
}

impl Accel {
    #[inline]
    pub fn handle(&self) -> u64 {
        self.resource.handle()
    }

    #[inline]
    pub fn device(&self) -> &Device {
        self.resource.device()
    }

    #[inline]
    pub fn state(&self) -> AccelState {
        self.state
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        matches!(self.state, AccelState::Built { .. })
    }

    /// Instances of the last build; 0 before the first build.
    #[inline]
    pub fn instance_count(&self) -> usize {
        match self.state {
            AccelState::Unbuilt => 0,
            AccelState::Built { instance_count } => instance_count,
        }
    }

    /// Records a full build with one instance per mesh, placed by `transforms`.
    ///
    /// The structure counts as built from here on; the command still has to be
    /// dispatched.
    pub fn build(&mut self, hint: AccelBuildHint, meshes: &[&Mesh], transforms: &[Mat4]) -> Result<AccelBuildCommand> {
        if meshes.len() != transforms.len() {
            return raise(Error::ArgumentMismatch(format!(
                "{} mesh(es) with {} transform(s)",
                meshes.len(),
                transforms.len()
            )));
        }
        for mesh in meshes {
            self.device().ensure_owns(mesh.device().id())?;
        }
        self.state = AccelState::Built {
            instance_count: meshes.len(),
        };
        log::trace!("accel #{}: build of {} instance(s) ({hint:?})", self.handle(), meshes.len());
        Ok(AccelBuildCommand {
            handle: self.handle(),
            hint,
            mesh_handles: meshes.iter().map(|m| m.handle()).collect(),
            transforms: transforms.to_vec(),
        })
    }

    /// Records a refit of every instance from its stored transform.
    pub fn refit(&self) -> Result<AccelUpdateCommand> {
        self.ensure_built()?;
        Ok(AccelUpdateCommand {
            handle: self.handle(),
            scope: AccelUpdateScope::All,
        })
    }

    /// Records new transforms for instances `first..first + transforms.len()`.
    ///
    /// `transforms` is copied into the command.
    pub fn refit_range(&self, first: usize, transforms: &[Mat4]) -> Result<AccelUpdateCommand> {
        self.ensure_built()?;
        let count = self.instance_count();
        if first.checked_add(transforms.len()).is_none_or(|end| end > count) {
            return raise(Error::OutOfRange(format!(
                "instances {first}..{} of an accel with {count}",
                first.saturating_add(transforms.len())
            )));
        }
        Ok(AccelUpdateCommand {
            handle: self.handle(),
            scope: AccelUpdateScope::Range {
                first,
                transforms: transforms.to_vec(),
            },
        })
    }

    fn ensure_built(&self) -> Result<()> {
        if self.is_built() {
            Ok(())
        } else {
            raise(Error::NotBuilt {
                tag: ResourceTag::Accel,
                handle: self.handle(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::error::{set_error_policy, ErrorPolicy};
    use crate::testing::mock_device;

    fn two_meshes(device: &Device) -> (Mesh, Mesh) {
        (device.create_mesh().unwrap(), device.create_mesh().unwrap())
    }

    #[test]
    fn refit_before_build_is_reported() {
        set_error_policy(ErrorPolicy::Return);
        let (device, _) = mock_device();
        let accel = device.create_accel().unwrap();
        let expected = Error::NotBuilt {
            tag: ResourceTag::Accel,
            handle: accel.handle(),
        };
        assert_eq!(accel.refit().unwrap_err(), expected);
        assert_eq!(accel.refit_range(0, &[Mat4::IDENTITY]).unwrap_err(), expected);
        assert_eq!(accel.state(), AccelState::Unbuilt);
    }

    #[test]
    fn refit_range_is_scoped_to_the_given_instances() {
        let (device, _) = mock_device();
        let (m0, m1) = two_meshes(&device);
        let mut accel = device.create_accel().unwrap();

        let build = accel
            .build(
                AccelBuildHint::FastUpdate,
                &[&m0, &m1],
                &[Mat4::IDENTITY, Mat4::IDENTITY],
            )
            .unwrap();
        assert_eq!(build.mesh_handles, vec![m0.handle(), m1.handle()]);

        let moved = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let update = accel.refit_range(1, &[moved]).unwrap();
        assert_eq!(update.affected_instances(), Some(1..2));
        assert_eq!(
            update.scope,
            AccelUpdateScope::Range {
                first: 1,
                transforms: vec![moved]
            }
        );
        assert!(accel.is_built());

        let full = accel.refit().unwrap();
        assert_eq!(full.affected_instances(), None);
        assert_eq!(accel.state(), AccelState::Built { instance_count: 2 });
    }

    #[test]
    fn rebuild_resets_the_instance_set() {
        set_error_policy(ErrorPolicy::Return);
        let (device, _) = mock_device();
        let (m0, m1) = two_meshes(&device);
        let mut accel = device.create_accel().unwrap();
        accel
            .build(AccelBuildHint::FastTrace, &[&m0, &m1], &[Mat4::IDENTITY; 2])
            .unwrap();
        accel
            .build(AccelBuildHint::FastRebuild, &[&m1], &[Mat4::IDENTITY])
            .unwrap();
        assert_eq!(accel.instance_count(), 1);
        assert!(matches!(
            accel.refit_range(1, &[Mat4::IDENTITY]),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn build_rejects_mismatched_inputs() {
        set_error_policy(ErrorPolicy::Return);
        let (device, _) = mock_device();
        let (other, _) = mock_device();
        let m0 = device.create_mesh().unwrap();
        let foreign = other.create_mesh().unwrap();
        let mut accel = device.create_accel().unwrap();

        assert!(matches!(
            accel.build(AccelBuildHint::FastTrace, &[&m0], &[]),
            Err(Error::ArgumentMismatch(_))
        ));
        assert!(matches!(
            accel.build(AccelBuildHint::FastTrace, &[&foreign], &[Mat4::IDENTITY]),
            Err(Error::DeviceMismatch { .. })
        ));
        assert!(!accel.is_built());
    }
}
