//! Ray-tracing geometry: meshes, acceleration structures and ray/hit records.

mod accel;
mod mesh;

pub use accel::{Accel, AccelState};
pub use mesh::{Mesh, Triangle};

use bytemuck::{Pod, Zeroable};

/// Build-quality preference passed to the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum AccelBuildHint {
    /// Slowest build, fastest traversal.
    #[default]
    FastTrace,
    /// Build so that later refits stay cheap.
    FastUpdate,
    /// Cheapest build, for structures rebuilt every frame.
    FastRebuild,
}

/// Ray as seen by kernels.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct Ray {
    pub origin: [f32; 3],
    pub t_min: f32,
    pub direction: [f32; 3],
    pub t_max: f32,
}

crate::lumen_struct!(Ray {
    origin: [f32; 3],
    t_min: f32,
    direction: [f32; 3],
    t_max: f32,
});

/// Closest-hit record. `instance == u32::MAX` means a miss.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct Hit {
    pub instance: u32,
    pub primitive: u32,
    pub barycentric: [f32; 2],
}

crate::lumen_struct!(Hit {
    instance: u32,
    primitive: u32,
    barycentric: [f32; 2],
});

impl Hit {
    #[inline]
    pub fn is_miss(&self) -> bool {
        self.instance == u32::MAX
    }
}
