use core::ops::Range;

use glam::Mat4;

use crate::rtx::AccelBuildHint;

/// Full (re)build of a top-level acceleration structure.
///
/// One instance per mesh handle; `transforms[i]` places `mesh_handles[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccelBuildCommand {
    pub handle: u64,
    pub hint: AccelBuildHint,
    pub mesh_handles: Vec<u64>,
    pub transforms: Vec<Mat4>,
}

/// Which instances an [`AccelUpdateCommand`] touches.
#[derive(Debug, Clone, PartialEq)]
pub enum AccelUpdateScope {
    /// Refit every instance from its stored transform.
    All,
    /// Replace `transforms.len()` transforms starting at instance `first`.
    Range { first: usize, transforms: Vec<Mat4> },
}

/// Topology-preserving refit of a built acceleration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct AccelUpdateCommand {
    pub handle: u64,
    pub scope: AccelUpdateScope,
}

impl AccelUpdateCommand {
    /// Instance range replaced by this update, `None` for a full refit.
    pub fn affected_instances(&self) -> Option<Range<usize>> {
        match &self.scope {
            AccelUpdateScope::All => None,
            AccelUpdateScope::Range { first, transforms } => Some(*first..*first + transforms.len()),
        }
    }
}

/// Builds a triangle mesh (bottom-level structure) from vertex and index buffers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MeshBuildCommand {
    pub handle: u64,
    pub hint: AccelBuildHint,
    pub vertex_buffer: u64,
    pub vertex_offset_bytes: usize,
    pub vertex_stride: usize,
    pub vertex_count: usize,
    pub triangle_buffer: u64,
    pub triangle_offset_bytes: usize,
    pub triangle_count: usize,
}

/// Refits a built mesh after its vertex buffer changed in place.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MeshUpdateCommand {
    pub handle: u64,
}
