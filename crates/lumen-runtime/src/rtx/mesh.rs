use bytemuck::{Pod, Zeroable};

use super::AccelBuildHint;
use crate::command::{MeshBuildCommand, MeshUpdateCommand};
use crate::device::{Device, Resource, ResourceTag};
use crate::error::{raise, Error, Result};
use crate::resource::BufferView;

/// Three vertex indices.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Pod, Zeroable)]
pub struct Triangle {
    pub i0: u32,
    pub i1: u32,
    pub i2: u32,
}

crate::lumen_struct!(Triangle { i0: u32, i1: u32, i2: u32 });

/// Bottom-level triangle geometry referenced by [`super::Accel`] instances.
#[derive(Debug)]
pub struct Mesh {
    resource: Resource,
    triangle_count: Option<usize>,
}

impl Device {
    pub fn create_mesh(&self) -> Result<Mesh> {
        let resource = Resource::create(self, ResourceTag::Mesh, |i| i.create_mesh())?;
        Ok(Mesh {
            resource,
            triangle_count: None,
        })
    }
}

impl Mesh {
    #[inline]
    pub fn handle(&self) -> u64 {
        self.resource.handle()
    }

    #[inline]
    pub fn device(&self) -> &Device {
        self.resource.device()
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.triangle_count.is_some()
    }

    /// Records a build over `vertices` indexed by `triangles`.
    pub fn build<V: Pod>(
        &mut self,
        hint: AccelBuildHint,
        vertices: BufferView<'_, V>,
        triangles: BufferView<'_, Triangle>,
    ) -> Result<MeshBuildCommand> {
        self.device().ensure_owns(vertices.device().id())?;
        self.device().ensure_owns(triangles.device().id())?;
        self.triangle_count = Some(triangles.len());
        Ok(MeshBuildCommand {
            handle: self.handle(),
            hint,
            vertex_buffer: vertices.handle(),
            vertex_offset_bytes: vertices.offset_bytes(),
            vertex_stride: size_of::<V>(),
            vertex_count: vertices.len(),
            triangle_buffer: triangles.handle(),
            triangle_offset_bytes: triangles.offset_bytes(),
            triangle_count: triangles.len(),
        })
    }

    /// Records a refit after vertices moved in place. Requires a prior build.
    pub fn update(&self) -> Result<MeshUpdateCommand> {
        if !self.is_built() {
            return raise(Error::NotBuilt {
                tag: ResourceTag::Mesh,
                handle: self.handle(),
            });
        }
        Ok(MeshUpdateCommand {
            handle: self.handle(),
        })
    }
}
