use anyhow::{bail, ensure, Context, Result};
use lumen_runtime::command::*;

use crate::kernel::DispatchContext;
use crate::memory::Memory;

/// Runs commands against host memory on a stream worker.
///
/// Failures are logged and the command skipped; the stream keeps going.
/// Event commands never get here: dispatch turns them into stream work.
pub(crate) struct Executor<'a> {
    pub memory: &'a Memory,
    pub device: &'a str,
    pub stream: u64,
}

impl Executor<'_> {
    pub fn run(&mut self, commands: &CommandList) {
        for cmd in commands {
            cmd.accept(self);
        }
    }

    fn report(&self, kind: CommandKind, result: Result<()>) {
        if let Err(err) = result {
            log::error!(
                "{}: stream #{}: {kind:?} failed: {err:#}",
                self.device,
                self.stream
            );
        }
    }

    fn buffer_upload(&self, cmd: &BufferUploadCommand) -> Result<()> {
        let mut buffers = self.memory.buffers.lock();
        let buffer = buffers
            .get_mut(cmd.handle)
            .with_context(|| format!("unknown buffer #{}", cmd.handle))?;
        let end = cmd.offset_bytes + cmd.data.len();
        let target = buffer
            .bytes
            .get_mut(cmd.offset_bytes..end)
            .with_context(|| format!("upload to {}..{end} overflows buffer #{}", cmd.offset_bytes, cmd.handle))?;
        target.copy_from_slice(&cmd.data);
        Ok(())
    }

    fn buffer_download(&self, cmd: &BufferDownloadCommand) -> Result<()> {
        let buffers = self.memory.buffers.lock();
        let buffer = buffers
            .get(cmd.handle)
            .with_context(|| format!("unknown buffer #{}", cmd.handle))?;
        let end = cmd.offset_bytes + cmd.size_bytes;
        let source = buffer
            .bytes
            .get(cmd.offset_bytes..end)
            .with_context(|| format!("download of {}..{end} overflows buffer #{}", cmd.offset_bytes, cmd.handle))?;
        cmd.target.write(source);
        Ok(())
    }

    fn buffer_copy(&self, cmd: &BufferCopyCommand) -> Result<()> {
        let mut buffers = self.memory.buffers.lock();
        let source = buffers
            .get(cmd.src_handle)
            .with_context(|| format!("unknown buffer #{}", cmd.src_handle))?
            .bytes
            .get(cmd.src_offset_bytes..cmd.src_offset_bytes + cmd.size_bytes)
            .context("copy source out of range")?
            .to_vec();
        let target = buffers
            .get_mut(cmd.dst_handle)
            .with_context(|| format!("unknown buffer #{}", cmd.dst_handle))?
            .bytes
            .get_mut(cmd.dst_offset_bytes..cmd.dst_offset_bytes + cmd.size_bytes)
            .context("copy destination out of range")?;
        target.copy_from_slice(&source);
        Ok(())
    }

    fn texture_upload(&self, cmd: &TextureUploadCommand) -> Result<()> {
        ensure!(
            cmd.region_bytes() == Some(cmd.data.len()),
            "upload carries {} byte(s) for a region of {} texel(s)",
            cmd.data.len(),
            cmd.size
        );
        let mut textures = self.memory.textures.lock();
        let texture = textures
            .get_mut(cmd.handle)
            .with_context(|| format!("unknown texture #{}", cmd.handle))?;
        let rows = texture.rows(cmd.storage, cmd.level, cmd.offset, cmd.size)?;
        let level = &mut texture.levels[cmd.level as usize];
        let mut src = 0;
        for row in rows {
            let len = row.len();
            level[row].copy_from_slice(&cmd.data[src..src + len]);
            src += len;
        }
        Ok(())
    }

    fn texture_download(&self, cmd: &TextureDownloadCommand) -> Result<()> {
        let textures = self.memory.textures.lock();
        let texture = textures
            .get(cmd.handle)
            .with_context(|| format!("unknown texture #{}", cmd.handle))?;
        let rows = texture.rows(cmd.storage, cmd.level, cmd.offset, cmd.size)?;
        let level = &texture.levels[cmd.level as usize];
        let mut pixels = Vec::new();
        for row in rows {
            pixels.extend_from_slice(&level[row]);
        }
        cmd.target.write(&pixels);
        Ok(())
    }

    fn shader_dispatch(&self, cmd: &ShaderDispatchCommand) -> Result<()> {
        ensure!(
            self.memory.shaders.lock().get(cmd.handle).is_some(),
            "unknown shader #{}",
            cmd.handle
        );
        match self.memory.kernels.get(&cmd.kernel) {
            Some(body) => {
                log::trace!(
                    "{}: stream #{}: shader #{} over {}",
                    self.device,
                    self.stream,
                    cmd.handle,
                    cmd.dispatch_size
                );
                body(&DispatchContext::new(cmd, self.memory))
                    .with_context(|| format!("host body of shader #{}", cmd.handle))
            }
            None => {
                log::debug!(
                    "{}: shader #{} has no host body, dispatch skipped",
                    self.device,
                    cmd.handle
                );
                Ok(())
            }
        }
    }

    fn accel_build(&self, cmd: &AccelBuildCommand) -> Result<()> {
        {
            let meshes = self.memory.meshes.lock();
            for &mesh in &cmd.mesh_handles {
                ensure!(meshes.get(mesh).is_some(), "unknown mesh #{mesh}");
            }
        }
        let mut accels = self.memory.accels.lock();
        let accel = accels
            .get_mut(cmd.handle)
            .with_context(|| format!("unknown accel #{}", cmd.handle))?;
        accel.meshes = cmd.mesh_handles.clone();
        accel.transforms = cmd.transforms.clone();
        accel.refits = 0;
        Ok(())
    }

    fn accel_update(&self, cmd: &AccelUpdateCommand) -> Result<()> {
        let mut accels = self.memory.accels.lock();
        let accel = accels
            .get_mut(cmd.handle)
            .with_context(|| format!("unknown accel #{}", cmd.handle))?;
        if let AccelUpdateScope::Range { first, transforms } = &cmd.scope {
            let target = accel
                .transforms
                .get_mut(*first..*first + transforms.len())
                .with_context(|| format!("refit range exceeds accel #{}", cmd.handle))?;
            target.copy_from_slice(transforms);
        }
        accel.refits += 1;
        Ok(())
    }

    fn mesh_build(&self, cmd: &MeshBuildCommand) -> Result<()> {
        {
            let buffers = self.memory.buffers.lock();
            let vertices = buffers
                .get(cmd.vertex_buffer)
                .with_context(|| format!("unknown vertex buffer #{}", cmd.vertex_buffer))?;
            ensure!(
                cmd.vertex_offset_bytes + cmd.vertex_stride * cmd.vertex_count <= vertices.bytes.len(),
                "vertices overflow buffer #{}",
                cmd.vertex_buffer
            );
            ensure!(
                buffers.get(cmd.triangle_buffer).is_some(),
                "unknown triangle buffer #{}",
                cmd.triangle_buffer
            );
        }
        let mut meshes = self.memory.meshes.lock();
        let mesh = meshes
            .get_mut(cmd.handle)
            .with_context(|| format!("unknown mesh #{}", cmd.handle))?;
        mesh.vertex_count = cmd.vertex_count;
        mesh.triangle_count = cmd.triangle_count;
        mesh.updates = 0;
        Ok(())
    }

    fn mesh_update(&self, cmd: &MeshUpdateCommand) -> Result<()> {
        let mut meshes = self.memory.meshes.lock();
        let mesh = meshes
            .get_mut(cmd.handle)
            .with_context(|| format!("unknown mesh #{}", cmd.handle))?;
        mesh.updates += 1;
        Ok(())
    }

    fn event_signal(&self, cmd: &EventSignalCommand) -> Result<()> {
        bail!("signal of event #{} reached a worker unscheduled", cmd.handle)
    }

    fn event_wait(&self, cmd: &EventWaitCommand) -> Result<()> {
        bail!("wait on event #{} reached a worker unscheduled", cmd.handle)
    }
}

impl CommandVisitor for Executor<'_> {
    fn visit_buffer_upload(&mut self, cmd: &BufferUploadCommand) {
        self.report(CommandKind::BufferUpload, self.buffer_upload(cmd));
    }

    fn visit_buffer_download(&mut self, cmd: &BufferDownloadCommand) {
        self.report(CommandKind::BufferDownload, self.buffer_download(cmd));
    }

    fn visit_buffer_copy(&mut self, cmd: &BufferCopyCommand) {
        self.report(CommandKind::BufferCopy, self.buffer_copy(cmd));
    }

    fn visit_texture_upload(&mut self, cmd: &TextureUploadCommand) {
        self.report(CommandKind::TextureUpload, self.texture_upload(cmd));
    }

    fn visit_texture_download(&mut self, cmd: &TextureDownloadCommand) {
        self.report(CommandKind::TextureDownload, self.texture_download(cmd));
    }

    fn visit_shader_dispatch(&mut self, cmd: &ShaderDispatchCommand) {
        self.report(CommandKind::ShaderDispatch, self.shader_dispatch(cmd));
    }

    fn visit_accel_build(&mut self, cmd: &AccelBuildCommand) {
        self.report(CommandKind::AccelBuild, self.accel_build(cmd));
    }

    fn visit_accel_update(&mut self, cmd: &AccelUpdateCommand) {
        self.report(CommandKind::AccelUpdate, self.accel_update(cmd));
    }

    fn visit_mesh_build(&mut self, cmd: &MeshBuildCommand) {
        self.report(CommandKind::MeshBuild, self.mesh_build(cmd));
    }

    fn visit_mesh_update(&mut self, cmd: &MeshUpdateCommand) {
        self.report(CommandKind::MeshUpdate, self.mesh_update(cmd));
    }

    fn visit_event_signal(&mut self, cmd: &EventSignalCommand) {
        self.report(CommandKind::EventSignal, self.event_signal(cmd));
    }

    fn visit_event_wait(&mut self, cmd: &EventWaitCommand) {
        self.report(CommandKind::EventWait, self.event_wait(cmd));
    }
}
