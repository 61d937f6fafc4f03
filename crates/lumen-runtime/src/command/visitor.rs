use super::*;

/// Per-kind dispatch over [`Command`]s, used by backends to execute a list.
///
/// Call [`Command::accept`] for each command in order.
pub trait CommandVisitor {
    fn visit_buffer_upload(&mut self, cmd: &BufferUploadCommand);
    fn visit_buffer_download(&mut self, cmd: &BufferDownloadCommand);
    fn visit_buffer_copy(&mut self, cmd: &BufferCopyCommand);
    fn visit_texture_upload(&mut self, cmd: &TextureUploadCommand);
    fn visit_texture_download(&mut self, cmd: &TextureDownloadCommand);
    fn visit_shader_dispatch(&mut self, cmd: &ShaderDispatchCommand);
    fn visit_accel_build(&mut self, cmd: &AccelBuildCommand);
    fn visit_accel_update(&mut self, cmd: &AccelUpdateCommand);
    fn visit_mesh_build(&mut self, cmd: &MeshBuildCommand);
    fn visit_mesh_update(&mut self, cmd: &MeshUpdateCommand);
    fn visit_event_signal(&mut self, cmd: &EventSignalCommand);
    fn visit_event_wait(&mut self, cmd: &EventWaitCommand);
}

impl Command {
    /// Calls the visitor method matching this command's kind.
    pub fn accept(&self, visitor: &mut (impl CommandVisitor + ?Sized)) {
        match self {
            Self::BufferUpload(c) => visitor.visit_buffer_upload(c),
            Self::BufferDownload(c) => visitor.visit_buffer_download(c),
            Self::BufferCopy(c) => visitor.visit_buffer_copy(c),
            Self::TextureUpload(c) => visitor.visit_texture_upload(c),
            Self::TextureDownload(c) => visitor.visit_texture_download(c),
            Self::ShaderDispatch(c) => visitor.visit_shader_dispatch(c),
            Self::AccelBuild(c) => visitor.visit_accel_build(c),
            Self::AccelUpdate(c) => visitor.visit_accel_update(c),
            Self::MeshBuild(c) => visitor.visit_mesh_build(c),
            Self::MeshUpdate(c) => visitor.visit_mesh_update(c),
            Self::EventSignal(c) => visitor.visit_event_signal(c),
            Self::EventWait(c) => visitor.visit_event_wait(c),
        }
    }
}
