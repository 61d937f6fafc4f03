//! Deferred device operations.
//!
//! Responsibilities:
//! - describe one recorded operation per [`Command`] variant
//! - collect them, in order, into a [`CommandList`]
//! - let backends execute lists through [`CommandVisitor`]
//!
//! Extending the command set:
//! - add the command struct in the matching submodule
//! - add a variant to [`Command`] and [`CommandKind`]
//! - add a `visit_*` method to [`CommandVisitor`]

mod accel;
mod buffer;
mod event;
mod list;
mod shader;
mod texture;
mod visitor;

pub use accel::{AccelBuildCommand, AccelUpdateCommand, AccelUpdateScope, MeshBuildCommand, MeshUpdateCommand};
pub use buffer::{BufferCopyCommand, BufferDownloadCommand, BufferUploadCommand};
pub use event::{EventSignalCommand, EventWaitCommand};
pub use list::CommandList;
pub use shader::{Argument, ShaderDispatchCommand, MAX_ARGUMENT_COUNT};
pub use texture::{TextureDownloadCommand, TextureUploadCommand};
pub use visitor::CommandVisitor;

/// Discriminant of a [`Command`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CommandKind {
    BufferUpload,
    BufferDownload,
    BufferCopy,
    TextureUpload,
    TextureDownload,
    ShaderDispatch,
    AccelBuild,
    AccelUpdate,
    MeshBuild,
    MeshUpdate,
    EventSignal,
    EventWait,
}

/// A recorded, not yet executed, device operation.
#[derive(Debug)]
pub enum Command {
    BufferUpload(BufferUploadCommand),
    BufferDownload(BufferDownloadCommand),
    BufferCopy(BufferCopyCommand),
    TextureUpload(TextureUploadCommand),
    TextureDownload(TextureDownloadCommand),
    ShaderDispatch(ShaderDispatchCommand),
    AccelBuild(AccelBuildCommand),
    AccelUpdate(AccelUpdateCommand),
    MeshBuild(MeshBuildCommand),
    MeshUpdate(MeshUpdateCommand),
    EventSignal(EventSignalCommand),
    EventWait(EventWaitCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::BufferUpload(_) => CommandKind::BufferUpload,
            Self::BufferDownload(_) => CommandKind::BufferDownload,
            Self::BufferCopy(_) => CommandKind::BufferCopy,
            Self::TextureUpload(_) => CommandKind::TextureUpload,
            Self::TextureDownload(_) => CommandKind::TextureDownload,
            Self::ShaderDispatch(_) => CommandKind::ShaderDispatch,
            Self::AccelBuild(_) => CommandKind::AccelBuild,
            Self::AccelUpdate(_) => CommandKind::AccelUpdate,
            Self::MeshBuild(_) => CommandKind::MeshBuild,
            Self::MeshUpdate(_) => CommandKind::MeshUpdate,
            Self::EventSignal(_) => CommandKind::EventSignal,
            Self::EventWait(_) => CommandKind::EventWait,
        }
    }
}

macro_rules! command_from {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for Command {
                #[inline]
                fn from(cmd: $ty) -> Self {
                    Self::$variant(cmd)
                }
            }
        )+
    };
}

command_from! {
    BufferUpload(BufferUploadCommand),
    BufferDownload(BufferDownloadCommand),
    BufferCopy(BufferCopyCommand),
    TextureUpload(TextureUploadCommand),
    TextureDownload(TextureDownloadCommand),
    ShaderDispatch(ShaderDispatchCommand),
    AccelBuild(AccelBuildCommand),
    AccelUpdate(AccelUpdateCommand),
    MeshBuild(MeshBuildCommand),
    MeshUpdate(MeshUpdateCommand),
    EventSignal(EventSignalCommand),
    EventWait(EventWaitCommand),
}
