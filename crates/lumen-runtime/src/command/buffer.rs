use crate::resource::Readback;

/// Host → buffer copy. The bytes are captured when the command is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferUploadCommand {
    pub handle: u64,
    pub offset_bytes: usize,
    pub data: Vec<u8>,
}

/// Buffer → host copy into a [`Readback`].
#[derive(Debug, Clone)]
pub struct BufferDownloadCommand {
    pub handle: u64,
    pub offset_bytes: usize,
    pub size_bytes: usize,
    pub target: Readback,
}

/// Buffer → buffer copy on the same device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferCopyCommand {
    pub src_handle: u64,
    pub src_offset_bytes: usize,
    pub dst_handle: u64,
    pub dst_offset_bytes: usize,
    pub size_bytes: usize,
}
