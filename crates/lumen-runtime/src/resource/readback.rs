use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

/// Host-side destination of a download command.
///
/// Clones share the same storage. Contents are valid once the stream the
/// download was dispatched on has been synchronized.
#[derive(Debug, Clone, Default)]
pub struct Readback {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Readback {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents. Called by backends when a download completes.
    pub fn write(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock();
        bytes.clear();
        bytes.extend_from_slice(data);
    }

    /// Copy of the downloaded bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Downloaded bytes reinterpreted as `T`s. Trailing partial elements are dropped.
    pub fn to_vec<T: Pod>(&self) -> Vec<T> {
        self.bytes
            .lock()
            .chunks_exact(size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
