use anyhow::{ensure, Result};

/// Construction parameters for [`crate::HostDevice`].
///
/// Keep this structure small. Add fields only when a backend behavior really
/// needs to be tuned per instance.
#[derive(Debug, Clone)]
pub struct HostDeviceConfig {
    /// Name reported by the device and used as a log prefix.
    pub name: String,

    /// Largest heap, in bytes, `create_heap` accepts.
    pub max_heap_size: usize,
}

impl Default for HostDeviceConfig {
    fn default() -> Self {
        Self {
            name: "host".to_owned(),
            max_heap_size: 256 << 20,
        }
    }
}

impl HostDeviceConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(!self.name.is_empty(), "device name must not be empty");
        ensure!(self.max_heap_size > 0, "max_heap_size must be non-zero");
        Ok(())
    }
}
