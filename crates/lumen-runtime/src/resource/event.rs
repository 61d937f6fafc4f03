use crate::command::{EventSignalCommand, EventWaitCommand};
use crate::device::{Device, Resource, ResourceTag};
use crate::error::{check, Result};

/// Cross-stream synchronization point.
#[derive(Debug)]
pub struct Event {
    resource: Resource,
}

impl Device {
    pub fn create_event(&self) -> Result<Event> {
        let resource = Resource::create(self, ResourceTag::Event, |i| i.create_event())?;
        Ok(Event { resource })
    }
}

impl Event {
    #[inline]
    pub fn handle(&self) -> u64 {
        self.resource.handle()
    }

    #[inline]
    pub fn device(&self) -> &Device {
        self.resource.device()
    }

    /// Blocks the calling thread until the event is signaled.
    pub fn synchronize(&self) -> Result<()> {
        check(self.device().interface().synchronize_event(self.handle()))
    }

    /// Signal, recorded in a command list.
    #[inline]
    pub fn signal(&self) -> EventSignalCommand {
        EventSignalCommand {
            handle: self.handle(),
        }
    }

    /// Wait, recorded in a command list.
    #[inline]
    pub fn wait(&self) -> EventWaitCommand {
        EventWaitCommand {
            handle: self.handle(),
        }
    }
}
