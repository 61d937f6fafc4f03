use super::Event;
use crate::command::{Command, CommandList};
use crate::device::{Device, Resource, ResourceTag};
use crate::error::{check, Result};

/// Ordered queue of device work. Lists dispatched on one stream run in order.
#[derive(Debug)]
pub struct Stream {
    resource: Resource,
}

impl Device {
    pub fn create_stream(&self) -> Result<Stream> {
        let resource = Resource::create(self, ResourceTag::Stream, |i| i.create_stream())?;
        Ok(Stream { resource })
    }
}

impl Stream {
    #[inline]
    pub fn handle(&self) -> u64 {
        self.resource.handle()
    }

    #[inline]
    pub fn device(&self) -> &Device {
        self.resource.device()
    }

    /// Enqueues `commands` and returns without waiting.
    pub fn dispatch(&self, commands: CommandList) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        log::debug!(
            "{}: dispatch {} command(s) on stream #{}",
            self.device().name(),
            commands.len(),
            self.handle()
        );
        check(self.device().interface().dispatch(self.handle(), commands))
    }

    /// Enqueues a single command.
    pub fn submit(&self, cmd: impl Into<Command>) -> Result<()> {
        let mut list = CommandList::with_capacity(1);
        list.append(cmd);
        self.dispatch(list)
    }

    /// Blocks until everything enqueued so far has completed.
    pub fn synchronize(&self) -> Result<()> {
        check(self.device().interface().synchronize_stream(self.handle()))
    }

    /// Signals `event` once work enqueued so far has completed.
    pub fn signal(&self, event: &Event) -> Result<()> {
        self.device().ensure_owns(event.device().id())?;
        check(self.device().interface().signal_event(event.handle(), self.handle()))
    }

    /// Holds later work on this stream until `event` is signaled.
    pub fn wait(&self, event: &Event) -> Result<()> {
        self.device().ensure_owns(event.device().id())?;
        check(self.device().interface().wait_event(event.handle(), self.handle()))
    }
}
