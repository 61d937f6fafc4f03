/// Signals an event once every earlier command on the stream has completed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EventSignalCommand {
    pub handle: u64,
}

/// Holds back later commands on the stream until the event is signaled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EventWaitCommand {
    pub handle: u64,
}
