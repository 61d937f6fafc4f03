use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use lumen_runtime::command::CommandList;

use crate::event::HostEvent;
use crate::executor::Executor;
use crate::memory::Memory;

/// Unit of work queued on a stream, executed strictly in arrival order.
pub(crate) enum StreamWork {
    Commands(CommandList),
    /// Publish the fence value claimed at enqueue time.
    Signal(Arc<HostEvent>, u64),
    /// Hold the stream until the fence value is published.
    Wait(Arc<HostEvent>, u64),
    /// Reply once everything before it has run.
    Fence(Sender<()>),
}

/// A stream: one worker thread draining a FIFO channel.
///
/// Dropping the stream closes the channel; the worker finishes queued work and
/// is joined.
pub(crate) struct HostStream {
    handle: u64,
    sender: Option<Sender<StreamWork>>,
    worker: Option<JoinHandle<()>>,
}

impl HostStream {
    pub fn spawn(device: &str, handle: u64, memory: Arc<Memory>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let name = device.to_owned();
        let worker = thread::Builder::new()
            .name(format!("{device}-stream-{handle}"))
            .spawn(move || run(&name, handle, &memory, receiver))
            .with_context(|| format!("spawning worker for stream #{handle}"))?;
        Ok(Self {
            handle,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn enqueue(&self, work: StreamWork) -> Result<()> {
        self.sender
            .as_ref()
            .context("stream is shutting down")?
            .send(work)
            .ok()
            .with_context(|| format!("worker of stream #{} has exited", self.handle))
    }

    /// Enqueues a fence. The receiver yields once all earlier work has run.
    pub fn fence(&self) -> Result<Receiver<()>> {
        let (reply, done) = mpsc::channel();
        self.enqueue(StreamWork::Fence(reply))?;
        Ok(done)
    }
}

impl Drop for HostStream {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("worker of stream #{} panicked", self.handle);
            }
        }
    }
}

fn run(device: &str, stream: u64, memory: &Memory, receiver: Receiver<StreamWork>) {
    log::trace!("{device}: stream #{stream} worker started");
    let mut executor = Executor {
        memory,
        device,
        stream,
    };
    for work in receiver {
        match work {
            StreamWork::Commands(commands) => executor.run(&commands),
            StreamWork::Signal(event, value) => event.publish(value),
            StreamWork::Wait(event, value) => event.wait_for(value),
            StreamWork::Fence(reply) => {
                // The waiter may have given up; nothing to do then.
                let _ = reply.send(());
            }
        }
    }
    log::trace!("{device}: stream #{stream} worker stopped");
}
