use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Fence {
    /// Value of the most recently enqueued signal.
    enqueued: u64,
    /// Highest value a stream has reached.
    reached: u64,
}

/// Monotonic fence counter shared between the device and stream workers.
///
/// Each signal claims the next value when it is enqueued and publishes it when
/// the signaling stream gets there. Waits target the value claimed by the most
/// recent signal at the time they are enqueued; waiting on a never-signaled
/// event returns immediately.
#[derive(Debug, Default)]
pub(crate) struct HostEvent {
    fence: Mutex<Fence>,
    cond: Condvar,
}

impl HostEvent {
    /// Claims the value a new signal will publish.
    pub fn enqueue_signal(&self) -> u64 {
        let mut fence = self.fence.lock();
        fence.enqueued += 1;
        fence.enqueued
    }

    /// Value a wait enqueued now has to reach.
    pub fn wait_target(&self) -> u64 {
        self.fence.lock().enqueued
    }

    pub fn publish(&self, value: u64) {
        let mut fence = self.fence.lock();
        if value > fence.reached {
            fence.reached = value;
            self.cond.notify_all();
        }
    }

    /// Blocks until `value` has been published.
    pub fn wait_for(&self, value: u64) {
        let mut fence = self.fence.lock();
        while fence.reached < value {
            self.cond.wait(&mut fence);
        }
    }

    #[cfg(test)]
    pub fn reached(&self) -> u64 {
        self.fence.lock().reached
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn waits_resume_once_the_claimed_value_is_published() {
        let event = Arc::new(HostEvent::default());
        // nothing signaled yet
        event.wait_for(event.wait_target());

        let first = event.enqueue_signal();
        let second = event.enqueue_signal();
        assert_eq!((first, second), (1, 2));

        let waiter = {
            let event = Arc::clone(&event);
            let target = event.wait_target();
            thread::spawn(move || event.wait_for(target))
        };
        event.publish(first);
        event.publish(second);
        waiter.join().unwrap();

        event.publish(first);
        assert_eq!(event.reached(), second);
    }
}
