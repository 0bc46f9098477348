// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fire-once, broadcast-to-all-waiters latch.
//!
//! [`Buffer`](crate::Buffer) uses two of these ([`tail_ready` and
//! `complete_event`](crate::buffer)): any number of threads may call
//! [`OneShotEvent::wait`] before or after [`OneShotEvent::fire`] is called.
//! Once fired, the event stays fired forever; every future and in-progress
//! wait returns immediately. There is no re-arm operation; a fresh
//! [`OneShotEvent`] is created instead, which is exactly what
//! [`Buffer::bind`](crate::Buffer::bind) does on every rebind.

use std::sync::{Condvar, Mutex};

#[derive(Default)]
pub(crate) struct OneShotEvent {
    fired: Mutex<bool>,
    condvar: Condvar,
}

impl OneShotEvent {
    pub(crate) fn new() -> Self {
        OneShotEvent::default()
    }

    /// Fires the event, waking every current and future waiter. Idempotent:
    /// firing an already-fired event is a no-op.
    pub(crate) fn fire(&self) {
        let mut fired = self.fired.lock().unwrap();
        if !*fired {
            *fired = true;
            self.condvar.notify_all();
        }
    }

    /// Blocks the calling thread until [`fire`](Self::fire) has been called,
    /// at least once, on this event. Returns immediately if it already has.
    pub(crate) fn wait(&self) {
        let mut fired = self.fired.lock().unwrap();
        while !*fired {
            fired = self.condvar.wait(fired).unwrap();
        }
    }

    /// Non-blocking check of whether the event has fired.
    pub(crate) fn is_set(&self) -> bool {
        *self.fired.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_immediately_once_fired() {
        let ev = OneShotEvent::new();
        ev.fire();
        ev.wait();
        assert!(ev.is_set());
    }

    #[test]
    fn fire_is_idempotent() {
        let ev = OneShotEvent::new();
        ev.fire();
        ev.fire();
        assert!(ev.is_set());
    }

    #[test]
    fn waiters_unblock_when_fired_from_another_thread() {
        let ev = Arc::new(OneShotEvent::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let ev = ev.clone();
                thread::spawn(move || ev.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        ev.fire();

        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
