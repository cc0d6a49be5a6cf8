/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Event multiplexing: several parts of a case can read the runtime's event
//! stream without stealing events from each other.

use xrconform_api::Event;
use xrconform_api::EventKind;
use xrconform_api::RuntimeAPI;

use std::sync::Arc;
use std::sync::Mutex;

/// Every event polled from one runtime, in order.
pub struct EventQueue {
    runtime: Arc<dyn RuntimeAPI>,
    events: Mutex<Vec<Event>>,
}

impl EventQueue {
    pub fn new(runtime: Arc<dyn RuntimeAPI>) -> Arc<EventQueue> {
        Arc::new(EventQueue {
            runtime,
            events: Mutex::new(Vec::new()),
        })
    }

    fn read_events(&self) -> usize {
        let mut events = self.events.lock().unwrap();
        while let Some(event) = self.runtime.poll_event() {
            events.push(event);
        }
        events.len()
    }

    fn get(&self, index: usize) -> Option<Event> {
        self.events.lock().unwrap().get(index).copied()
    }
}

/// Reads the events added to an `EventQueue` after the reader was created.
pub struct EventReader {
    queue: Arc<EventQueue>,
    next: usize,
}

impl EventReader {
    pub fn new(queue: Arc<EventQueue>) -> EventReader {
        let next = queue.events.lock().unwrap().len();
        EventReader { queue, next }
    }

    pub fn try_read_next(&mut self) -> Option<Event> {
        if self.queue.read_events() <= self.next {
            return None;
        }
        let event = self.queue.get(self.next);
        self.next += 1;
        event
    }

    /// Skips events until one of the given kind, consuming it.
    pub fn try_read_until(&mut self, kind: EventKind) -> Option<Event> {
        while let Some(event) = self.try_read_next() {
            if event.kind() == kind {
                return Some(event);
            }
        }
        None
    }

    pub fn read_until_empty(&mut self) {
        while self.try_read_next().is_some() {}
    }
}
