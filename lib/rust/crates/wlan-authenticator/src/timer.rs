// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::station::StationHandle;
use std::collections::HashMap;
use std::time::Duration;

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
pub struct EventId(pub u64);

/// A scheduler to schedule and cancel timeouts.
pub trait Scheduler {
    /// Requests to schedule an event. Returns a unique ID used to cancel the scheduled event.
    /// Expiry is reported back through `Authenticator::on_timeout`.
    fn schedule(&mut self, after: Duration) -> EventId;
    /// Cancels a previously scheduled event.
    fn cancel(&mut self, id: EventId);
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum TimeoutEvent {
    /// EAPOL-Key retransmission for either of the station's handshakes.
    EapolKey(StationHandle),
    PtkRekey(StationHandle),
    GroupRekey,
}

/// A timer to schedule and cancel timeouts and retrieve triggered events.
pub struct Timer<E> {
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> Timer<E> {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self { events: HashMap::default(), scheduler }
    }

    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_event(&mut self, after: Duration, event: E) -> EventId {
        let event_id = self.scheduler.schedule(after);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        if self.events.remove(&event_id).is_some() {
            self.scheduler.cancel(event_id);
        }
    }

    pub fn cancel_all(&mut self) {
        for (event_id, _) in self.events.drain() {
            self.scheduler.cancel(event_id);
        }
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
pub use fake::FakeScheduler;
