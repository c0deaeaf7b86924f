// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Number of outstanding EAPOL-Key replay counters tracked per station. Bounds how many
/// retransmissions of one message may be answered.
pub const MAX_EAPOL_RETRIES: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Entry {
    counter: u64,
    valid: bool,
}

/// Replay counters of EAPOL-Key frames sent to a station which are still awaiting a reply.
/// Index 0 holds the most recently sent counter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayCounters {
    entries: [Entry; MAX_EAPOL_RETRIES],
}

impl ReplayCounters {
    /// True if `value` echoes a counter that was sent and not yet answered. The scan ends at the
    /// first invalid entry since older entries are unreachable once a newer one was consumed.
    pub fn is_fresh(&self, value: u64) -> bool {
        self.entries.iter().take_while(|e| e.valid).any(|e| e.counter == value)
    }

    /// Invalidates the entry holding `value`, or every entry if `value` is `None`.
    pub fn mark_invalid(&mut self, value: Option<u64>) {
        for entry in self.entries.iter_mut().filter(|e| e.valid) {
            if value.map_or(true, |v| v == entry.counter) {
                entry.valid = false;
            }
        }
    }

    /// Allocates the counter for a frame about to be sent.
    pub fn push_and_validate_on_send(&mut self) -> u64 {
        for i in (1..MAX_EAPOL_RETRIES).rev() {
            self.entries[i] = self.entries[i - 1];
        }
        let newest = &mut self.entries[0];
        newest.counter = newest.counter.wrapping_add(1);
        newest.valid = true;
        newest.counter
    }
}
