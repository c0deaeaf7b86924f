// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::nonce::RandomSource;
use crate::key::gtk::Gtk;
use crate::rsna::{Key, SecAssocUpdate, UpdateSink};
use crate::suite::Cipher;
use crate::Error;
use log::{error, info};

/// States of the authenticator's per-BSS group key state machine.
/// IEEE Std 802.11-2016, 12.7.10.2, Figure 12-53
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    GtkInit,
    SetKeys,
    SetKeysDone,
}

/// The GTK shared by all stations of the BSS and the state of its distribution. Keys alternate
/// between key ids 1 and 2 on every rekey.
#[derive(Debug)]
pub struct GroupKeyContext {
    state: GroupState,
    // Indexed by key id - 1.
    gtk: [Gtk; 2],
    gn: u8,
    gm: u8,
    g_init: bool,
    gtk_rekey: bool,
    pending_stations: u32,
    first_sta_seen: bool,
    cipher: Cipher,
    fan_out: bool,
}

impl GroupKeyContext {
    pub fn new(cipher: Cipher) -> Self {
        GroupKeyContext {
            state: GroupState::GtkInit,
            gtk: [Gtk::empty(), Gtk::empty()],
            gn: 1,
            gm: 2,
            g_init: true,
            gtk_rekey: false,
            pending_stations: 0,
            first_sta_seen: false,
            cipher,
            fan_out: false,
        }
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// Key id of the current GTK.
    pub fn gn(&self) -> u8 {
        self.gn
    }

    pub fn gtk(&self) -> &Gtk {
        &self.gtk[(self.gn - 1) as usize]
    }

    pub fn pending_stations(&self) -> u32 {
        self.pending_stations
    }

    /// Requests a new GTK. Takes effect with the next step.
    pub fn request_rekey(&mut self) {
        self.gtk_rekey = true;
    }

    /// Replaces the GTK generated at startup once the first station shows up. The random source
    /// may not have been seeded well that early.
    pub fn ensure_init(
        &mut self,
        rng: &mut dyn RandomSource,
        sink: &mut UpdateSink,
    ) -> Result<(), Error> {
        if self.first_sta_seen {
            return Ok(());
        }
        let gtk = Gtk::generate(rng, self.cipher.tk_bytes())?;
        self.first_sta_seen = true;
        self.gtk[(self.gn - 1) as usize] = gtk;
        self.install_gtk(sink);
        Ok(())
    }

    /// Returns true once after entering `SetKeys`. The caller must then flag every station with
    /// a completed 4-Way Handshake for a group key update.
    pub fn take_fan_out(&mut self) -> bool {
        std::mem::replace(&mut self.fan_out, false)
    }

    pub fn add_pending_station(&mut self) {
        self.pending_stations += 1;
    }

    /// A station finished or abandoned its group key update.
    pub fn station_done(&mut self) {
        self.pending_stations = self.pending_stations.saturating_sub(1);
    }

    /// Runs one transition. Returns whether the state changed.
    pub fn step(&mut self, rng: &mut dyn RandomSource, sink: &mut UpdateSink) -> bool {
        if self.g_init {
            self.g_init = false;
            self.enter_gtk_init(rng);
            // Reentering the initial state does not count as progress.
            return false;
        }
        match self.state {
            GroupState::GtkInit => {
                self.enter_set_keys_done(sink);
                true
            }
            GroupState::SetKeysDone if self.gtk_rekey => {
                self.enter_set_keys(rng);
                true
            }
            GroupState::SetKeys if self.pending_stations == 0 => {
                self.enter_set_keys_done(sink);
                true
            }
            GroupState::SetKeys if self.gtk_rekey => {
                self.enter_set_keys(rng);
                true
            }
            _ => false,
        }
    }

    fn enter_gtk_init(&mut self, rng: &mut dyn RandomSource) {
        self.state = GroupState::GtkInit;
        self.gtk.iter_mut().for_each(Gtk::clear);
        self.gn = 1;
        self.gm = 2;
        match Gtk::generate(rng, self.cipher.tk_bytes()) {
            Ok(gtk) => self.gtk[0] = gtk,
            Err(e) => error!("failed to generate initial GTK: {}", e),
        }
    }

    fn enter_set_keys(&mut self, rng: &mut dyn RandomSource) {
        self.state = GroupState::SetKeys;
        self.gtk_rekey = false;
        std::mem::swap(&mut self.gn, &mut self.gm);
        self.pending_stations = 0;
        match Gtk::generate(rng, self.cipher.tk_bytes()) {
            Ok(gtk) => {
                self.gtk[(self.gn - 1) as usize] = gtk;
                self.fan_out = true;
                info!("GTK rekey started with key id {}", self.gn);
            }
            Err(e) => {
                error!("failed to generate GTK; keeping key id {}: {}", self.gm, e);
                std::mem::swap(&mut self.gn, &mut self.gm);
            }
        }
    }

    fn enter_set_keys_done(&mut self, sink: &mut UpdateSink) {
        self.state = GroupState::SetKeysDone;
        self.install_gtk(sink);
    }

    fn install_gtk(&self, sink: &mut UpdateSink) {
        let gtk = self.gtk();
        if !gtk.is_empty() {
            sink.push(SecAssocUpdate::Key(Key::Gtk(self.gn, gtk.clone())));
        }
    }
}
