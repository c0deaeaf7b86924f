// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::config::Config;
use crate::crypto_utils::nonce::RandomSource;
use crate::device::{Driver, ReasonCode, Transport};
use crate::group_key::{GroupKeyContext, GroupState};
use crate::psk::PskProvider;
use crate::rsna::{Key, SecAssocUpdate, UpdateSink};
use crate::station::{PtkGroupState, PtkState, Received, Station, StationHandle, StepEnv};
use crate::timer::{EventId, Scheduler, TimeoutEvent, Timer};
use crate::{Error, MacAddr, MacFmt};
use log::{debug, error, info, warn};
use slab::Slab;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Pending work of the dispatch loop. Removing a station is queued behind the work already
/// pending for it so a station is never dropped halfway through a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Work {
    Station(StationHandle),
    Remove(StationHandle),
}

#[derive(Debug, Clone, Copy)]
enum StationTimer {
    EapolKey,
    PtkRekey,
}

/// The RSNA Authenticator of one BSS. Owns every associated station's state machines and the
/// BSS's group key context.
pub struct Authenticator {
    addr: MacAddr,
    cfg: Config,
    group: GroupKeyContext,
    stations: Slab<Station>,
    by_addr: HashMap<MacAddr, StationHandle>,
    next_generation: u64,
    transport: Box<dyn Transport>,
    driver: Box<dyn Driver>,
    psk: Box<dyn PskProvider>,
    rng: Box<dyn RandomSource>,
    timer: Timer<TimeoutEvent>,
    group_rekey_timer: Option<EventId>,
    work: VecDeque<Work>,
}

impl Authenticator {
    /// Creates the Authenticator for the BSS with address `addr` and installs its initial GTK.
    pub fn new(
        addr: MacAddr,
        cfg: Config,
        transport: Box<dyn Transport>,
        driver: Box<dyn Driver>,
        psk: Box<dyn PskProvider>,
        rng: Box<dyn RandomSource>,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self, Error> {
        cfg.validate()?;
        let group = GroupKeyContext::new(cfg.group_cipher);
        let mut auth = Authenticator {
            addr,
            cfg,
            group,
            stations: Slab::new(),
            by_addr: HashMap::new(),
            next_generation: 0,
            transport,
            driver,
            psk,
            rng,
            timer: Timer::new(scheduler),
            group_rekey_timer: None,
            work: VecDeque::new(),
        };

        let mut updates = vec![];
        auth.group.step(&mut *auth.rng, &mut updates);
        auth.apply_group_updates(updates);
        auth.run();
        auth.arm_group_rekey_timer();
        Ok(auth)
    }

    pub fn station_associated(&mut self, sta: MacAddr) {
        self.station_associated_with_rsne(sta, None)
    }

    /// Starts the 4-Way Handshake with a station which (re)associated. If `rsne` holds the RSNE
    /// of its association request, message 2 must carry the same one.
    pub fn station_associated_with_rsne(&mut self, sta: MacAddr, rsne: Option<Vec<u8>>) {
        if let Some(handle) = self.by_addr.get(&sta).copied() {
            info!("{} reassociated", MacFmt(&sta));
            let mut updates = vec![];
            if let Some(station) = self.stations.get_mut(handle.index) {
                station.set_assoc_rsne(rsne);
                station.on_reassociation(&mut self.group, &mut updates);
            }
            self.apply_station_updates(handle, updates);
            self.work.push_back(Work::Station(handle));
            self.run();
            return;
        }

        let entry = self.stations.vacant_entry();
        let handle = StationHandle { index: entry.key(), generation: self.next_generation };
        self.next_generation += 1;
        entry.insert(Station::new(sta, handle, rsne));
        self.by_addr.insert(sta, handle);
        info!("{} associated", MacFmt(&sta));

        if let Some(station) = self.station_mut(handle) {
            station.inputs.init = true;
        }
        self.step_station(handle);
        if let Some(station) = self.station_mut(handle) {
            station.inputs.init = false;
            station.inputs.authentication_request = true;
        }
        self.work.push_back(Work::Station(handle));
        self.run();
    }

    /// Tears down all state of a station which left the BSS. Unknown stations are ignored.
    pub fn station_deauthenticated(&mut self, sta: &MacAddr) {
        let handle = match self.by_addr.get(sta) {
            Some(handle) => *handle,
            None => {
                debug!("ignoring deauthentication of unknown station {}", MacFmt(sta));
                return;
            }
        };
        if let Some(station) = self.station_mut(handle) {
            station.inputs.deauthentication_request = true;
        }
        self.work.push_back(Work::Station(handle));
        self.work.push_back(Work::Remove(handle));
        self.run();
    }

    /// Processes an EAPOL-Key frame received from a station. Frames which fail validation are
    /// dropped without any response.
    pub fn receive(&mut self, sta: &MacAddr, frame: &[u8]) {
        let handle = match self.by_addr.get(sta) {
            Some(handle) => *handle,
            None => {
                debug!("dropping EAPOL-Key frame from unknown station {}", MacFmt(sta));
                return;
            }
        };
        let mut updates = vec![];
        let result = match self.stations.get_mut(handle.index) {
            Some(station) => station.on_eapol_key_frame(frame, &self.cfg, &mut updates),
            None => return,
        };
        self.apply_station_updates(handle, updates);
        match result {
            Ok(Received::Frame) => {}
            Ok(Received::GroupRekeyRequest) => self.group.request_rekey(),
            Err(e) => {
                debug!("dropping EAPOL-Key frame from {}: {}", MacFmt(sta), e);
                return;
            }
        }
        self.work.push_back(Work::Station(handle));
        self.run();
    }

    /// Replaces the GTK and distributes it to every station with an established PTKSA.
    pub fn force_rekey(&mut self) {
        info!("GTK rekey requested");
        self.group.request_rekey();
        self.run();
    }

    /// Reports the expiry of a timeout scheduled through the `Scheduler`.
    pub fn on_timeout(&mut self, event_id: EventId) {
        match self.timer.triggered(&event_id) {
            Some(TimeoutEvent::EapolKey(handle)) => match self.station_mut(handle) {
                Some(station) if station.eapol_timer == Some(event_id) => {
                    station.on_eapol_timeout();
                    self.work.push_back(Work::Station(handle));
                }
                _ => debug!("ignoring stale EAPOL-Key timeout {:?}", event_id),
            },
            Some(TimeoutEvent::PtkRekey(handle)) => match self.station_mut(handle) {
                Some(station) if station.ptk_rekey_timer == Some(event_id) => {
                    info!("PTK rekey of {}", MacFmt(&station.addr));
                    station.request_ptk_rekey();
                    self.work.push_back(Work::Station(handle));
                }
                _ => debug!("ignoring stale PTK rekey timeout {:?}", event_id),
            },
            Some(TimeoutEvent::GroupRekey) if self.group_rekey_timer == Some(event_id) => {
                self.group_rekey_timer = None;
                self.arm_group_rekey_timer();
                self.group.request_rekey();
            }
            Some(TimeoutEvent::GroupRekey) | None => {
                debug!("ignoring unknown timeout {:?}", event_id);
                return;
            }
        }
        self.run();
    }

    pub fn station_states(&self, sta: &MacAddr) -> Option<(PtkState, PtkGroupState)> {
        let handle = self.by_addr.get(sta)?;
        self.station(*handle).map(|station| (station.ptk_state(), station.group_state()))
    }

    pub fn group_state(&self) -> GroupState {
        self.group.state()
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    fn station(&self, handle: StationHandle) -> Option<&Station> {
        self.stations.get(handle.index).filter(|station| station.handle == handle)
    }

    fn station_mut(&mut self, handle: StationHandle) -> Option<&mut Station> {
        self.stations.get_mut(handle.index).filter(|station| station.handle == handle)
    }

    /// Drains the work queue and steps the group key context until nothing changes anymore.
    fn run(&mut self) {
        loop {
            while let Some(work) = self.work.pop_front() {
                match work {
                    Work::Station(handle) => while self.step_station(handle) {},
                    Work::Remove(handle) => self.remove_station(handle),
                }
            }
            if !self.settle_group() {
                break;
            }
        }
    }

    /// Runs one pass of a station's state machines and carries out the resulting updates.
    /// Returns whether the station needs another pass.
    fn step_station(&mut self, handle: StationHandle) -> bool {
        let group_seqnum = self.driver.group_key_seqnum(self.group.gn());
        let mut updates = vec![];
        let changed = match self.stations.get_mut(handle.index) {
            Some(station) if station.handle == handle => {
                let mut env = StepEnv {
                    aa: &self.addr,
                    cfg: &self.cfg,
                    group: &mut self.group,
                    psk: &*self.psk,
                    rng: &mut *self.rng,
                    group_seqnum,
                };
                station.step(&mut env, &mut updates)
            }
            _ => return false,
        };
        let disconnected = self.apply_station_updates(handle, updates);
        changed || disconnected
    }

    /// Returns whether the group key context changed state.
    fn settle_group(&mut self) -> bool {
        let mut progressed = false;
        loop {
            let mut updates = vec![];
            let changed = self.group.step(&mut *self.rng, &mut updates);
            self.apply_group_updates(updates);
            if self.group.take_fan_out() {
                let group = &mut self.group;
                for (_, station) in self.stations.iter_mut() {
                    if station.schedule_group_update(group) {
                        self.work.push_back(Work::Station(station.handle));
                    }
                }
                debug!("GTK {} pending for {} stations", group.gn(), group.pending_stations());
            }
            if !changed {
                return progressed;
            }
            progressed = true;
        }
    }

    /// Returns true if a failure requested the station's disconnect.
    fn apply_station_updates(&mut self, handle: StationHandle, updates: UpdateSink) -> bool {
        let addr = match self.station(handle) {
            Some(station) => station.addr,
            None => return false,
        };
        let mut disconnect = false;
        for update in updates {
            match update {
                SecAssocUpdate::TxEapolKeyFrame(frame) => {
                    if let Err(e) = self.transport.send(&addr, &frame[..]) {
                        error!("error sending EAPOL-Key frame to {}: {}", MacFmt(&addr), e);
                    }
                }
                SecAssocUpdate::Key(Key::Ptk(ptk)) => {
                    let cipher = self.cfg.pairwise_cipher;
                    match self.driver.install_pairwise_key(&addr, cipher, ptk.tk()) {
                        Ok(()) => debug!("installed PTK for {}", MacFmt(&addr)),
                        Err(e) => {
                            error!("error installing PTK for {}: {}", MacFmt(&addr), e);
                            disconnect = true;
                        }
                    }
                }
                SecAssocUpdate::Key(Key::Gtk(key_id, gtk)) => {
                    let cipher = self.group.cipher();
                    if let Err(e) = self.driver.install_group_key(cipher, key_id, gtk.as_bytes()) {
                        error!("error installing GTK {}: {}", key_id, e);
                        disconnect = true;
                    }
                }
                SecAssocUpdate::RemovePtk => self.driver.remove_pairwise_key(&addr),
                SecAssocUpdate::ScheduleEapolTimeout(after) => {
                    self.set_station_timer(handle, StationTimer::EapolKey, Some(after))
                }
                SecAssocUpdate::CancelEapolTimeout => {
                    self.set_station_timer(handle, StationTimer::EapolKey, None)
                }
                SecAssocUpdate::SchedulePtkRekey(after) => {
                    self.set_station_timer(handle, StationTimer::PtkRekey, Some(after))
                }
                SecAssocUpdate::CancelPtkRekey => {
                    self.set_station_timer(handle, StationTimer::PtkRekey, None)
                }
                SecAssocUpdate::Disassociate(reason) => {
                    self.transport.disassociate(&addr, reason);
                    self.work.push_back(Work::Remove(handle));
                }
            }
        }
        if disconnect {
            if let Some(station) = self.station_mut(handle) {
                station.request_disconnect(ReasonCode::InvalidAuthentication);
            }
        }
        disconnect
    }

    fn apply_group_updates(&mut self, updates: UpdateSink) {
        for update in updates {
            match update {
                SecAssocUpdate::Key(Key::Gtk(key_id, gtk)) => {
                    let cipher = self.group.cipher();
                    match self.driver.install_group_key(cipher, key_id, gtk.as_bytes()) {
                        Ok(()) => debug!("installed GTK {}", key_id),
                        Err(e) => error!("error installing GTK {}: {}", key_id, e),
                    }
                }
                other => warn!("ignoring unexpected group key update {:?}", other),
            }
        }
    }

    /// Replaces a station's pending timeout of the given kind. `None` only cancels it.
    fn set_station_timer(
        &mut self,
        handle: StationHandle,
        kind: StationTimer,
        after: Option<Duration>,
    ) {
        let event = match kind {
            StationTimer::EapolKey => TimeoutEvent::EapolKey(handle),
            StationTimer::PtkRekey => TimeoutEvent::PtkRekey(handle),
        };
        let timer = &mut self.timer;
        let scheduled = after.map(|after| timer.schedule_event(after, event));
        let replaced = match self.station_mut(handle) {
            Some(station) => match kind {
                StationTimer::EapolKey => std::mem::replace(&mut station.eapol_timer, scheduled),
                StationTimer::PtkRekey => {
                    std::mem::replace(&mut station.ptk_rekey_timer, scheduled)
                }
            },
            None => scheduled,
        };
        if let Some(event_id) = replaced {
            self.timer.cancel_event(event_id);
        }
    }

    fn arm_group_rekey_timer(&mut self) {
        if let Some(interval) = self.cfg.group_rekey_interval {
            let event_id = self.timer.schedule_event(interval, TimeoutEvent::GroupRekey);
            self.group_rekey_timer = Some(event_id);
        }
    }

    fn remove_station(&mut self, handle: StationHandle) {
        if self.station(handle).is_none() {
            return;
        }
        let mut station = self.stations.remove(handle.index);
        for event_id in station.eapol_timer.take().into_iter().chain(station.ptk_rekey_timer.take())
        {
            self.timer.cancel_event(event_id);
        }
        station.release_group_update(&mut self.group);
        if self.by_addr.get(&station.addr) == Some(&handle) {
            self.by_addr.remove(&station.addr);
        }
        info!("removed {}", MacFmt(&station.addr));
    }
}
