// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::key::Pmk;
use crate::MacAddr;
use std::collections::HashMap;

/// Supplies PMK candidates for a station.
///
/// Candidates are enumerated by passing the previously returned one as `previous`; `None`
/// starts the enumeration. Returning `None` ends it.
pub trait PskProvider {
    fn get_psk(&self, sta: &MacAddr, previous: Option<&Pmk>) -> Option<Pmk>;
}

/// A fixed list of PSKs shared by all stations, optionally extended by per-station PSKs which
/// are tried first.
#[derive(Default)]
pub struct StaticPskProvider {
    shared: Vec<Pmk>,
    per_station: HashMap<MacAddr, Vec<Pmk>>,
}

impl StaticPskProvider {
    pub fn new(shared: Vec<Pmk>) -> Self {
        Self { shared, per_station: HashMap::new() }
    }

    pub fn add_station_psk(&mut self, sta: MacAddr, pmk: Pmk) {
        self.per_station.entry(sta).or_insert_with(Vec::new).push(pmk);
    }

    fn candidates<'a>(&'a self, sta: &MacAddr) -> impl Iterator<Item = &'a Pmk> + 'a {
        self.per_station.get(sta).into_iter().flatten().chain(self.shared.iter())
    }
}

impl PskProvider for StaticPskProvider {
    fn get_psk(&self, sta: &MacAddr, previous: Option<&Pmk>) -> Option<Pmk> {
        let mut candidates = self.candidates(sta);
        match previous {
            None => candidates.next().cloned(),
            Some(previous) => {
                candidates.by_ref().find(|pmk| *pmk == previous)?;
                candidates.next().cloned()
            }
        }
    }
}
