// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::{SecAssocUpdate, UpdateSink};
use crate::config::{Config, DEFAULT_RSNE};
use crate::crypto_utils::nonce::{Nonce, RandomSource};
use crate::device::{Driver, ReasonCode, Transport};
use crate::group_key::GroupKeyContext;
use crate::key::{
    ptk::{derive_ptk, Ptk},
    Pmk,
};
use crate::key_data::{self, Element};
use crate::keywrap::keywrap_algorithm;
use crate::message::{self, KeyFrameFields};
use crate::psk::StaticPskProvider;
use crate::station::{Received, Station, StationHandle, StepEnv};
use crate::suite::Cipher;
use crate::{Error, MacAddr};
use eapol::{KeyFrame, KeyInformation};
use hex::FromHex;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::{cell::RefCell, rc::Rc};

pub const S_ADDR: [u8; 6] = [0x81, 0x76, 0x61, 0x14, 0xDF, 0xC9];
pub const A_ADDR: [u8; 6] = [0x1D, 0xE3, 0xFD, 0xDF, 0xCB, 0xD3];

pub fn get_pmk() -> Pmk {
    let bytes = Vec::from_hex("0dc0d6eb90555ed6419756b9a15ec3e3209b63df707dd508d14581f8982721af")
        .expect("error reading PMK from hex");
    Pmk::new(&bytes[..]).expect("error creating PMK")
}

pub fn get_rsne_bytes() -> Vec<u8> {
    DEFAULT_RSNE.to_vec()
}

/// Deterministic randomness for reproducible nonces and keys.
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        SeededRandom(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn fill_random(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.0.fill_bytes(buf);
        Ok(())
    }
}

pub struct FailingRandom;

impl RandomSource for FailingRandom {
    fn fill_random(&mut self, _buf: &mut [u8]) -> Result<(), Error> {
        Err(Error::RandomSource("entropy pool exhausted".to_string()))
    }
}

#[derive(Default, Debug)]
pub struct TransportState {
    pub sent: Vec<(MacAddr, Vec<u8>)>,
    pub disassociated: Vec<(MacAddr, ReasonCode)>,
    pub fail_send: bool,
}

/// Records frames and disassociations. Clones share their records.
#[derive(Default, Clone)]
pub struct FakeTransport {
    pub state: Rc<RefCell<TransportState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the frames sent to `sta` so far.
    pub fn take_frames(&self, sta: &MacAddr) -> Vec<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        let (frames, others) = state.sent.drain(..).partition(|(addr, _)| addr == sta);
        state.sent = others;
        frames.into_iter().map(|(_, frame)| frame).collect()
    }

    pub fn disassociated(&self) -> Vec<(MacAddr, ReasonCode)> {
        self.state.borrow().disassociated.clone()
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, sta: &MacAddr, frame: &[u8]) -> Result<(), anyhow::Error> {
        let mut state = self.state.borrow_mut();
        if state.fail_send {
            return Err(anyhow::format_err!("link down"));
        }
        state.sent.push((*sta, frame.to_vec()));
        Ok(())
    }

    fn disassociate(&mut self, sta: &MacAddr, reason: ReasonCode) {
        self.state.borrow_mut().disassociated.push((*sta, reason));
    }
}

#[derive(Default, Debug)]
pub struct DriverState {
    pub pairwise_keys: Vec<(MacAddr, Cipher, Vec<u8>)>,
    pub group_keys: Vec<(u8, Vec<u8>)>,
    pub removed: Vec<MacAddr>,
    pub fail_pairwise: bool,
    pub fail_group: bool,
    pub seqnum: u64,
}

/// Records installed and removed keys. Clones share their records.
#[derive(Default, Clone)]
pub struct FakeDriver {
    pub state: Rc<RefCell<DriverState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairwise_keys(&self) -> Vec<(MacAddr, Cipher, Vec<u8>)> {
        self.state.borrow().pairwise_keys.clone()
    }

    pub fn group_keys(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.borrow().group_keys.clone()
    }
}

impl Driver for FakeDriver {
    fn install_pairwise_key(
        &mut self,
        sta: &MacAddr,
        cipher: Cipher,
        key: &[u8],
    ) -> Result<(), anyhow::Error> {
        let mut state = self.state.borrow_mut();
        if state.fail_pairwise {
            return Err(anyhow::format_err!("key table full"));
        }
        state.pairwise_keys.push((*sta, cipher, key.to_vec()));
        Ok(())
    }

    fn install_group_key(
        &mut self,
        _cipher: Cipher,
        key_id: u8,
        key: &[u8],
    ) -> Result<(), anyhow::Error> {
        let mut state = self.state.borrow_mut();
        if state.fail_group {
            return Err(anyhow::format_err!("key table full"));
        }
        state.group_keys.push((key_id, key.to_vec()));
        Ok(())
    }

    fn remove_pairwise_key(&mut self, sta: &MacAddr) {
        self.state.borrow_mut().removed.push(*sta);
    }

    fn group_key_seqnum(&self, _key_id: u8) -> u64 {
        self.state.borrow().seqnum
    }
}

/// Scripted supplicant answering the authenticator's EAPOL-Key frames.
pub struct Supplicant {
    pmk: Pmk,
    cfg: Config,
    pub addr: MacAddr,
    pub snonce: Nonce,
    pub ptk: Option<Ptk>,
}

impl Supplicant {
    pub fn new(pmk: Pmk) -> Self {
        Self::with_config(pmk, Config::default(), S_ADDR)
    }

    pub fn with_config(pmk: Pmk, cfg: Config, addr: MacAddr) -> Self {
        Supplicant { pmk, cfg, addr, snonce: [0x3C; 32], ptk: None }
    }

    pub fn set_snonce(&mut self, snonce: Nonce) {
        self.snonce = snonce;
    }

    fn parse(&self, raw: &[u8]) -> KeyFrame {
        eapol::key_frame_from_bytes(raw, self.cfg.akm.mic_bytes())
            .expect("error parsing EAPOL-Key frame")
    }

    fn build(&self, bits: u16, key_replay_counter: u64, key_nonce: Nonce, key_data: Vec<u8>) -> Vec<u8> {
        let mut key_info = KeyInformation(bits);
        key_info.set_key_descriptor_version(self.cfg.key_descriptor_version());
        let fields = KeyFrameFields {
            eapol_version: self.cfg.eapol_version,
            key_info,
            key_len: 0,
            key_replay_counter,
            key_nonce,
            key_rsc: 0,
            key_data,
            mic_len: self.cfg.akm.mic_bytes(),
        };
        message::build(fields, self.ptk.as_ref()).expect("error building EAPOL-Key frame")
    }

    /// Derives the PTK from message 1's ANonce and answers with message 2.
    pub fn msg2(&mut self, msg1: &[u8]) -> Vec<u8> {
        let frame = self.parse(msg1);
        let ptk = derive_ptk(
            &self.pmk,
            &A_ADDR,
            &self.addr,
            &frame.key_nonce,
            &self.snonce,
            self.cfg.akm.uses_sha256(),
        )
        .expect("error deriving PTK");
        self.ptk = Some(ptk);
        // MIC, Pairwise
        self.build(0x0108, frame.key_replay_counter, self.snonce, get_rsne_bytes())
    }

    pub fn msg4(&mut self, msg3: &[u8]) -> Vec<u8> {
        let counter = self.parse(msg3).key_replay_counter;
        self.msg4_for_counter(counter)
    }

    pub fn msg4_for_counter(&self, counter: u64) -> Vec<u8> {
        // Secure, MIC, Pairwise
        self.build(0x0308, counter, [0u8; 32], vec![])
    }

    pub fn group2(&mut self, msg1: &[u8]) -> Vec<u8> {
        let counter = self.parse(msg1).key_replay_counter;
        // Secure, MIC
        self.build(0x0300, counter, [0u8; 32], vec![])
    }

    pub fn request(&self, counter: u64, pairwise: bool) -> Vec<u8> {
        // Request, Secure, MIC
        let bits = if pairwise { 0x0b08 } else { 0x0b00 };
        self.build(bits, counter, [0u8; 32], vec![])
    }

    /// Michael MIC failure report.
    pub fn error_request(&self, counter: u64) -> Vec<u8> {
        self.build(0x0f08, counter, [0u8; 32], vec![])
    }

    /// Recomputes the MIC of a modified frame.
    pub fn remic(&self, mut raw: Vec<u8>) -> Vec<u8> {
        let frame = self.parse(&raw[..]);
        let ptk = self.ptk.as_ref().expect("supplicant has no PTK");
        let mic = message::compute_mic(ptk.kck(), &frame).expect("error computing MIC");
        raw[eapol::KEY_MIC_OFFSET..eapol::KEY_MIC_OFFSET + mic.len()].copy_from_slice(&mic[..]);
        raw
    }

    /// Decrypts and parses the key data of message 3 or group message 1.
    pub fn key_data(&self, raw: &[u8]) -> Vec<Element> {
        let frame = self.parse(raw);
        let ptk = self.ptk.as_ref().expect("supplicant has no PTK");
        let plaintext = keywrap_algorithm(frame.key_info.key_descriptor_version())
            .expect("no keywrap algorithm")
            .unwrap(ptk.kek(), &frame.key_data[..])
            .expect("error unwrapping key data");
        key_data::extract_elements(&plaintext[..]).expect("error parsing key data")
    }

    /// Key id and key of the GTK KDE in message 3 or group message 1.
    pub fn gtk(&self, raw: &[u8]) -> (u8, Vec<u8>) {
        self.key_data(raw)
            .into_iter()
            .find_map(|element| match element {
                Element::Gtk(_, gtk) => Some((gtk.info.key_id(), gtk.gtk)),
                _ => None,
            })
            .expect("no GTK KDE in key data")
    }
}

/// A single station driven directly, without an `Authenticator`. Updates accumulate in
/// `updates` instead of being carried out.
pub struct StationFixture {
    pub station: Station,
    pub cfg: Config,
    pub group: GroupKeyContext,
    pub psk: StaticPskProvider,
    pub rng: SeededRandom,
    pub fail_rng: bool,
    pub group_seqnum: u64,
    pub updates: UpdateSink,
}

impl StationFixture {
    pub fn new(cfg: Config) -> Self {
        let mut rng = SeededRandom::new(42);
        let mut group = GroupKeyContext::new(cfg.group_cipher);
        let mut group_updates = vec![];
        group.step(&mut rng, &mut group_updates);
        while group.step(&mut rng, &mut group_updates) {}

        StationFixture {
            station: Station::new(S_ADDR, StationHandle { index: 0, generation: 0 }, None),
            cfg,
            group,
            psk: StaticPskProvider::new(vec![get_pmk()]),
            rng,
            fail_rng: false,
            group_seqnum: 0,
            updates: vec![],
        }
    }

    pub fn step(&mut self) -> bool {
        let mut failing = FailingRandom;
        let rng: &mut dyn RandomSource = if self.fail_rng { &mut failing } else { &mut self.rng };
        let mut env = StepEnv {
            aa: &A_ADDR,
            cfg: &self.cfg,
            group: &mut self.group,
            psk: &self.psk,
            rng,
            group_seqnum: self.group_seqnum,
        };
        self.station.step(&mut env, &mut self.updates)
    }

    pub fn settle(&mut self) {
        while self.step() {}
    }

    pub fn associate_without_msg1(&mut self) {
        self.station.inputs.init = true;
        self.step();
        self.station.inputs.init = false;
        self.station.inputs.authentication_request = true;
        self.settle();
    }

    /// Associates the station and returns message 1.
    pub fn associate(&mut self) -> Vec<u8> {
        self.associate_without_msg1();
        self.take_tx().pop().expect("expected message 1")
    }

    /// Removes and returns the frames sent so far.
    pub fn take_tx(&mut self) -> Vec<Vec<u8>> {
        let mut frames = vec![];
        self.updates.retain(|update| match update {
            SecAssocUpdate::TxEapolKeyFrame(frame) => {
                frames.push(frame.clone());
                false
            }
            _ => true,
        });
        frames
    }

    pub fn receive_only(&mut self, raw: &[u8]) -> Result<Received, Error> {
        self.station.on_eapol_key_frame(raw, &self.cfg, &mut self.updates)
    }

    pub fn receive(&mut self, raw: &[u8]) -> Result<Received, Error> {
        let received = self.receive_only(raw)?;
        self.settle();
        Ok(received)
    }

    pub fn timeout(&mut self) {
        self.station.on_eapol_timeout();
        self.settle();
    }

    pub fn complete_from_msg1(&mut self, sup: &mut Supplicant, msg1: &[u8]) {
        let msg2 = sup.msg2(msg1);
        self.receive(&msg2[..]).expect("error receiving message 2");
        let msg3 = self.take_tx().pop().expect("expected message 3");
        let msg4 = sup.msg4(&msg3[..]);
        self.receive(&msg4[..]).expect("error receiving message 4");
    }

    pub fn complete_4way_handshake(&mut self, sup: &mut Supplicant) {
        let msg1 = self.associate();
        self.complete_from_msg1(sup, &msg1[..]);
    }

    /// Starts a GTK rekey and flags the station for it.
    pub fn start_group_rekey(&mut self) {
        self.group.request_rekey();
        let mut group_updates = vec![];
        self.group.step(&mut self.rng, &mut group_updates);
        assert!(self.group.take_fan_out());
        assert!(self.station.schedule_group_update(&mut self.group));
        self.settle();
    }
}
