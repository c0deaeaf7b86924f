// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-station key management: the pairwise (4-Way Handshake) and group (Group Key Handshake)
//! state machines and the validation of inbound EAPOL-Key frames which feeds them.

mod group;
mod pairwise;

pub use self::group::PtkGroupState;
pub use self::pairwise::PtkState;

use crate::config::Config;
use crate::crypto_utils::nonce::{Nonce, RandomSource};
use crate::device::ReasonCode;
use crate::group_key::GroupKeyContext;
use crate::key::{
    ptk::{derive_ptk, Ptk},
    Pmk,
};
use crate::message::{self, KeyFrameFields, MessageKind};
use crate::psk::PskProvider;
use crate::replay::ReplayCounters;
use crate::rsna::{SecAssocUpdate, UpdateSink};
use crate::timer::EventId;
use crate::{Error, MacAddr, MacFmt};
use eapol::{KeyDescriptor, KeyInformation};
use log::{debug, error, info};

/// Stable reference to a station record. The generation tells a record apart from a later one
/// reusing the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationHandle {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

/// Inputs of the per-station state machines.
/// IEEE Std 802.11-2016, 12.7.10.2
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Inputs {
    pub init: bool,
    pub authentication_request: bool,
    pub reauthentication_request: bool,
    pub deauthentication_request: bool,
    pub disconnect: bool,
    pub ptk_request: bool,
    pub ptk_group_init: bool,
    pub eapol_key_received: bool,
    pub eapol_key_pairwise: bool,
    pub eapol_key_request: bool,
    pub timeout_evt: bool,
    pub mic_verified: bool,
    pub update_snonce: bool,
    pub g_update_station_keys: bool,
}

/// Everything a station's transitions consult besides the station itself.
pub struct StepEnv<'a> {
    pub aa: &'a MacAddr,
    pub cfg: &'a Config,
    pub group: &'a mut GroupKeyContext,
    pub psk: &'a dyn PskProvider,
    pub rng: &'a mut dyn RandomSource,
    /// Transmit sequence counter of the current group key.
    pub group_seqnum: u64,
}

/// An accepted EAPOL-Key frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    Frame,
    /// The station asked for a new GTK. Only the owner of the group key context can act on it.
    GroupRekeyRequest,
}

/// What an SNonce update replaces. Restored when the updated message 2 does not verify.
struct SnonceRollback {
    snonce: Nonce,
    key_replay: ReplayCounters,
    prev_key_replay: ReplayCounters,
    last_rx_eapol_key: Vec<u8>,
}

pub struct Station {
    pub(crate) addr: MacAddr,
    pub(crate) handle: StationHandle,
    pub(crate) inputs: Inputs,
    pub(crate) ptk_state: PtkState,
    pub(crate) group_state: PtkGroupState,
    pub(crate) eapol_timer: Option<EventId>,
    pub(crate) ptk_rekey_timer: Option<EventId>,
    disconnect_reason: Option<ReasonCode>,
    pair: bool,
    pairwise_set: bool,
    ptk_valid: bool,
    has_gtk: bool,
    timeout_ctr: u32,
    g_timeout_ctr: u32,
    anonce: Nonce,
    snonce: Nonce,
    pmk: Option<Pmk>,
    ptk: Option<Ptk>,
    key_replay: ReplayCounters,
    prev_key_replay: ReplayCounters,
    req_replay_counter: Option<u64>,
    last_rx_eapol_key: Vec<u8>,
    snonce_rollback: Option<SnonceRollback>,
    assoc_rsne: Option<Vec<u8>>,
}

impl Station {
    /// `assoc_rsne` is the RSNE of the station's (re)association request. If known, the RSNE
    /// in message 2 must match it.
    pub fn new(addr: MacAddr, handle: StationHandle, assoc_rsne: Option<Vec<u8>>) -> Self {
        Station {
            addr,
            handle,
            inputs: Inputs::default(),
            ptk_state: PtkState::Initialize,
            group_state: PtkGroupState::Idle,
            eapol_timer: None,
            ptk_rekey_timer: None,
            disconnect_reason: None,
            pair: false,
            pairwise_set: false,
            ptk_valid: false,
            has_gtk: false,
            timeout_ctr: 0,
            g_timeout_ctr: 0,
            anonce: [0u8; 32],
            snonce: [0u8; 32],
            pmk: None,
            ptk: None,
            key_replay: ReplayCounters::default(),
            prev_key_replay: ReplayCounters::default(),
            req_replay_counter: None,
            last_rx_eapol_key: vec![],
            snonce_rollback: None,
            assoc_rsne,
        }
    }

    pub fn addr(&self) -> &MacAddr {
        &self.addr
    }

    pub fn ptk_state(&self) -> PtkState {
        self.ptk_state
    }

    pub fn group_state(&self) -> PtkGroupState {
        self.group_state
    }

    pub fn has_gtk(&self) -> bool {
        self.has_gtk
    }

    pub(crate) fn set_assoc_rsne(&mut self, rsne: Option<Vec<u8>>) {
        self.assoc_rsne = rsne;
    }

    /// Latches a disconnect. The pairwise machine acts on it with its next step.
    pub(crate) fn request_disconnect(&mut self, reason: ReasonCode) {
        self.inputs.disconnect = true;
        self.disconnect_reason.get_or_insert(reason);
    }

    pub(crate) fn on_eapol_timeout(&mut self) {
        self.eapol_timer = None;
        self.inputs.timeout_evt = true;
    }

    pub(crate) fn request_ptk_rekey(&mut self) {
        self.ptk_rekey_timer = None;
        self.inputs.ptk_request = true;
    }

    /// Flags the station for the group key update in progress. Only stations with an
    /// established PTKSA take part.
    pub(crate) fn schedule_group_update(&mut self, group: &mut GroupKeyContext) -> bool {
        if self.ptk_state != PtkState::PtkInitDone {
            return false;
        }
        if self.inputs.g_update_station_keys {
            debug!("restarting group key update for {}", MacFmt(&self.addr));
        }
        self.inputs.g_update_station_keys = true;
        group.add_pending_station();
        true
    }

    /// A known station associated again. The previous PTKSA is gone and a new 4-Way Handshake
    /// supersedes any pending group key update.
    pub(crate) fn on_reassociation(
        &mut self,
        group: &mut GroupKeyContext,
        sink: &mut UpdateSink,
    ) {
        self.release_group_update(group);
        self.clear_ptk(sink);
        self.inputs.reauthentication_request = true;
        self.inputs.ptk_group_init = true;
    }

    pub(crate) fn release_group_update(&mut self, group: &mut GroupKeyContext) {
        if self.inputs.g_update_station_keys {
            self.inputs.g_update_station_keys = false;
            group.station_done();
        }
    }

    fn arm_eapol_timer(&self, cfg: &Config, sink: &mut UpdateSink, pairwise: bool) {
        let (sent, first) = if pairwise {
            (self.timeout_ctr, cfg.eapol_key_timeout_first)
        } else {
            (self.g_timeout_ctr, cfg.eapol_key_timeout_first_group)
        };
        let timeout = if sent == 1 { first } else { cfg.eapol_key_timeout_subsequent };
        sink.push(SecAssocUpdate::ScheduleEapolTimeout(timeout));
    }

    /// Runs one pass of both state machines. Returns whether either changed state.
    pub fn step(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) -> bool {
        let ptk_changed = self.step_pairwise(env, sink);
        let group_changed = self.step_group(env, sink);
        ptk_changed || group_changed
    }

    /// Validates an inbound EAPOL-Key frame and records it as state machine input. A rejected
    /// frame leaves the station untouched.
    pub fn on_eapol_key_frame(
        &mut self,
        raw: &[u8],
        cfg: &Config,
        sink: &mut UpdateSink,
    ) -> Result<Received, Error> {
        let mic_len = cfg.akm.mic_bytes();
        let frame = eapol::key_frame_from_bytes(raw, mic_len)?;
        let raw = &raw[..frame.len()];
        let key_info = frame.key_info;
        let kind = message::classify(&frame);
        if kind == MessageKind::Smk {
            return Err(Error::UnsupportedSmkMessage);
        }

        if frame.descriptor_type != KeyDescriptor::Ieee802dot11 as u8 {
            let tolerated = kind == MessageKind::Pairwise4
                && frame.descriptor_type == KeyDescriptor::LegacyWpa1 as u8
                && cfg.allow_wpa_type_msg4;
            if !tolerated {
                return Err(Error::UnsupportedDescriptorType(frame.descriptor_type));
            }
            debug!("accepting WPA descriptor type in message 4 from {}", MacFmt(&self.addr));
        }
        let expected_version = cfg.key_descriptor_version();
        if key_info.key_descriptor_version() != expected_version {
            return Err(Error::UnexpectedKeyDescriptorVersion(
                key_info.key_descriptor_version(),
                expected_version,
            ));
        }

        let counter = frame.key_replay_counter;
        let mut update_snonce = false;
        if kind == MessageKind::Request {
            if let Some(last) = self.req_replay_counter {
                if counter <= last {
                    return Err(Error::InvalidRequestReplayCounter(counter, last));
                }
            }
        } else if !self.key_replay.is_fresh(counter) {
            // Some supplicants pick a new SNonce for every message 2. Once message 3 went out, a
            // message 2 answering an earlier message 1 carries an outdated counter but must still
            // replace the SNonce.
            if kind == MessageKind::Pairwise2
                && cfg.allow_snonce_update
                && self.prev_key_replay.is_fresh(counter)
                && self.ptk_state == PtkState::PtkInitNegotiating
                && self.snonce != frame.key_nonce
            {
                info!("processing SNonce update from {}", MacFmt(&self.addr));
                update_snonce = true;
            } else {
                return Err(Error::InvalidKeyReplayCounter(counter));
            }
        }

        let expected = match kind {
            MessageKind::Pairwise2 => {
                self.ptk_state == PtkState::PtkStart
                    || self.ptk_state == PtkState::PtkCalcNegotiating
                    || (self.ptk_state == PtkState::PtkInitNegotiating && update_snonce)
            }
            MessageKind::Pairwise4 => {
                self.ptk_state == PtkState::PtkInitNegotiating && self.ptk_valid
            }
            MessageKind::Group2 => {
                self.group_state == PtkGroupState::RekeyNegotiating && self.ptk_valid
            }
            MessageKind::Request | MessageKind::Smk => true,
        };
        if !expected {
            return Err(Error::UnexpectedMessage(kind));
        }
        if key_info.key_ack() || !key_info.key_mic() {
            return Err(Error::UnexpectedKeyInformation(key_info.value()));
        }

        // Message 2 is verified once a PTK was derived from its SNonce.
        if kind != MessageKind::Pairwise2 {
            let ptk = self.ptk.as_ref().filter(|_| self.ptk_valid).ok_or(Error::NoPtk)?;
            if !message::verify_mic(ptk.kck(), raw, mic_len as usize) {
                return Err(Error::InvalidMic);
            }
        }

        if kind == MessageKind::Request {
            return self.on_request(counter, key_info);
        }

        self.inputs.mic_verified = kind != MessageKind::Pairwise2;
        if self.inputs.mic_verified {
            sink.push(SecAssocUpdate::CancelEapolTimeout);
        }
        if update_snonce {
            // Message 2 is not authenticated yet.
            self.snonce_rollback = Some(SnonceRollback {
                snonce: self.snonce,
                key_replay: self.key_replay.clone(),
                prev_key_replay: self.prev_key_replay.clone(),
                last_rx_eapol_key: std::mem::take(&mut self.last_rx_eapol_key),
            });
            self.prev_key_replay.mark_invalid(Some(counter));
            self.inputs.update_snonce = true;
        }
        if kind == MessageKind::Pairwise2 {
            // Outstanding counters of retransmitted message 1s, for a later SNonce update.
            self.prev_key_replay = self.key_replay.clone();
            self.snonce = frame.key_nonce;
        } else {
            self.prev_key_replay = ReplayCounters::default();
        }
        self.key_replay.mark_invalid(None);
        self.last_rx_eapol_key = raw.to_vec();
        self.inputs.eapol_key_received = true;
        self.inputs.eapol_key_pairwise = key_info.key_type() == eapol::KEY_TYPE_PAIRWISE;
        self.inputs.eapol_key_request = false;
        debug!("accepted EAPOL-Key {:?} from {}", kind, MacFmt(&self.addr));
        Ok(Received::Frame)
    }

    fn on_request(&mut self, counter: u64, key_info: KeyInformation) -> Result<Received, Error> {
        self.req_replay_counter = Some(counter);
        if key_info.error() {
            // Michael MIC failure reports only concern TKIP.
            return Err(Error::UnsupportedErrorRequest);
        }
        if key_info.key_type() == eapol::KEY_TYPE_PAIRWISE {
            info!("{} requested a new 4-Way Handshake", MacFmt(&self.addr));
            self.inputs.ptk_request = true;
            Ok(Received::Frame)
        } else {
            info!("{} requested GTK rekeying", MacFmt(&self.addr));
            Ok(Received::GroupRekeyRequest)
        }
    }

    /// Undoes an SNonce update whose message 2 failed verification. Returns false if there was
    /// none.
    fn roll_back_snonce_update(&mut self) -> bool {
        match self.snonce_rollback.take() {
            Some(rollback) => {
                self.snonce = rollback.snonce;
                self.key_replay = rollback.key_replay;
                self.prev_key_replay = rollback.prev_key_replay;
                self.last_rx_eapol_key = rollback.last_rx_eapol_key;
                true
            }
            None => false,
        }
    }

    /// Derives a PTK from each PMK candidate until one verifies the MIC of the cached
    /// message 2.
    fn derive_ptk_for_msg2(&self, env: &StepEnv<'_>) -> Option<(Pmk, Ptk)> {
        let akm = env.cfg.akm;
        let mic_len = akm.mic_bytes() as usize;
        let mut tried: Vec<Pmk> = vec![];
        let mut candidate =
            if akm.is_psk() { env.psk.get_psk(&self.addr, None) } else { self.pmk.clone() };
        while let Some(pmk) = candidate {
            if tried.contains(&pmk) {
                break;
            }
            let ptk = match derive_ptk(
                &pmk,
                env.aa,
                &self.addr,
                &self.anonce,
                &self.snonce,
                akm.uses_sha256(),
            ) {
                Ok(ptk) => ptk,
                Err(e) => {
                    error!("error deriving PTK: {}", e);
                    return None;
                }
            };
            if message::verify_mic(ptk.kck(), &self.last_rx_eapol_key[..], mic_len) {
                return Some((pmk, ptk));
            }
            if !akm.is_psk() {
                break;
            }
            candidate = env.psk.get_psk(&self.addr, Some(&pmk));
            tried.push(pmk);
        }
        None
    }

    /// Sends an EAPOL-Key frame with the next replay counter.
    fn send_eapol_key(
        &mut self,
        env: &StepEnv<'_>,
        sink: &mut UpdateSink,
        mut key_info: KeyInformation,
        key_len: u16,
        key_nonce: Nonce,
        key_rsc: u64,
        key_data: Vec<u8>,
    ) -> Result<(), Error> {
        key_info.set_key_descriptor_version(env.cfg.key_descriptor_version());
        let key_replay_counter = self.key_replay.push_and_validate_on_send();
        let frame = message::build(
            KeyFrameFields {
                eapol_version: env.cfg.eapol_version,
                key_info,
                key_len,
                key_replay_counter,
                key_nonce,
                key_rsc,
                key_data,
                mic_len: env.cfg.akm.mic_bytes(),
            },
            self.ptk.as_ref(),
        )?;
        sink.push(SecAssocUpdate::TxEapolKeyFrame(frame));
        Ok(())
    }
}
