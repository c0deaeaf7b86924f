// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::{Station, StepEnv};
use crate::config::Config;
use crate::crypto_utils::nonce::new_nonce;
use crate::device::ReasonCode;
use crate::key_data::{self, kde};
use crate::rsna::{Key, SecAssocUpdate, UpdateSink};
use crate::MacFmt;
use eapol::KeyInformation;
use log::{debug, error, info, warn};

/// States of the authenticator's per-station 4-Way Handshake state machine.
/// IEEE Std 802.11-2016, 12.7.10.2, Figure 12-51
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtkState {
    Initialize,
    Disconnect,
    Disconnected,
    Authentication,
    Authentication2,
    InitPsk,
    PtkStart,
    PtkCalcNegotiating,
    PtkCalcNegotiating2,
    PtkInitNegotiating,
    PtkInitDone,
}

impl Station {
    /// The state the pairwise machine moves to given the current inputs, if any. Global
    /// transitions take precedence over the ones of the current state.
    pub(super) fn next_pairwise_state(&self, cfg: &Config) -> Option<PtkState> {
        let inputs = &self.inputs;
        if inputs.init {
            return Some(PtkState::Initialize);
        } else if inputs.disconnect {
            return Some(PtkState::Disconnect);
        } else if inputs.deauthentication_request {
            return Some(PtkState::Disconnected);
        } else if inputs.authentication_request {
            return Some(PtkState::Authentication);
        } else if inputs.reauthentication_request {
            return Some(PtkState::Authentication2);
        } else if inputs.ptk_request {
            return Some(PtkState::PtkStart);
        }

        let pairwise_frame =
            inputs.eapol_key_received && !inputs.eapol_key_request && inputs.eapol_key_pairwise;
        let retries_exhausted = self.timeout_ctr > cfg.pairwise_update_count;
        match self.ptk_state {
            PtkState::Initialize | PtkState::PtkInitDone => None,
            PtkState::Disconnect => Some(PtkState::Disconnected),
            PtkState::Disconnected => Some(PtkState::Initialize),
            PtkState::Authentication => Some(PtkState::Authentication2),
            PtkState::Authentication2 => Some(PtkState::InitPsk),
            PtkState::InitPsk if self.pmk.is_some() => Some(PtkState::PtkStart),
            PtkState::InitPsk => Some(PtkState::Disconnect),
            PtkState::PtkStart if pairwise_frame => Some(PtkState::PtkCalcNegotiating),
            PtkState::PtkStart if retries_exhausted => Some(PtkState::Disconnect),
            PtkState::PtkStart if inputs.timeout_evt => Some(PtkState::PtkStart),
            PtkState::PtkStart => None,
            PtkState::PtkCalcNegotiating if inputs.mic_verified => {
                Some(PtkState::PtkCalcNegotiating2)
            }
            PtkState::PtkCalcNegotiating if pairwise_frame => Some(PtkState::PtkCalcNegotiating),
            PtkState::PtkCalcNegotiating if inputs.timeout_evt => Some(PtkState::PtkStart),
            PtkState::PtkCalcNegotiating => None,
            PtkState::PtkCalcNegotiating2 => Some(PtkState::PtkInitNegotiating),
            PtkState::PtkInitNegotiating if inputs.update_snonce => {
                Some(PtkState::PtkCalcNegotiating)
            }
            PtkState::PtkInitNegotiating if pairwise_frame && inputs.mic_verified => {
                Some(PtkState::PtkInitDone)
            }
            PtkState::PtkInitNegotiating if retries_exhausted => Some(PtkState::Disconnect),
            PtkState::PtkInitNegotiating if inputs.timeout_evt => {
                Some(PtkState::PtkInitNegotiating)
            }
            PtkState::PtkInitNegotiating => None,
        }
    }

    /// Runs one transition of the pairwise machine. Returns whether it made progress.
    pub(super) fn step_pairwise(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) -> bool {
        let next = match self.next_pairwise_state(env.cfg) {
            Some(next) => next,
            None => return false,
        };
        if next == PtkState::Disconnect && !self.inputs.disconnect {
            let reason = match self.ptk_state {
                PtkState::InitPsk => ReasonCode::InvalidAuthentication,
                _ => ReasonCode::FourwayHandshakeTimeout,
            };
            self.disconnect_reason.get_or_insert(reason);
        }
        debug!("{}: {:?} -> {:?}", MacFmt(&self.addr), self.ptk_state, next);
        self.ptk_state = next;

        match next {
            PtkState::Initialize => self.enter_initialize(env, sink),
            PtkState::Disconnect => self.enter_disconnect(sink),
            PtkState::Disconnected => self.inputs.deauthentication_request = false,
            PtkState::Authentication => self.enter_authentication(sink),
            PtkState::Authentication2 => self.enter_authentication2(env, sink),
            PtkState::InitPsk => self.enter_init_psk(env),
            PtkState::PtkStart => self.enter_ptk_start(env, sink),
            PtkState::PtkCalcNegotiating => self.enter_ptk_calc_negotiating(env, sink),
            PtkState::PtkCalcNegotiating2 => self.timeout_ctr = 0,
            PtkState::PtkInitNegotiating => self.enter_ptk_init_negotiating(env, sink),
            PtkState::PtkInitDone => self.enter_ptk_init_done(env, sink),
        }

        // `init` stays set for a whole pass; reentering the initial state is no progress.
        !(next == PtkState::Initialize && self.inputs.init)
    }

    pub(super) fn clear_ptk(&mut self, sink: &mut UpdateSink) {
        self.ptk_valid = false;
        self.ptk = None;
        if self.pairwise_set {
            self.pairwise_set = false;
            sink.push(SecAssocUpdate::RemovePtk);
        }
        sink.push(SecAssocUpdate::CancelPtkRekey);
    }

    fn enter_initialize(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) {
        self.release_group_update(env.group);
        self.snonce_rollback = None;
        self.pair = true;
        self.clear_ptk(sink);
        self.timeout_ctr = 0;
        sink.push(SecAssocUpdate::CancelEapolTimeout);
    }

    fn enter_disconnect(&mut self, sink: &mut UpdateSink) {
        self.inputs.disconnect = false;
        let reason = self.disconnect_reason.take().unwrap_or(ReasonCode::InvalidAuthentication);
        info!("disconnecting {}: {:?}", MacFmt(&self.addr), reason);
        sink.push(SecAssocUpdate::Disassociate(reason));
    }

    fn enter_authentication(&mut self, sink: &mut UpdateSink) {
        self.inputs.authentication_request = false;
        self.ptk_valid = false;
        self.ptk = None;
        sink.push(SecAssocUpdate::CancelEapolTimeout);
    }

    fn enter_authentication2(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) {
        self.inputs.reauthentication_request = false;
        if let Err(e) = env.group.ensure_init(env.rng, sink) {
            error!("failed to initialize group key: {}", e);
            self.request_disconnect(ReasonCode::InvalidAuthentication);
            return;
        }
        // A fresh random ANonce for every handshake rather than a counter.
        match new_nonce(env.rng) {
            Ok(anonce) => self.anonce = anonce,
            Err(e) => {
                error!("failed to generate ANonce: {}", e);
                self.request_disconnect(ReasonCode::InvalidAuthentication);
                return;
            }
        }
        self.timeout_ctr = 0;
    }

    fn enter_init_psk(&mut self, env: &mut StepEnv<'_>) {
        self.pmk = env.psk.get_psk(&self.addr, None);
        if self.pmk.is_none() {
            warn!("no PMK available for {}", MacFmt(&self.addr));
        }
        self.req_replay_counter = None;
    }

    fn enter_ptk_start(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) {
        if self.inputs.ptk_request {
            match new_nonce(env.rng) {
                Ok(anonce) => self.anonce = anonce,
                Err(e) => {
                    error!("failed to generate ANonce for PTK rekey: {}", e);
                    self.inputs.ptk_request = false;
                    self.request_disconnect(ReasonCode::InvalidAuthentication);
                    return;
                }
            }
            self.timeout_ctr = 0;
        }
        self.inputs.ptk_request = false;
        self.inputs.timeout_evt = false;
        self.snonce_rollback = None;
        self.timeout_ctr += 1;
        if self.timeout_ctr > env.cfg.pairwise_update_count {
            // Disconnecting with the next step.
            return;
        }

        let mut key_info = KeyInformation(0);
        key_info.set_key_type(eapol::KEY_TYPE_PAIRWISE);
        key_info.set_key_ack(true);
        let key_len = env.cfg.pairwise_cipher.tk_bytes() as u16;
        let anonce = self.anonce;
        match self.send_eapol_key(env, sink, key_info, key_len, anonce, 0, vec![]) {
            Ok(()) => self.arm_eapol_timer(env.cfg, sink, true),
            Err(e) => {
                error!("error sending message 1 to {}: {}", MacFmt(&self.addr), e);
                self.request_disconnect(ReasonCode::InvalidAuthentication);
            }
        }
    }

    fn enter_ptk_calc_negotiating(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) {
        self.inputs.eapol_key_received = false;
        self.inputs.update_snonce = false;

        let (pmk, ptk) = match self.derive_ptk_for_msg2(env) {
            Some(keys) => keys,
            None => {
                debug!("invalid MIC in message 2 from {}", MacFmt(&self.addr));
                if self.roll_back_snonce_update() {
                    // Message 3 stays outstanding under the current PTK.
                    info!("dropping SNonce update from {}", MacFmt(&self.addr));
                    self.ptk_state = PtkState::PtkInitNegotiating;
                }
                return;
            }
        };
        self.snonce_rollback = None;
        if let Some(assoc_rsne) = &self.assoc_rsne {
            let msg2_rsne = self.msg2_rsne(env.cfg);
            if msg2_rsne.as_ref().map(|rsne| &rsne[..]) != Some(&assoc_rsne[..]) {
                warn!("RSNE in message 2 from {} differs from association", MacFmt(&self.addr));
                self.request_disconnect(ReasonCode::Ie4wayDiffers);
                return;
            }
        }

        sink.push(SecAssocUpdate::CancelEapolTimeout);
        self.pmk = Some(pmk);
        self.ptk = Some(ptk);
        self.ptk_valid = true;
        self.inputs.mic_verified = true;
    }

    /// RSNE carried in the cached message 2.
    fn msg2_rsne(&self, cfg: &Config) -> Option<Vec<u8>> {
        let frame =
            eapol::key_frame_from_bytes(&self.last_rx_eapol_key[..], cfg.akm.mic_bytes()).ok()?;
        let elements = key_data::extract_elements(&frame.key_data[..]).ok()?;
        key_data::first_rsne(&elements[..]).map(|rsne| rsne.to_vec())
    }

    fn enter_ptk_init_negotiating(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) {
        self.inputs.timeout_evt = false;
        self.timeout_ctr += 1;
        if self.timeout_ctr > env.cfg.pairwise_update_count {
            return;
        }

        let gtk = env.group.gtk();
        if gtk.is_empty() {
            error!("no GTK available for message 3 to {}", MacFmt(&self.addr));
            self.request_disconnect(ReasonCode::InvalidAuthentication);
            return;
        }
        let mut w = kde::Writer::new();
        w.write_rsne(&env.cfg.rsne[..]);
        w.write_gtk(&kde::Gtk::new(env.group.gn(), kde::GtkInfoTx::BothRxTx, gtk.as_bytes()));
        let key_data = w.finalize_for_encryption();

        let mut key_info = KeyInformation(0);
        key_info.set_key_type(eapol::KEY_TYPE_PAIRWISE);
        key_info.set_install(self.pair);
        key_info.set_key_ack(true);
        key_info.set_key_mic(true);
        key_info.set_secure(true);
        key_info.set_encrypted_key_data(true);
        let key_len = env.cfg.pairwise_cipher.tk_bytes() as u16;
        let anonce = self.anonce;
        let rsc = env.group_seqnum;
        match self.send_eapol_key(env, sink, key_info, key_len, anonce, rsc, key_data) {
            Ok(()) => self.arm_eapol_timer(env.cfg, sink, true),
            Err(e) => {
                error!("error sending message 3 to {}: {}", MacFmt(&self.addr), e);
                self.request_disconnect(ReasonCode::InvalidAuthentication);
            }
        }
    }

    fn enter_ptk_init_done(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) {
        sink.push(SecAssocUpdate::CancelEapolTimeout);
        self.inputs.eapol_key_received = false;
        if self.pair {
            match self.ptk.as_ref() {
                Some(ptk) => sink.push(SecAssocUpdate::Key(Key::Ptk(ptk.clone()))),
                None => {
                    error!("completed 4-Way Handshake without PTK");
                    self.request_disconnect(ReasonCode::InvalidAuthentication);
                    return;
                }
            }
            self.pairwise_set = true;
        }
        if let Some(interval) = env.cfg.ptk_rekey_interval {
            sink.push(SecAssocUpdate::SchedulePtkRekey(interval));
        }
        self.has_gtk = true;
        info!("established PTKSA with {}", MacFmt(&self.addr));
    }
}
