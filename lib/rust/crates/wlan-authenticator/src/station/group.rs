// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::{Station, StepEnv};
use crate::config::Config;
use crate::device::ReasonCode;
use crate::group_key::GroupState;
use crate::key_data::kde;
use crate::rsna::UpdateSink;
use crate::MacFmt;
use eapol::KeyInformation;
use log::{debug, error, info, warn};

/// States of the authenticator's per-station Group Key Handshake state machine.
/// IEEE Std 802.11-2016, 12.7.10.2, Figure 12-52
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtkGroupState {
    Idle,
    RekeyNegotiating,
    RekeyEstablished,
    KeyError,
}

impl Station {
    pub(super) fn next_group_state(&self, cfg: &Config) -> Option<PtkGroupState> {
        let inputs = &self.inputs;
        if inputs.init || inputs.ptk_group_init {
            return Some(PtkGroupState::Idle);
        }
        let group_frame =
            inputs.eapol_key_received && !inputs.eapol_key_request && !inputs.eapol_key_pairwise;
        match self.group_state {
            PtkGroupState::Idle if inputs.g_update_station_keys => {
                Some(PtkGroupState::RekeyNegotiating)
            }
            PtkGroupState::Idle => None,
            PtkGroupState::RekeyNegotiating if group_frame && inputs.mic_verified => {
                Some(PtkGroupState::RekeyEstablished)
            }
            PtkGroupState::RekeyNegotiating if self.g_timeout_ctr > cfg.group_update_count => {
                Some(PtkGroupState::KeyError)
            }
            PtkGroupState::RekeyNegotiating if inputs.timeout_evt => {
                Some(PtkGroupState::RekeyNegotiating)
            }
            PtkGroupState::RekeyNegotiating => None,
            PtkGroupState::RekeyEstablished | PtkGroupState::KeyError => Some(PtkGroupState::Idle),
        }
    }

    /// Runs one transition of the group machine. Returns whether it made progress.
    pub(super) fn step_group(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) -> bool {
        let next = match self.next_group_state(env.cfg) {
            Some(next) => next,
            None => return false,
        };
        debug!("{}: {:?} -> {:?}", MacFmt(&self.addr), self.group_state, next);
        self.group_state = next;

        match next {
            PtkGroupState::Idle => {
                self.inputs.ptk_group_init = false;
                self.g_timeout_ctr = 0;
            }
            PtkGroupState::RekeyNegotiating => self.enter_rekey_negotiating(env, sink),
            PtkGroupState::RekeyEstablished => {
                self.inputs.eapol_key_received = false;
                self.release_group_update(env.group);
                self.g_timeout_ctr = 0;
                self.has_gtk = true;
                info!("sent GTK {} to {}", env.group.gn(), MacFmt(&self.addr));
            }
            PtkGroupState::KeyError => {
                self.release_group_update(env.group);
                warn!("Group Key Handshake with {} timed out", MacFmt(&self.addr));
                self.request_disconnect(ReasonCode::GkHandshakeTimeout);
            }
        }
        !(next == PtkGroupState::Idle && self.inputs.init)
    }

    fn enter_rekey_negotiating(&mut self, env: &mut StepEnv<'_>, sink: &mut UpdateSink) {
        self.g_timeout_ctr += 1;
        if self.g_timeout_ctr > env.cfg.group_update_count {
            // Giving up with the next step.
            return;
        }
        self.inputs.timeout_evt = false;

        // The sequence counter is only meaningful once the key is in use.
        let rsc =
            if env.group.state() == GroupState::SetKeysDone { env.group_seqnum } else { 0 };
        let gtk = env.group.gtk();
        let mut w = kde::Writer::new();
        w.write_gtk(&kde::Gtk::new(env.group.gn(), kde::GtkInfoTx::BothRxTx, gtk.as_bytes()));
        let key_data = w.finalize_for_encryption();

        let mut key_info = KeyInformation(0);
        key_info.set_install(!self.pair);
        key_info.set_key_ack(true);
        key_info.set_key_mic(true);
        key_info.set_secure(true);
        key_info.set_encrypted_key_data(true);
        match self.send_eapol_key(env, sink, key_info, 0, [0u8; 32], rsc, key_data) {
            Ok(()) => self.arm_eapol_timer(env.cfg, sink, false),
            Err(e) => {
                error!("error sending group message 1 to {}: {}", MacFmt(&self.addr), e);
                self.request_disconnect(ReasonCode::InvalidAuthentication);
            }
        }
    }
}
