// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::integrity::integrity_algorithm;
use crate::key::ptk::Ptk;
use crate::keywrap::keywrap_algorithm;
use crate::Error;
use bytes::Bytes;
use eapol::{KeyDescriptor, KeyFrame, KeyInformation, PacketType, KEY_IV_LEN, KEY_MIC_OFFSET};

/// EAPOL-Key messages an Authenticator can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Pairwise2,
    Pairwise4,
    Group2,
    Request,
    /// SMK and STSL messages are recognized but not supported.
    Smk,
}

pub fn classify(frame: &KeyFrame) -> MessageKind {
    let key_info = frame.key_info;
    if key_info.smk_message() {
        MessageKind::Smk
    } else if key_info.request() {
        MessageKind::Request
    } else if key_info.key_type() != eapol::KEY_TYPE_PAIRWISE {
        MessageKind::Group2
    } else if frame.key_data_len == 0 {
        MessageKind::Pairwise4
    } else {
        MessageKind::Pairwise2
    }
}

/// Fields of an outbound EAPOL-Key frame. The remaining fields are derived.
pub struct KeyFrameFields {
    pub eapol_version: u8,
    pub key_info: KeyInformation,
    pub key_len: u16,
    pub key_replay_counter: u64,
    pub key_nonce: [u8; 32],
    pub key_rsc: u64,
    /// Plaintext key data. Wrapped with the KEK if the key information requests encryption.
    pub key_data: Vec<u8>,
    pub mic_len: u16,
}

/// Builds an EAPOL-Key frame. The MIC, if requested, is computed last over the complete frame.
pub fn build(fields: KeyFrameFields, ptk: Option<&Ptk>) -> Result<Vec<u8>, Error> {
    let key_info = fields.key_info;
    let version = key_info.key_descriptor_version();
    let key_data = if key_info.encrypted_key_data() {
        let ptk = ptk.ok_or(Error::NoPtk)?;
        let algorithm =
            keywrap_algorithm(version).ok_or(Error::UnsupportedKeyDescriptorVersion(version))?;
        algorithm.wrap(ptk.kek(), &fields.key_data[..])?
    } else {
        fields.key_data
    };

    let mut frame = KeyFrame {
        version: fields.eapol_version,
        packet_type: PacketType::Key as u8,
        packet_body_len: 0,
        descriptor_type: KeyDescriptor::Ieee802dot11 as u8,
        key_info,
        key_len: fields.key_len,
        key_replay_counter: fields.key_replay_counter,
        key_nonce: fields.key_nonce,
        key_iv: [0u8; KEY_IV_LEN],
        key_rsc: fields.key_rsc,
        key_mic: Bytes::from(vec![0u8; fields.mic_len as usize]),
        key_data_len: key_data.len() as u16,
        key_data: Bytes::from(key_data),
    };
    frame.update_packet_body_len();

    if key_info.key_mic() {
        let ptk = ptk.ok_or(Error::NoPtk)?;
        frame.key_mic = Bytes::from(compute_mic(ptk.kck(), &frame)?);
    }
    Ok(frame.to_bytes())
}

pub fn compute_mic(kck: &[u8], frame: &KeyFrame) -> Result<Vec<u8>, Error> {
    let version = frame.key_info.key_descriptor_version();
    let algorithm =
        integrity_algorithm(version).ok_or(Error::UnsupportedKeyDescriptorVersion(version))?;
    let mut buf = Vec::with_capacity(frame.len());
    frame.as_bytes(true, &mut buf);
    let mut mic = algorithm.compute(kck, &buf[..])?;
    mic.truncate(frame.key_mic.len());
    Ok(mic)
}

/// Verifies the MIC of a serialized EAPOL-Key frame. `raw` must hold exactly the frame, without
/// link layer padding. The algorithm follows the frame's key descriptor version.
pub fn verify_mic(kck: &[u8], raw: &[u8], mic_len: usize) -> bool {
    if raw.len() < KEY_MIC_OFFSET + mic_len {
        return false;
    }
    let key_info = KeyInformation(u16::from_be_bytes([raw[5], raw[6]]));
    let algorithm = match integrity_algorithm(key_info.key_descriptor_version()) {
        Some(algorithm) => algorithm,
        None => return false,
    };
    let mic_range = KEY_MIC_OFFSET..KEY_MIC_OFFSET + mic_len;
    let mut buf = raw.to_vec();
    let expected = buf[mic_range.clone()].to_vec();
    for b in &mut buf[mic_range] {
        *b = 0;
    }
    algorithm.verify(kck, &buf[..], &expected[..])
}
