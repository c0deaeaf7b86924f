// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Authenticator side of the IEEE Std 802.11-2016 RSNA key management: the 4-Way Handshake and
//! the Group Key Handshake an access point runs with every associated station.
//!
//! Inbound EAPOL-Key frames and timer expiries are fed to an [`Authenticator`]. It drives one
//! pairwise and one group state machine per station plus a shared group key context until all of
//! them settle, then hands frames to a [`Transport`] and keys to a [`Driver`].

pub mod authenticator;
pub mod config;
pub mod crypto_utils;
pub mod device;
pub mod group_key;
pub mod integrity;
pub mod key;
pub mod key_data;
pub mod keywrap;
pub mod message;
pub mod psk;
pub mod replay;
pub mod rsna;
pub mod station;
pub mod suite;
pub mod timer;

pub use crate::{
    authenticator::Authenticator,
    config::Config,
    crypto_utils::nonce::{OsRandom, RandomSource},
    device::{Driver, ReasonCode, Transport},
    key::{ptk::derive_ptk, Pmk},
    psk::{PskProvider, StaticPskProvider},
    timer::{EventId, Scheduler},
};

use thiserror::Error;

pub type MacAddr = [u8; 6];

pub(crate) struct MacFmt<'a>(pub &'a MacAddr);

impl<'a> std::fmt::Display for MacFmt<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mac = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("error parsing EAPOL frame: {}", _0)]
    InvalidFrame(#[from] eapol::Error),
    #[error("unsupported EAPOL-Key descriptor type: {}", _0)]
    UnsupportedDescriptorType(u8),
    #[error("unexpected key descriptor version: {} (expected {})", _0, _1)]
    UnexpectedKeyDescriptorVersion(u16, u16),
    #[error("unsupported key descriptor version: {}", _0)]
    UnsupportedKeyDescriptorVersion(u16),
    #[error("SMK/STSL EAPOL-Key messages are not supported")]
    UnsupportedSmkMessage,
    #[error("EAPOL-Key request with error bit set is not supported")]
    UnsupportedErrorRequest,
    #[error("received {:?} while not expecting it", _0)]
    UnexpectedMessage(message::MessageKind),
    #[error("unexpected key information: {:#06x}", _0)]
    UnexpectedKeyInformation(u16),
    #[error("invalid MIC")]
    InvalidMic,
    #[error("invalid key replay counter {}", _0)]
    InvalidKeyReplayCounter(u64),
    #[error("invalid request replay counter {}; last was {}", _0, _1)]
    InvalidRequestReplayCounter(u64, u64),
    #[error("invalid key data length {}; must be a multiple of 8 and at least 16 octets", _0)]
    InvalidKeyDataLength(usize),
    #[error("AES key unwrap integrity check failed")]
    WrongAesKeywrapKey,
    #[error("invalid key length {} (expected {})", _0, _1)]
    InvalidKeyLength(usize, usize),
    #[error("HMAC rejected a key of {} octets", _0)]
    InvalidHmacKey(usize),
    #[error("error parsing key data")]
    InvalidKeyData,
    #[error("no PTK available")]
    NoPtk,
    #[error("unsupported cipher suite: {:?}", _0)]
    UnsupportedCipher(suite::Cipher),
    #[error("invalid configuration: {}", _0)]
    InvalidConfig(&'static str),
    #[error("failed to obtain random bytes: {}", _0)]
    RandomSource(String),
}
