// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Pmk;
use crate::crypto_utils::{kdf_sha256, nonce::Nonce, prf};
use crate::{Error, MacAddr};
use std::cmp::{max, min};
use std::fmt;
use zeroize::Zeroize;

const KCK_LEN: usize = 16;
const KEK_LEN: usize = 16;
const TK_LEN: usize = 16;
pub const PTK_LEN: usize = KCK_LEN + KEK_LEN + TK_LEN;

const PTK_LABEL: &str = "Pairwise key expansion";

/// Pairwise Transient Key for a CCMP-128 pairwise cipher.
/// IEEE Std 802.11-2016, 12.7.1.3, Figure 12-30
#[derive(Clone, PartialEq, Eq)]
pub struct Ptk {
    bytes: Vec<u8>,
}

impl Ptk {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() != PTK_LEN {
            return Err(Error::InvalidKeyLength(bytes.len(), PTK_LEN));
        }
        Ok(Ptk { bytes })
    }

    pub fn kck(&self) -> &[u8] {
        &self.bytes[..KCK_LEN]
    }

    pub fn kek(&self) -> &[u8] {
        &self.bytes[KCK_LEN..KCK_LEN + KEK_LEN]
    }

    pub fn tk(&self) -> &[u8] {
        &self.bytes[KCK_LEN + KEK_LEN..]
    }
}

impl fmt::Debug for Ptk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ptk(..)")
    }
}

impl Drop for Ptk {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Derives the PTK from the PMK and both parties' addresses and nonces.
/// IEEE Std 802.11-2016, 12.7.1.3
pub fn derive_ptk(
    pmk: &Pmk,
    aa: &MacAddr,
    spa: &MacAddr,
    anonce: &Nonce,
    snonce: &Nonce,
    use_sha256: bool,
) -> Result<Ptk, Error> {
    let mut data = Vec::with_capacity(2 * 6 + 2 * 32);
    data.extend_from_slice(&min(aa, spa)[..]);
    data.extend_from_slice(&max(aa, spa)[..]);
    data.extend_from_slice(&min(anonce, snonce)[..]);
    data.extend_from_slice(&max(anonce, snonce)[..]);

    let bits = PTK_LEN * 8;
    let bytes = if use_sha256 {
        kdf_sha256(pmk.as_bytes(), PTK_LABEL, &data[..], bits)?
    } else {
        prf(pmk.as_bytes(), PTK_LABEL, &data[..], bits)?
    };
    data.zeroize();
    Ptk::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsna::test_util;
    use test_case::test_case;

    fn derive(use_sha256: bool) -> Ptk {
        derive_ptk(
            &test_util::get_pmk(),
            &test_util::A_ADDR,
            &test_util::S_ADDR,
            &[0x11; 32],
            &[0x22; 32],
            use_sha256,
        )
        .expect("error deriving PTK")
    }

    #[test]
    fn test_split() {
        let ptk = Ptk::from_bytes((0..48).collect()).expect("error creating PTK");
        assert_eq!(ptk.kck(), &(0..16).collect::<Vec<u8>>()[..]);
        assert_eq!(ptk.kek(), &(16..32).collect::<Vec<u8>>()[..]);
        assert_eq!(ptk.tk(), &(32..48).collect::<Vec<u8>>()[..]);
    }

    #[test]
    fn test_invalid_length() {
        assert!(Ptk::from_bytes(vec![0; 47]).is_err());
    }

    #[test_case(false; "prf_sha1")]
    #[test_case(true; "kdf_sha256")]
    fn test_deterministic(use_sha256: bool) {
        assert_eq!(derive(use_sha256), derive(use_sha256));
    }

    #[test]
    fn test_sha256_differs_from_prf() {
        assert_ne!(derive(false).tk(), derive(true).tk());
    }

    #[test]
    fn test_symmetric_in_roles() {
        // Addresses and nonces are ordered before hashing so the supplicant derives the same key.
        let pmk = test_util::get_pmk();
        let ptk_a = derive_ptk(
            &pmk,
            &test_util::A_ADDR,
            &test_util::S_ADDR,
            &[0x11; 32],
            &[0x22; 32],
            false,
        )
        .expect("error deriving PTK");
        let ptk_s = derive_ptk(
            &pmk,
            &test_util::S_ADDR,
            &test_util::A_ADDR,
            &[0x22; 32],
            &[0x11; 32],
            false,
        )
        .expect("error deriving PTK");
        assert_eq!(ptk_a, ptk_s);
    }

    #[test]
    fn test_every_input_changes_tk() {
        let pmk = test_util::get_pmk();
        let other_pmk = Pmk::from([0x55; 32]);
        let base = derive(false);
        let variants = vec![
            derive_ptk(&other_pmk, &test_util::A_ADDR, &test_util::S_ADDR, &[0x11; 32], &[0x22; 32], false),
            derive_ptk(&pmk, &[0x1D, 0xE3, 0xFD, 0xDF, 0xCB, 0xD4], &test_util::S_ADDR, &[0x11; 32], &[0x22; 32], false),
            derive_ptk(&pmk, &test_util::A_ADDR, &[0x81, 0x76, 0x61, 0x14, 0xDF, 0xCA], &[0x11; 32], &[0x22; 32], false),
            derive_ptk(&pmk, &test_util::A_ADDR, &test_util::S_ADDR, &[0x12; 32], &[0x22; 32], false),
            derive_ptk(&pmk, &test_util::A_ADDR, &test_util::S_ADDR, &[0x11; 32], &[0x23; 32], false),
        ];
        for ptk in variants {
            assert_ne!(ptk.expect("error deriving PTK").tk(), base.tk());
        }
    }

    #[test]
    fn test_matches_prf_over_ordered_data() {
        let pmk = test_util::get_pmk();
        let mut data = vec![];
        // A_ADDR sorts below S_ADDR.
        data.extend_from_slice(&test_util::A_ADDR[..]);
        data.extend_from_slice(&test_util::S_ADDR[..]);
        data.extend_from_slice(&[0x11; 32][..]);
        data.extend_from_slice(&[0x22; 32][..]);
        let expected = prf(pmk.as_bytes(), "Pairwise key expansion", &data[..], 384)
            .expect("error computing PRF");
        assert_eq!(derive(false).kck(), &expected[..16]);
        assert_eq!(derive(false).tk(), &expected[32..]);
    }
}
