// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Algorithm;
use crate::Error;
use aes::cipher::generic_array::GenericArray;
use aes::{Aes128, BlockDecrypt, BlockEncrypt, NewBlockCipher};

// RFC 3394, 2.2.3.1
const DEFAULT_IV: [u8; 8] = [0xa6; 8];

/// AES Key Wrap with a 128 bit KEK.
/// RFC 3394, 2.2.1 and 2.2.2
pub struct NistAes;

fn cipher(key: &[u8]) -> Result<Aes128, Error> {
    Aes128::new_from_slice(key).map_err(|_| Error::InvalidKeyLength(key.len(), 16))
}

impl Algorithm for NistAes {
    fn wrap(&self, key: &[u8], p: &[u8]) -> Result<Vec<u8>, Error> {
        if p.len() % 8 != 0 || p.len() < 16 {
            return Err(Error::InvalidKeyDataLength(p.len()));
        }
        let cipher = cipher(key)?;
        let n = p.len() / 8;

        let mut a = DEFAULT_IV;
        let mut r = p.to_vec();
        let mut b = GenericArray::clone_from_slice(&[0u8; 16][..]);
        for j in 0..6 {
            for i in 1..=n {
                b[..8].copy_from_slice(&a[..]);
                b[8..].copy_from_slice(&r[(i - 1) * 8..i * 8]);
                cipher.encrypt_block(&mut b);

                let t = ((n * j) + i) as u64;
                a.copy_from_slice(&b[..8]);
                for (x, y) in a.iter_mut().zip(t.to_be_bytes().iter()) {
                    *x ^= y;
                }
                r[(i - 1) * 8..i * 8].copy_from_slice(&b[8..]);
            }
        }

        let mut c = Vec::with_capacity(p.len() + 8);
        c.extend_from_slice(&a[..]);
        c.extend_from_slice(&r[..]);
        Ok(c)
    }

    fn unwrap(&self, key: &[u8], c: &[u8]) -> Result<Vec<u8>, Error> {
        if c.len() % 8 != 0 || c.len() < 24 {
            return Err(Error::InvalidKeyDataLength(c.len()));
        }
        let cipher = cipher(key)?;
        let n = c.len() / 8 - 1;

        let mut a = [0u8; 8];
        a.copy_from_slice(&c[..8]);
        let mut r = c[8..].to_vec();
        let mut b = GenericArray::clone_from_slice(&[0u8; 16][..]);
        for j in (0..6).rev() {
            for i in (1..=n).rev() {
                let t = ((n * j) + i) as u64;
                for (x, y) in a.iter_mut().zip(t.to_be_bytes().iter()) {
                    *x ^= y;
                }
                b[..8].copy_from_slice(&a[..]);
                b[8..].copy_from_slice(&r[(i - 1) * 8..i * 8]);
                cipher.decrypt_block(&mut b);

                a.copy_from_slice(&b[..8]);
                r[(i - 1) * 8..i * 8].copy_from_slice(&b[8..]);
            }
        }

        if a != DEFAULT_IV {
            return Err(Error::WrongAesKeywrapKey);
        }
        Ok(r)
    }
}
