// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod kde;

use crate::Error;
use nom::number::complete::le_u8;
use nom::{do_parse, named, take, IResult};

// IEEE Std 802.11-2016, 9.4.2.1, Table 9-77
const RSNE_ID: u8 = 48;

#[derive(Debug, PartialEq)]
pub enum Element {
    Gtk(kde::Header, kde::Gtk),
    /// An RSN information element, kept in its encoded form including id and length.
    Rsne(Vec<u8>),
    Padding,
    UnsupportedKde(kde::Header),
    UnsupportedIe(u8, u8),
}

named!(parse_ie<&[u8], (u8, u8, &[u8])>,
       do_parse!(
           id: le_u8 >>
           len: le_u8 >>
           body: take!(len) >>
           ((id, len, body))
    )
);

fn parse_element(input: &[u8]) -> IResult<&[u8], Element> {
    if input[0] == kde::TYPE {
        return kde::parse(input);
    }
    let (remaining, (id, len, _)) = parse_ie(input)?;
    match id {
        RSNE_ID => {
            let consumed = input.len() - remaining.len();
            Ok((remaining, Element::Rsne(input[..consumed].to_vec())))
        }
        _ => Ok((remaining, Element::UnsupportedIe(id, len))),
    }
}

/// Splits plaintext key data into its information elements and KDEs.
pub fn extract_elements(key_data: &[u8]) -> Result<Vec<Element>, Error> {
    let mut elements = vec![];
    let mut remaining = key_data;
    while !remaining.is_empty() {
        match parse_element(remaining) {
            Ok((rest, element)) => {
                elements.push(element);
                remaining = rest;
            }
            Err(_) => return Err(Error::InvalidKeyData),
        }
    }
    Ok(elements)
}

/// Returns the first RSN information element in the key data, if any.
pub fn first_rsne(elements: &[Element]) -> Option<&[u8]> {
    elements.iter().find_map(|e| match e {
        Element::Rsne(rsne) => Some(&rsne[..]),
        _ => None,
    })
}
