// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Element;
use bitfield::bitfield;
use nom::error::ErrorKind;
use nom::number::complete::le_u8;
use nom::{do_parse, named, take, IResult};

/// Element id shared by all KDEs and the key data padding.
pub const TYPE: u8 = 0xDD;
pub const OUI_DOT11: [u8; 3] = [0x00, 0x0F, 0xAC];

/// Type, length, OUI and data type.
const HDR_LEN: usize = 6;
/// OUI and data type, which the length field covers.
const OUI_AND_DATA_TYPE_LEN: usize = 4;
// Key info and reserved octet.
const GTK_INFO_LEN: usize = 2;

// IEEE Std 802.11-2016, 12.7.2, Table 12-6
const GTK_DATA_TYPE: u8 = 1;

// IEEE Std 802.11-2016, 12.7.2, Figure 12-34
#[derive(Default, Debug, PartialEq)]
pub struct Header {
    pub type_: u8,
    pub len: u8,
    pub oui: [u8; 3],
    pub data_type: u8,
}

impl Header {
    fn dot11(data_type: u8, body_len: usize) -> Header {
        Header {
            type_: TYPE,
            len: (OUI_AND_DATA_TYPE_LEN + body_len) as u8,
            oui: OUI_DOT11,
            data_type,
        }
    }

    fn body_len(&self) -> usize {
        (self.len as usize).saturating_sub(OUI_AND_DATA_TYPE_LEN)
    }
}

// IEEE Std 802.11-2016, 12.7.2, j)
pub enum GtkInfoTx {
    _OnlyRx = 0,
    BothRxTx = 1,
}

// IEEE Std 802.11-2016, 12.7.2, Figure 12-35
bitfield! {
    pub struct GtkInfo(u8);
    impl Debug;
    pub key_id, set_key_id: 1, 0;
    pub tx, set_tx: 2, 2;
    // Bit 3-7 reserved.
    pub value, _: 7,0;
}

impl PartialEq for GtkInfo {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// GTK KDE:
/// IEEE Std 802.11-2016, 12.7.2, Figure 12-35
#[derive(Debug, PartialEq)]
pub struct Gtk {
    pub info: GtkInfo,
    pub gtk: Vec<u8>,
}

impl Gtk {
    pub fn new(key_id: u8, tx: GtkInfoTx, gtk: &[u8]) -> Self {
        let mut info = GtkInfo(0);
        info.set_key_id(key_id);
        info.set_tx(tx as u8);
        Gtk { info, gtk: gtk.to_vec() }
    }

    fn body_len(&self) -> usize {
        GTK_INFO_LEN + self.gtk.len()
    }
}

named!(header<&[u8], Header>,
       do_parse!(
           type_: le_u8 >>
           len: le_u8 >>
           oui: take!(3) >>
           data_type: le_u8 >>
           (Header { type_, len, oui: [oui[0], oui[1], oui[2]], data_type })
    )
);

/// Parses the KDE or padding at the start of `input`.
pub fn parse(input: &[u8]) -> IResult<&[u8], Element> {
    // A lone 0xDD or a zero length starts the padding, which runs to the end of the key data.
    if input.len() == 1 || input[1] == 0 {
        return if input[1.min(input.len())..].iter().all(|&b| b == 0) {
            Ok((&input[input.len()..], Element::Padding))
        } else {
            Err(nom::Err::Error((input, ErrorKind::Eof)))
        };
    }

    let (rest, hdr) = header(input)?;
    let body: IResult<&[u8], &[u8]> = take!(rest, hdr.body_len());
    let (rest, body) = body?;
    if hdr.oui != OUI_DOT11 {
        return Ok((rest, Element::UnsupportedKde(hdr)));
    }
    match hdr.data_type {
        GTK_DATA_TYPE if body.len() >= GTK_INFO_LEN => {
            let gtk = Gtk { info: GtkInfo(body[0]), gtk: body[GTK_INFO_LEN..].to_vec() };
            Ok((rest, Element::Gtk(hdr, gtk)))
        }
        _ => Ok((rest, Element::UnsupportedKde(hdr))),
    }
}

/// Assembles the key data of message 3 and group message 1.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::with_capacity(64) }
    }

    /// Writes an already encoded RSN information element.
    pub fn write_rsne(&mut self, rsne: &[u8]) {
        self.buf.extend_from_slice(rsne);
    }

    pub fn write_gtk(&mut self, gtk: &Gtk) {
        let hdr = Header::dot11(GTK_DATA_TYPE, gtk.body_len());
        self.buf.reserve(HDR_LEN + gtk.body_len());
        self.buf.extend_from_slice(&[hdr.type_, hdr.len]);
        self.buf.extend_from_slice(&hdr.oui[..]);
        self.buf.push(hdr.data_type);
        self.buf.extend_from_slice(&[gtk.info.value(), 0]);
        self.buf.extend_from_slice(&gtk.gtk[..]);
    }

    /// Pads the key data for AES key wrap: at least 16 octets and a multiple of 8.
    /// IEEE Std 802.11-2016, 12.7.2 j)
    pub fn finalize_for_encryption(mut self) -> Vec<u8> {
        let len = self.buf.len();
        let padded_len = if len < 16 { 16 } else { (len + 7) / 8 * 8 };
        if padded_len > len {
            self.buf.push(TYPE);
            self.buf.resize(padded_len, 0);
        }
        self.buf
    }
}
