// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! IEEE Std 802.1X-2010 EAPOL-Key frames as used by IEEE Std 802.11-2016, 12.7.2.
//!
//! This crate knows the wire layout only. It neither verifies MICs nor decrypts key data; both
//! depend on negotiated keys and are left to the RSN layer.

use bitfield::bitfield;
use bytes::{BufMut, Bytes};
use nom::number::complete::{be_u16, be_u64, be_u8, le_u64};
use nom::{call, do_parse, map, named, named_args, take, IResult};
use thiserror::Error;

/// Length of the 802.1X header: protocol version, packet type and packet body length.
pub const HEADER_LEN: usize = 4;
/// Octets of a key descriptor which precede the variable length MIC.
pub const KEY_DESCRIPTOR_FIXED_LEN: usize = 77;
/// Offset of the Key MIC field from the start of the EAPOL frame.
pub const KEY_MIC_OFFSET: usize = HEADER_LEN + KEY_DESCRIPTOR_FIXED_LEN;
pub const KEY_NONCE_LEN: usize = 32;
pub const KEY_IV_LEN: usize = 16;

// IEEE Std 802.11-2016, 12.7.2 b.2)
pub const KEY_TYPE_GROUP_SMK: u16 = 0;
pub const KEY_TYPE_PAIRWISE: u16 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("frame too short for EAPOL header: {} bytes", _0)]
    TooShort(usize),
    #[error("unsupported EAPOL packet type: {}", _0)]
    UnsupportedPacketType(u8),
    #[error("EAPOL body length {} exceeds remaining {} bytes", declared, available)]
    BodyLengthOverflow { declared: usize, available: usize },
    #[error("EAPOL-Key descriptor truncated")]
    TruncatedKeyDescriptor,
    #[error("key data length {} exceeds remaining {} bytes", declared, available)]
    KeyDataLengthOverflow { declared: usize, available: usize },
    #[error("{} trailing bytes after key data", _0)]
    TrailingBytes(usize),
}

// IEEE Std 802.1X-2010, 11.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Ieee802dot1x2001 = 1,
    Ieee802dot1x2004 = 2,
    Ieee802dot1x2010 = 3,
}

// IEEE Std 802.1X-2010, 11.3.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Eap = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
    AsfAlert = 4,
}

// IEEE Std 802.1X-2010, 11.9, Table 11-5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDescriptor {
    Rc4 = 1,
    Ieee802dot11 = 2,
    // Only valid for WPA1 frames; tolerated for message 4 of the 4-Way Handshake.
    LegacyWpa1 = 254,
}

// IEEE Std 802.11-2016, 12.7.2, Figure 12-33
bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct KeyInformation(u16);
    impl Debug;
    pub key_descriptor_version, set_key_descriptor_version: 2, 0;
    pub key_type, set_key_type: 3, 3;
    // Bit 4-5 reserved.
    pub install, set_install: 6;
    pub key_ack, set_key_ack: 7;
    pub key_mic, set_key_mic: 8;
    pub secure, set_secure: 9;
    pub error, set_error: 10;
    pub request, set_request: 11;
    pub encrypted_key_data, set_encrypted_key_data: 12;
    pub smk_message, set_smk_message: 13;
    // Bit 14-15 reserved.
    pub value, _: 15, 0;
}

/// An EAPOL frame carrying an EAPOL-Key descriptor.
///
/// The Key MIC field is variable length; its size depends on the negotiated AKM and must be
/// known when parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFrame {
    pub version: u8,
    pub packet_type: u8,
    pub packet_body_len: u16,

    pub descriptor_type: u8,
    pub key_info: KeyInformation,
    pub key_len: u16,
    pub key_replay_counter: u64,
    pub key_nonce: [u8; KEY_NONCE_LEN],
    pub key_iv: [u8; KEY_IV_LEN],
    // Octets are carried in transmit order which is little endian for CCMP packet numbers.
    pub key_rsc: u64,
    // 8 octets reserved.
    pub key_mic: Bytes,
    pub key_data_len: u16,
    pub key_data: Bytes,
}

impl KeyFrame {
    /// Total length of the frame including the 802.1X header.
    pub fn len(&self) -> usize {
        HEADER_LEN + KEY_DESCRIPTOR_FIXED_LEN + self.key_mic.len() + 2 + self.key_data.len()
    }

    pub fn update_packet_body_len(&mut self) {
        self.packet_body_len = (self.len() - HEADER_LEN) as u16;
    }

    /// Serializes the frame into `buf`. If `clear_mic` is set the Key MIC field is written as
    /// zeros, which is the form MICs are computed over.
    pub fn as_bytes(&self, clear_mic: bool, buf: &mut Vec<u8>) {
        buf.reserve(self.len());
        buf.put_u8(self.version);
        buf.put_u8(self.packet_type);
        buf.put_u16(self.packet_body_len);
        buf.put_u8(self.descriptor_type);
        buf.put_u16(self.key_info.value());
        buf.put_u16(self.key_len);
        buf.put_u64(self.key_replay_counter);
        buf.put_slice(&self.key_nonce[..]);
        buf.put_slice(&self.key_iv[..]);
        buf.put_u64_le(self.key_rsc);
        buf.put_slice(&[0u8; 8][..]);
        if clear_mic {
            buf.resize(buf.len() + self.key_mic.len(), 0);
        } else {
            buf.put_slice(&self.key_mic[..]);
        }
        buf.put_u16(self.key_data_len);
        buf.put_slice(&self.key_data[..]);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        self.as_bytes(false, &mut buf);
        buf
    }
}

pub fn to_array<A>(slice: &[u8]) -> A
where
    A: Sized + Default + AsMut<[u8]>,
{
    let mut array = Default::default();
    <A as AsMut<[u8]>>::as_mut(&mut array).clone_from_slice(slice);
    array
}

named!(parse_header<&[u8], (u8, u8, u16)>,
       do_parse!(
           version: be_u8 >>
           packet_type: be_u8 >>
           packet_body_len: be_u16 >>
           ((version, packet_type, packet_body_len))
    )
);

named_args!(parse_key_descriptor(mic_len: usize) <KeyFrame>,
       do_parse!(
           descriptor_type: be_u8 >>
           key_info: map!(be_u16, KeyInformation) >>
           key_len: be_u16 >>
           key_replay_counter: be_u64 >>
           key_nonce: take!(KEY_NONCE_LEN) >>
           key_iv: take!(KEY_IV_LEN) >>
           key_rsc: le_u64 >>
           /* 8 octets reserved */ take!(8) >>
           key_mic: take!(mic_len) >>
           key_data_len: be_u16 >>
           (KeyFrame {
                version: 0,
                packet_type: 0,
                packet_body_len: 0,
                descriptor_type,
                key_info,
                key_len,
                key_replay_counter,
                key_nonce: to_array(key_nonce),
                key_iv: to_array(key_iv),
                key_rsc,
                key_mic: Bytes::copy_from_slice(key_mic),
                key_data_len,
                key_data: Bytes::new(),
           })
    )
);

fn parsed<T>(result: IResult<&[u8], T>) -> Option<(&[u8], T)> {
    result.ok()
}

/// Parses an EAPOL-Key frame.
///
/// The declared packet body must fit the buffer; octets following the body are link layer
/// padding and ignored. Within the body, the declared key data length must consume the
/// remaining octets exactly.
pub fn key_frame_from_bytes(input: &[u8], mic_len: u16) -> Result<KeyFrame, Error> {
    let (body, (version, packet_type, packet_body_len)) =
        parsed(parse_header(input)).ok_or(Error::TooShort(input.len()))?;
    if packet_type != PacketType::Key as u8 {
        return Err(Error::UnsupportedPacketType(packet_type));
    }
    let declared = packet_body_len as usize;
    if declared > body.len() {
        return Err(Error::BodyLengthOverflow { declared, available: body.len() });
    }
    let body = &body[..declared];

    let (key_data, mut frame) = parsed(parse_key_descriptor(body, mic_len as usize))
        .ok_or(Error::TruncatedKeyDescriptor)?;
    let key_data_len = frame.key_data_len as usize;
    if key_data_len > key_data.len() {
        return Err(Error::KeyDataLengthOverflow {
            declared: key_data_len,
            available: key_data.len(),
        });
    }
    if key_data_len < key_data.len() {
        return Err(Error::TrailingBytes(key_data.len() - key_data_len));
    }

    frame.version = version;
    frame.packet_type = packet_type;
    frame.packet_body_len = packet_body_len;
    frame.key_data = Bytes::copy_from_slice(key_data);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn make_frame(key_data: Vec<u8>) -> KeyFrame {
        let mut frame = KeyFrame {
            version: ProtocolVersion::Ieee802dot1x2004 as u8,
            packet_type: PacketType::Key as u8,
            packet_body_len: 0,
            descriptor_type: KeyDescriptor::Ieee802dot11 as u8,
            key_info: KeyInformation(0x13ca),
            key_len: 16,
            key_replay_counter: 0x0102_0304_0506_0708,
            key_nonce: [0xAB; KEY_NONCE_LEN],
            key_iv: [0u8; KEY_IV_LEN],
            key_rsc: 0x0000_0000_0000_0105,
            key_mic: Bytes::from(vec![0xCD; 16]),
            key_data_len: key_data.len() as u16,
            key_data: Bytes::from(key_data),
        };
        frame.update_packet_body_len();
        frame
    }

    #[test]
    fn key_information_bits() {
        let info = KeyInformation(0x13ca);
        assert_eq!(info.key_descriptor_version(), 2);
        assert_eq!(info.key_type(), KEY_TYPE_PAIRWISE);
        assert!(info.install());
        assert!(info.key_ack());
        assert!(info.key_mic());
        assert!(info.secure());
        assert!(!info.error());
        assert!(!info.request());
        assert!(info.encrypted_key_data());
        assert!(!info.smk_message());

        let mut info = KeyInformation(0);
        info.set_key_descriptor_version(2);
        info.set_key_type(KEY_TYPE_PAIRWISE);
        info.set_key_ack(true);
        assert_eq!(info.value(), 0x008a);
    }

    #[test]
    fn serialize_layout() {
        let frame = make_frame(vec![1, 2, 3]);
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), frame.len());
        assert_eq!(frame.packet_body_len as usize, bytes.len() - HEADER_LEN);
        assert_eq!(&bytes[..4], &[2, 3, 0, 98][..]);
        assert_eq!(bytes[4], 2);
        assert_eq!(&bytes[5..7], &[0x13, 0xca][..]);
        assert_eq!(&bytes[9..17], &[1, 2, 3, 4, 5, 6, 7, 8][..]);
        // Key RSC is little endian.
        assert_eq!(&bytes[65..73], &[5, 1, 0, 0, 0, 0, 0, 0][..]);
        assert_eq!(&bytes[KEY_MIC_OFFSET..KEY_MIC_OFFSET + 16], &[0xCD; 16][..]);
        assert_eq!(&bytes[bytes.len() - 5..], &[0, 3, 1, 2, 3][..]);
    }

    #[test]
    fn serialize_with_cleared_mic() {
        let frame = make_frame(vec![]);
        let mut buf = vec![];
        frame.as_bytes(true, &mut buf);
        assert!(buf[KEY_MIC_OFFSET..KEY_MIC_OFFSET + 16].iter().all(|&b| b == 0));
    }

    #[test]
    fn parse_serialized_frame() {
        let frame = make_frame(vec![0xDD, 0x00, 0x11]);
        let parsed = key_frame_from_bytes(&frame.to_bytes()[..], 16).expect("error parsing frame");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn parse_ignores_link_layer_padding() {
        let frame = make_frame(vec![7; 8]);
        let mut bytes = frame.to_bytes();
        bytes.extend_from_slice(&[0u8; 10]);
        let parsed = key_frame_from_bytes(&bytes[..], 16).expect("error parsing padded frame");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn parse_truncated_header() {
        assert_matches!(key_frame_from_bytes(&[1, 3, 0][..], 16), Err(Error::TooShort(3)));
    }

    #[test]
    fn parse_non_key_frame() {
        let mut bytes = make_frame(vec![]).to_bytes();
        bytes[1] = PacketType::Eap as u8;
        assert_matches!(
            key_frame_from_bytes(&bytes[..], 16),
            Err(Error::UnsupportedPacketType(0))
        );
    }

    #[test]
    fn parse_body_length_overflow() {
        let mut bytes = make_frame(vec![]).to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert_matches!(
            key_frame_from_bytes(&bytes[..], 16),
            Err(Error::BodyLengthOverflow { .. })
        );
    }

    #[test]
    fn parse_key_data_length_overflow() {
        let mut frame = make_frame(vec![1, 2, 3]);
        frame.key_data_len = 4;
        assert_matches!(
            key_frame_from_bytes(&frame.to_bytes()[..], 16),
            Err(Error::KeyDataLengthOverflow { declared: 4, available: 3 })
        );
    }

    #[test]
    fn parse_key_data_shorter_than_body() {
        let mut frame = make_frame(vec![1, 2, 3]);
        frame.key_data_len = 1;
        assert_matches!(
            key_frame_from_bytes(&frame.to_bytes()[..], 16),
            Err(Error::TrailingBytes(2))
        );
    }

    #[test]
    fn parse_wrong_mic_len() {
        let frame = make_frame(vec![]);
        // A 24 octet MIC swallows the key data length field and more.
        assert_matches!(
            key_frame_from_bytes(&frame.to_bytes()[..], 24),
            Err(Error::TruncatedKeyDescriptor)
        );
    }

    #[test]
    fn parse_known_message_1() {
        let bytes = hex::decode(concat!(
            "0203005f",
            "02008a0010",
            "0000000000000001",
            "3e8e967dacd960324cac5b6aa721235bf57b949771c867989f49d04ed47c6933",
            "00000000000000000000000000000000",
            "0000000000000000",
            "0000000000000000",
            "00000000000000000000000000000000",
            "0000",
        ))
        .expect("invalid hex");
        let frame = key_frame_from_bytes(&bytes[..], 16).expect("error parsing msg 1");
        assert_eq!(frame.key_info.value(), 0x008a);
        assert_eq!(frame.key_len, 16);
        assert_eq!(frame.key_replay_counter, 1);
        assert_eq!(frame.key_nonce[0], 0x3e);
        assert_eq!(frame.key_data_len, 0);
        assert_eq!(frame.to_bytes(), bytes);
    }
}
