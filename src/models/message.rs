// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Diameter message framing (RFC 6733 §3): the 20-byte header plus the
//! packed AVP list.

use anyhow::{Result, ensure};
use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32,
    Unaligned,
};

use crate::models::{
    avp::{Avp, decode_list},
    dict,
};

pub const HEADER_LEN: usize = 20;
pub const DIAMETER_VERSION: u8 = 1;

pub const FLAG_REQUEST: u8 = 0x80;
pub const FLAG_PROXYABLE: u8 = 0x40;
pub const FLAG_ERROR: u8 = 0x20;

/// Wire form of the Diameter header.
#[repr(C)]
#[derive(Debug, ZFromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct RawHeader {
    pub version: u8,
    pub length: [u8; 3],
    pub flags: u8,
    pub code: [u8; 3],
    pub application_id: U32<BigEndian>,
    pub hop_by_hop: U32<BigEndian>,
    pub end_to_end: U32<BigEndian>,
}

impl RawHeader {
    pub fn parse(buf: &[u8]) -> Result<&Self> {
        let hdr = Self::ref_from_bytes(buf.get(..HEADER_LEN).ok_or_else(|| {
            anyhow::anyhow!("diameter header needs {HEADER_LEN} bytes, got {}", buf.len())
        })?)
        .map_err(|e| anyhow::anyhow!("failed to map diameter header: {e}"))?;
        ensure!(
            hdr.version == DIAMETER_VERSION,
            "unsupported diameter version {}",
            hdr.version
        );
        Ok(hdr)
    }

    pub fn message_length(&self) -> usize {
        u32::from_be_bytes([0, self.length[0], self.length[1], self.length[2]]) as usize
    }

    pub fn command_code(&self) -> u32 {
        u32::from_be_bytes([0, self.code[0], self.code[1], self.code[2]])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: u32,
    pub app_id: u32,
    pub flags: u8,
    pub hop_by_hop: u32,
    pub end_to_end: u32,
    pub avps: Vec<Avp>,
}

impl Message {
    pub fn request(code: u32, app_id: u32) -> Self {
        Self {
            code,
            app_id,
            flags: FLAG_REQUEST | FLAG_PROXYABLE,
            hop_by_hop: 0,
            end_to_end: 0,
            avps: Vec::new(),
        }
    }

    /// Builds the answer skeleton for a request: same command code,
    /// application and transaction identifiers, R-bit cleared, and the
    /// request's Session-Id (when present) carried over first.
    pub fn answer_to(req: &Message) -> Self {
        let mut ans = Self {
            code: req.code,
            app_id: req.app_id,
            flags: req.flags & FLAG_PROXYABLE,
            hop_by_hop: req.hop_by_hop,
            end_to_end: req.end_to_end,
            avps: Vec::new(),
        };
        if let Some(sid) = req.find(dict::AVP_SESSION_ID, None) {
            ans.avps.push(sid.clone());
        }
        ans
    }

    pub fn is_request(&self) -> bool {
        self.flags & FLAG_REQUEST != 0
    }

    pub fn push(&mut self, avp: Avp) {
        self.avps.push(avp);
    }

    pub fn find(&self, code: u32, vendor_id: Option<u32>) -> Option<&Avp> {
        self.avps
            .iter()
            .find(|a| a.code == code && a.vendor_id == vendor_id)
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut body = BytesMut::new();
        for avp in &self.avps {
            avp.encode_into(&mut body)?;
        }

        let length = HEADER_LEN + body.len();
        ensure!(length <= 0x00ff_ffff, "message exceeds 24-bit length");

        let mut out = BytesMut::with_capacity(length);
        out.put_u8(DIAMETER_VERSION);
        out.put_uint(length as u64, 3);
        out.put_u8(self.flags);
        out.put_uint(self.code as u64, 3);
        out.put_u32(self.app_id);
        out.put_u32(self.hop_by_hop);
        out.put_u32(self.end_to_end);
        out.put_slice(&body);
        Ok(out.freeze())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let hdr = RawHeader::parse(buf)?;
        let total = hdr.message_length();
        ensure!(
            total >= HEADER_LEN && total <= buf.len(),
            "message length {total} exceeds buffer {}",
            buf.len()
        );

        Ok(Self {
            code: hdr.command_code(),
            app_id: hdr.application_id.get(),
            flags: hdr.flags,
            hop_by_hop: hdr.hop_by_hop.get(),
            end_to_end: hdr.end_to_end.get(),
            avps: decode_list(&buf[HEADER_LEN..total])?,
        })
    }
}
