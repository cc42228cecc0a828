// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Attribute-Value-Pair model (RFC 6733 §4).
//!
//! Outgoing AVPs are built from typed values; incoming AVPs keep their raw
//! data and are interpreted by the accessor the handler asks for. Grouped
//! payloads are parsed lazily via [`Avp::children`], so no dictionary is
//! needed on the decode path.

use std::net::IpAddr;

use anyhow::{Result, bail, ensure};
use bytes::{BufMut, Bytes, BytesMut};

use crate::models::dict;

const FLAG_VENDOR: u8 = 0x80;
const FLAG_MANDATORY: u8 = 0x40;

/// Address family prefixes of the Diameter `Address` derived type.
const ADDR_FAMILY_IPV4: u16 = 1;
const ADDR_FAMILY_IPV6: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvpValue {
    /// Raw data; also what every decoded AVP starts as.
    OctetString(Bytes),
    Utf8String(String),
    Unsigned32(u32),
    Integer32(i32),
    /// Diameter `Address`: 2-byte family followed by the address octets.
    Address(IpAddr),
    Grouped(Vec<Avp>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    pub code: u32,
    pub vendor_id: Option<u32>,
    pub mandatory: bool,
    pub value: AvpValue,
}

impl Avp {
    /// Base-protocol AVP (no vendor id), M-bit set.
    pub fn base(code: u32, value: AvpValue) -> Self {
        Self { code, vendor_id: None, mandatory: true, value }
    }

    /// 3GPP AVP (vendor 10415), V- and M-bits set.
    pub fn vendor(code: u32, value: AvpValue) -> Self {
        Self {
            code,
            vendor_id: Some(dict::VENDOR_3GPP),
            mandatory: true,
            value,
        }
    }

    pub fn grouped(code: u32, children: Vec<Avp>) -> Self {
        Self::vendor(code, AvpValue::Grouped(children))
    }

    pub fn octets(&self) -> Result<&[u8]> {
        match &self.value {
            AvpValue::OctetString(b) => Ok(b.as_ref()),
            other => bail!("AVP {} does not hold raw octets: {other:?}", self.code),
        }
    }

    pub fn as_utf8(&self) -> Result<&str> {
        if let AvpValue::Utf8String(s) = &self.value {
            return Ok(s.as_str());
        }
        std::str::from_utf8(self.octets()?)
            .map_err(|e| anyhow::anyhow!("AVP {} is not valid UTF-8: {e}", self.code))
    }

    pub fn as_u32(&self) -> Result<u32> {
        match &self.value {
            AvpValue::Unsigned32(v) => Ok(*v),
            AvpValue::Integer32(v) => Ok(*v as u32),
            AvpValue::OctetString(b) => {
                ensure!(b.len() == 4, "AVP {} is not 4 bytes", self.code);
                Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            },
            other => bail!("AVP {} is not an Unsigned32: {other:?}", self.code),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        self.as_u32().map(|v| v as i32)
    }

    /// Parses the payload as a grouped AVP list. Works both on freshly
    /// decoded AVPs (raw octets) and on locally built groups.
    pub fn children(&self) -> Result<Vec<Avp>> {
        match &self.value {
            AvpValue::Grouped(list) => Ok(list.clone()),
            AvpValue::OctetString(b) => decode_list(b.as_ref()),
            other => bail!("AVP {} is not grouped: {other:?}", self.code),
        }
    }

    pub fn find_child(&self, code: u32, vendor_id: Option<u32>) -> Result<Option<Avp>> {
        Ok(self
            .children()?
            .into_iter()
            .find(|a| a.code == code && a.vendor_id == vendor_id))
    }

    fn data_bytes(&self) -> Result<Bytes> {
        Ok(match &self.value {
            AvpValue::OctetString(b) => b.clone(),
            AvpValue::Utf8String(s) => Bytes::copy_from_slice(s.as_bytes()),
            AvpValue::Unsigned32(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
            AvpValue::Integer32(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
            AvpValue::Address(ip) => {
                let mut b = BytesMut::with_capacity(18);
                match ip {
                    IpAddr::V4(v4) => {
                        b.put_u16(ADDR_FAMILY_IPV4);
                        b.put_slice(&v4.octets());
                    },
                    IpAddr::V6(v6) => {
                        b.put_u16(ADDR_FAMILY_IPV6);
                        b.put_slice(&v6.octets());
                    },
                }
                b.freeze()
            },
            AvpValue::Grouped(children) => {
                let mut b = BytesMut::new();
                for child in children {
                    child.encode_into(&mut b)?;
                }
                b.freeze()
            },
        })
    }

    pub fn encode_into(&self, out: &mut BytesMut) -> Result<()> {
        let data = self.data_bytes()?;
        let header_len = if self.vendor_id.is_some() { 12 } else { 8 };
        let length = header_len + data.len();
        ensure!(length <= 0x00ff_ffff, "AVP {} exceeds 24-bit length", self.code);

        let mut flags = 0u8;
        if self.vendor_id.is_some() {
            flags |= FLAG_VENDOR;
        }
        if self.mandatory {
            flags |= FLAG_MANDATORY;
        }

        out.put_u32(self.code);
        out.put_u8(flags);
        out.put_uint(length as u64, 3);
        if let Some(vendor) = self.vendor_id {
            out.put_u32(vendor);
        }
        out.put_slice(&data);
        // AVPs are aligned on 32-bit boundaries; padding is not counted in
        // the AVP length.
        for _ in 0..(4 - length % 4) % 4 {
            out.put_u8(0);
        }
        Ok(())
    }
}

/// Decodes a packed AVP list, keeping each payload as raw octets.
pub fn decode_list(mut buf: &[u8]) -> Result<Vec<Avp>> {
    let mut avps = Vec::new();
    while !buf.is_empty() {
        ensure!(buf.len() >= 8, "truncated AVP header: {} bytes left", buf.len());

        let code = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let flags = buf[4];
        let length = u32::from_be_bytes([0, buf[5], buf[6], buf[7]]) as usize;

        let header_len = if flags & FLAG_VENDOR != 0 { 12 } else { 8 };
        ensure!(
            length >= header_len && length <= buf.len(),
            "AVP {code} has invalid length {length} (buffer {})",
            buf.len()
        );

        let vendor_id = if flags & FLAG_VENDOR != 0 {
            Some(u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]))
        } else {
            None
        };

        avps.push(Avp {
            code,
            vendor_id,
            mandatory: flags & FLAG_MANDATORY != 0,
            value: AvpValue::OctetString(Bytes::copy_from_slice(
                &buf[header_len..length],
            )),
        });

        let padded = (length + 3) & !3;
        buf = &buf[padded.min(buf.len())..];
    }
    Ok(avps)
}
