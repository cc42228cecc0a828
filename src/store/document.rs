// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Persisted subscriber document, one per IMSI.
//!
//! Binary fields are stored as lower-case hex ASCII for wire-compatibility
//! with existing provisioning data; the conversion to typed records happens
//! here and nowhere else.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::store::{
    Ambr, Arp, AuthInfo, CachedAv, Pdn, PdnQos, PdnType, SubscriptionProfile,
};

/// Upper bound on PDN entries per subscriber.
pub const N_PDN_MAX: usize = 8;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SubscriberDocument {
    pub imsi: String,
    /// Present (and true) only for subscribers owned by a remote peer; their
    /// vectors are consumed from the queue, never derived locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    pub security: SecurityDocument,
    #[serde(default)]
    pub access_restriction_data: i32,
    #[serde(default)]
    pub subscriber_status: i32,
    #[serde(default)]
    pub network_access_mode: i32,
    /// Minutes; the ULR handler converts to seconds on the wire.
    #[serde(default)]
    pub subscribed_rau_tau_timer: i32,
    /// kb/s; converted to bit/s at load.
    #[serde(default)]
    pub ambr: AmbrDocument,
    #[serde(default)]
    pub pdn: Vec<PdnDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SecurityDocument {
    pub k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    pub amf: String,
    /// Empty or all-zero until the first authentication.
    #[serde(default)]
    pub rand: String,
    #[serde(default)]
    pub sqn: i64,
    #[serde(default)]
    pub authvectors: Vec<AvDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AvDocument {
    pub rand: String,
    pub sqn: i64,
    pub xres: String,
    pub kasme: String,
    pub autn: String,
    pub ck: String,
    pub ak: String,
    pub ik: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct AmbrDocument {
    pub uplink: i64,
    pub downlink: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PdnDocument {
    pub apn: String,
    #[serde(rename = "type")]
    pub pdn_type: i32,
    #[serde(default)]
    pub qos: QosDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambr: Option<AmbrDocument>,
    #[serde(default)]
    pub pgw: AddrDocument,
    #[serde(default)]
    pub ue: AddrDocument,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QosDocument {
    pub qci: i32,
    #[serde(default)]
    pub arp: ArpDocument,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ArpDocument {
    pub priority_level: i32,
    #[serde(default)]
    pub pre_emption_capability: i32,
    #[serde(default)]
    pub pre_emption_vulnerability: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AddrDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr6: Option<String>,
}

/// Decodes a hex field into a fixed-size array; an empty string decodes to
/// all zeroes (unprovisioned RAND).
pub fn hex_array<const N: usize>(field: &str, s: &str) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    if s.is_empty() {
        return Ok(out);
    }
    let raw = hex::decode(s).with_context(|| format!("bad hex in `{field}`"))?;
    ensure!(raw.len() == N, "`{field}` must be {N} bytes, got {}", raw.len());
    out.copy_from_slice(&raw);
    Ok(out)
}

fn hex_opt<const N: usize>(field: &str, s: Option<&String>) -> Result<Option<[u8; N]>> {
    s.filter(|v| !v.is_empty())
        .map(|v| hex_array(field, v))
        .transpose()
}

impl SubscriberDocument {
    pub fn auth_info(&self) -> Result<AuthInfo> {
        let sec = &self.security;
        Ok(AuthInfo {
            imsi: self.imsi.clone(),
            k: hex_array("security.k", &sec.k)?,
            op: hex_opt("security.op", sec.op.as_ref())?,
            opc: hex_opt("security.opc", sec.opc.as_ref())?,
            amf: hex_array("security.amf", &sec.amf)?,
            rand: hex_array("security.rand", &sec.rand)?,
            sqn: (sec.sqn as u64) & crate::auc::SQN_MAX,
            use_remote: self.remote.unwrap_or(false),
        })
    }

    pub fn profile(&self) -> Result<SubscriptionProfile> {
        let mut pdns = Vec::with_capacity(self.pdn.len().min(N_PDN_MAX));
        for doc in self.pdn.iter().take(N_PDN_MAX) {
            pdns.push(doc.pdn()?);
        }
        if self.pdn.len() > N_PDN_MAX {
            tracing::warn!(
                "IMSI {}: {} PDN entries exceed the limit of {N_PDN_MAX}, extra ones \
                 ignored",
                self.imsi,
                self.pdn.len()
            );
        }
        Ok(SubscriptionProfile {
            imsi: self.imsi.clone(),
            access_restriction_data: self.access_restriction_data,
            subscriber_status: self.subscriber_status,
            network_access_mode: self.network_access_mode,
            subscribed_rau_tau_timer_min: self.subscribed_rau_tau_timer,
            ambr: Ambr::from_kbps(self.ambr.uplink, self.ambr.downlink),
            pdns,
        })
    }
}

impl PdnDocument {
    fn pdn(&self) -> Result<Pdn> {
        Ok(Pdn {
            apn: self.apn.clone(),
            pdn_type: PdnType::try_from(self.pdn_type)?,
            ue_addr: parse_v4("ue.addr", self.ue.addr.as_deref())?,
            ue_addr6: parse_v6("ue.addr6", self.ue.addr6.as_deref())?,
            pgw_addr: parse_v4("pgw.addr", self.pgw.addr.as_deref())?,
            pgw_addr6: parse_v6("pgw.addr6", self.pgw.addr6.as_deref())?,
            qos: PdnQos {
                qci: self.qos.qci,
                arp: Arp {
                    priority_level: self.qos.arp.priority_level as u32,
                    pre_emption_capability: self.qos.arp.pre_emption_capability as u32,
                    pre_emption_vulnerability: self.qos.arp.pre_emption_vulnerability
                        as u32,
                },
            },
            ambr: self.ambr.map(|a| Ambr::from_kbps(a.uplink, a.downlink)),
        })
    }
}

fn parse_v4(field: &str, s: Option<&str>) -> Result<Option<std::net::Ipv4Addr>> {
    s.map(|v| v.parse().with_context(|| format!("bad IPv4 in `{field}`: {v}")))
        .transpose()
}

fn parse_v6(field: &str, s: Option<&str>) -> Result<Option<std::net::Ipv6Addr>> {
    s.map(|v| v.parse().with_context(|| format!("bad IPv6 in `{field}`: {v}")))
        .transpose()
}

impl AvDocument {
    pub fn from_cached(av: &CachedAv) -> Self {
        Self {
            rand: hex::encode(av.rand),
            sqn: (av.sqn & crate::auc::SQN_MAX) as i64,
            xres: hex::encode(&av.xres),
            kasme: hex::encode(av.kasme),
            autn: hex::encode(av.autn),
            ck: hex::encode(av.ck),
            ak: hex::encode(av.ak),
            ik: hex::encode(av.ik),
        }
    }

    pub fn cached(&self) -> Result<CachedAv> {
        let xres = hex::decode(&self.xres).context("bad hex in `authvectors.xres`")?;
        ensure!(
            (4..=16).contains(&xres.len()),
            "XRES must be 4..=16 bytes, got {}",
            xres.len()
        );
        Ok(CachedAv {
            rand: hex_array("authvectors.rand", &self.rand)?,
            sqn: (self.sqn as u64) & crate::auc::SQN_MAX,
            xres,
            kasme: hex_array("authvectors.kasme", &self.kasme)?,
            autn: hex_array("authvectors.autn", &self.autn)?,
            ck: hex_array("authvectors.ck", &self.ck)?,
            ik: hex_array("authvectors.ik", &self.ik)?,
            ak: hex_array("authvectors.ak", &self.ak)?,
        })
    }
}
