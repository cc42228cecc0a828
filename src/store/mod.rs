// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Subscriber store: per-IMSI atomic fetch/update of key material, sequence
//! state, the precomputed-AV queue and the subscription profile.
//!
//! The [`SubscriberStore`] contract is what the handlers and the pool see;
//! [`DocumentStore`] realises it over a document backend, serialising all
//! operations behind one coarse process lock while each backend call stays a
//! single atomic document update.

pub mod document;
pub mod file;
pub mod memory;
pub mod ops;

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::{Arc, Mutex},
};

use anyhow::{Result, anyhow, bail};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    auc::SQN_STEP,
    crypto::milenage,
    errors::HssError,
    store::{
        document::{AvDocument, SubscriberDocument},
        file::JsonFileBackend,
        memory::MemoryBackend,
        ops::{DocumentBackend, UpdateOp},
    },
};

pub use crate::store::ops::AV_QUEUE_DEPTH;

/// Security view of a subscriber record, as one AIR transaction needs it.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthInfo {
    #[zeroize(skip)]
    pub imsi: String,
    pub k: [u8; 16],
    pub op: Option<[u8; 16]>,
    pub opc: Option<[u8; 16]>,
    pub amf: [u8; 2],
    pub rand: [u8; 16],
    #[zeroize(skip)]
    pub sqn: u64,
    #[zeroize(skip)]
    pub use_remote: bool,
}

impl AuthInfo {
    /// A local subscriber derives vectors here; a remote-peer subscriber
    /// only consumes the queue.
    pub fn is_local(&self) -> bool {
        !self.use_remote
    }

    /// Stored OPC when provisioned, otherwise derived from `(K, OP)`.
    pub fn opc_material(&self) -> Result<[u8; 16]> {
        if let Some(opc) = self.opc {
            return Ok(opc);
        }
        match self.op {
            Some(op) => Ok(milenage::opc(&self.k, &op)),
            None => bail!("IMSI {}: neither OPC nor OP provisioned", self.imsi),
        }
    }
}

/// A precomputed vector held in the per-subscriber queue.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CachedAv {
    pub rand: [u8; 16],
    #[zeroize(skip)]
    pub sqn: u64,
    pub xres: Vec<u8>,
    pub kasme: [u8; 32],
    pub autn: [u8; 16],
    pub ck: [u8; 16],
    pub ik: [u8; 16],
    pub ak: [u8; 6],
}

impl From<&crate::auc::EpsAuthVector> for CachedAv {
    fn from(av: &crate::auc::EpsAuthVector) -> Self {
        Self {
            rand: av.rand,
            sqn: av.sqn,
            xres: av.xres.clone(),
            kasme: av.kasme,
            autn: av.autn,
            ck: av.ck,
            ik: av.ik,
            ak: av.ak,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdnType {
    Ipv4 = 0,
    Ipv6 = 1,
    Ipv4v6 = 2,
    Ipv4OrV6 = 3,
}

impl PdnType {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn has_v4(self) -> bool {
        matches!(self, PdnType::Ipv4 | PdnType::Ipv4v6)
    }

    pub fn has_v6(self) -> bool {
        matches!(self, PdnType::Ipv6 | PdnType::Ipv4v6)
    }
}

impl TryFrom<i32> for PdnType {
    type Error = anyhow::Error;

    fn try_from(v: i32) -> Result<Self> {
        Ok(match v {
            0 => PdnType::Ipv4,
            1 => PdnType::Ipv6,
            2 => PdnType::Ipv4v6,
            3 => PdnType::Ipv4OrV6,
            other => bail!("unknown PDN type {other}"),
        })
    }
}

/// Aggregate maximum bit rate, bit/s on this side of the store (the
/// documents hold kb/s).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ambr {
    pub uplink: u64,
    pub downlink: u64,
}

impl Ambr {
    pub fn from_kbps(uplink: i64, downlink: i64) -> Self {
        Self {
            uplink: (uplink.max(0) as u64) * 1024,
            downlink: (downlink.max(0) as u64) * 1024,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.uplink == 0 && self.downlink == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arp {
    pub priority_level: u32,
    pub pre_emption_capability: u32,
    pub pre_emption_vulnerability: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdnQos {
    pub qci: i32,
    pub arp: Arp,
}

#[derive(Debug, Clone)]
pub struct Pdn {
    pub apn: String,
    pub pdn_type: PdnType,
    pub ue_addr: Option<Ipv4Addr>,
    pub ue_addr6: Option<Ipv6Addr>,
    pub pgw_addr: Option<Ipv4Addr>,
    pub pgw_addr6: Option<Ipv6Addr>,
    pub qos: PdnQos,
    pub ambr: Option<Ambr>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionProfile {
    pub imsi: String,
    pub access_restriction_data: i32,
    pub subscriber_status: i32,
    pub network_access_mode: i32,
    pub subscribed_rau_tau_timer_min: i32,
    pub ambr: Ambr,
    pub pdns: Vec<Pdn>,
}

/// The store contract the authentication core consumes. `NotProvisioned` is
/// a normal outcome for unknown IMSIs; backend I/O trouble surfaces as
/// `StoreTransient`.
pub trait SubscriberStore: Send + Sync {
    fn load(&self, imsi: &str) -> Result<AuthInfo>;
    fn update_rand_sqn(&self, imsi: &str, rand: &[u8; 16], sqn: u64) -> Result<()>;
    /// `SQN ← (SQN + 32) AND SQN_MAX`, one backend round-trip.
    fn bump_sqn(&self, imsi: &str) -> Result<()>;
    fn pop_av(&self, imsi: &str) -> Result<Option<CachedAv>>;
    fn push_av(&self, imsi: &str, av: &CachedAv) -> Result<()>;
    fn clear_avs(&self, imsi: &str) -> Result<()>;
    fn load_profile(&self, imsi: &str) -> Result<SubscriptionProfile>;
    /// Out-of-band provisioning entry point (subscription management).
    fn provision(&self, doc: SubscriberDocument) -> Result<()>;
}

pub struct DocumentStore {
    backend: Box<dyn DocumentBackend>,
    // Coarse per-process serialisation on top of per-call backend atomicity.
    lock: Mutex<()>,
}

impl DocumentStore {
    pub fn new(backend: Box<dyn DocumentBackend>) -> Self {
        Self { backend, lock: Mutex::new(()) }
    }

    /// `mem:` for the in-process map, anything else (optionally prefixed
    /// with `file:`) as a spool directory.
    pub fn open(db_uri: &str) -> Result<Arc<dyn SubscriberStore>> {
        let store: DocumentStore = match db_uri {
            "mem:" | "mem://" => Self::new(Box::new(MemoryBackend::new())),
            uri => {
                let dir = uri.strip_prefix("file:").unwrap_or(uri);
                Self::new(Box::new(JsonFileBackend::open(dir)?))
            },
        };
        Ok(Arc::new(store))
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| HssError::StoreTransient("store lock poisoned".into()).into())
    }

    fn find(&self, imsi: &str) -> Result<SubscriberDocument> {
        self.backend
            .find(imsi)
            .map_err(store_transient)?
            .ok_or_else(|| HssError::NotProvisioned { imsi: imsi.to_string() }.into())
    }

    fn apply_matched(&self, imsi: &str, ops: &[UpdateOp]) -> Result<ops::ApplyOutcome> {
        let outcome = self.backend.apply(imsi, ops).map_err(store_transient)?;
        if !outcome.matched {
            return Err(HssError::NotProvisioned { imsi: imsi.to_string() }.into());
        }
        Ok(outcome)
    }
}

fn store_transient(e: anyhow::Error) -> anyhow::Error {
    anyhow!(HssError::StoreTransient(e.to_string()))
}

impl SubscriberStore for DocumentStore {
    fn load(&self, imsi: &str) -> Result<AuthInfo> {
        let _g = self.guard()?;
        self.find(imsi)?.auth_info()
    }

    fn update_rand_sqn(&self, imsi: &str, rand: &[u8; 16], sqn: u64) -> Result<()> {
        let _g = self.guard()?;
        self.apply_matched(imsi, &[UpdateOp::SetRandSqn { rand: *rand, sqn }])?;
        Ok(())
    }

    fn bump_sqn(&self, imsi: &str) -> Result<()> {
        let _g = self.guard()?;
        self.apply_matched(
            imsi,
            &[
                UpdateOp::IncSqn { delta: SQN_STEP },
                UpdateOp::MaskSqn { mask: crate::auc::SQN_MAX },
            ],
        )?;
        Ok(())
    }

    fn pop_av(&self, imsi: &str) -> Result<Option<CachedAv>> {
        let _g = self.guard()?;
        let outcome = self.apply_matched(imsi, &[UpdateOp::PopFrontAv])?;
        outcome.popped.map(|doc| doc.cached()).transpose()
    }

    fn push_av(&self, imsi: &str, av: &CachedAv) -> Result<()> {
        let _g = self.guard()?;
        self.apply_matched(
            imsi,
            &[UpdateOp::PushAv(Box::new(AvDocument::from_cached(av)))],
        )?;
        Ok(())
    }

    fn clear_avs(&self, imsi: &str) -> Result<()> {
        let _g = self.guard()?;
        self.apply_matched(imsi, &[UpdateOp::ClearAvs])?;
        Ok(())
    }

    fn load_profile(&self, imsi: &str) -> Result<SubscriptionProfile> {
        let _g = self.guard()?;
        self.find(imsi)?.profile()
    }

    fn provision(&self, doc: SubscriberDocument) -> Result<()> {
        let _g = self.guard()?;
        self.backend.insert(doc).map_err(store_transient)
    }
}
