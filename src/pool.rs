// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Precomputed-vector pool.
//!
//! Each subscriber carries a bounded FIFO of ready-to-serve vectors. Remote
//! subscribers are consume-only; local subscribers refill the queue from
//! their own key material whenever it runs dry. A refill derives
//! [`AV_REFILL_COUNT`] vectors at `SQN_base + 32·i` with a fresh CSPRNG
//! challenge per vector, persists them, and the head is handed back to the
//! caller.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::{
    auc::{self, SQN_MAX, SQN_STEP},
    crypto::kdf,
    errors::HssError,
    store::{AuthInfo, CachedAv, SubscriberStore},
};

/// Vectors generated per refill; one below the queue bound so a consumer
/// that pops the head immediately leaves room for the next batch tail.
pub const AV_REFILL_COUNT: u64 = 9;

pub struct AvPool {
    store: Arc<dyn SubscriberStore>,
}

impl AvPool {
    pub fn new(store: Arc<dyn SubscriberStore>) -> Self {
        Self { store }
    }

    /// Hands out the next vector for one AIR transaction.
    ///
    /// The caller is responsible for the follow-up
    /// `update_rand_sqn`/`bump_sqn` sequence on the local path.
    pub fn acquire(&self, info: &AuthInfo, plmn_id: &[u8; 3]) -> Result<CachedAv> {
        let imsi = info.imsi.as_str();

        if info.use_remote {
            return self.store.pop_av(imsi)?.ok_or_else(|| {
                HssError::PoolEmpty { imsi: imsi.to_string() }.into()
            });
        }

        if let Some(av) = self.store.pop_av(imsi)? {
            debug!("IMSI {imsi}: serving pooled AV with SQN {:#x}", av.sqn);
            return Ok(av);
        }

        self.refill(info, plmn_id)?;

        self.store.pop_av(imsi)?.ok_or_else(|| {
            HssError::StoreTransient(format!(
                "IMSI {imsi}: AV queue still empty after refill"
            ))
            .into()
        })
    }

    fn refill(&self, info: &AuthInfo, plmn_id: &[u8; 3]) -> Result<()> {
        let imsi = info.imsi.as_str();
        let opc = info.opc_material()?;

        debug!(
            "IMSI {imsi}: refilling AV queue from SQN base {:#x} ({AV_REFILL_COUNT} \
             vectors)",
            info.sqn
        );

        for i in 1..=AV_REFILL_COUNT {
            let mut rand = [0u8; 16];
            kdf::secure_random(&mut rand);

            let sqn = info.sqn.wrapping_add(SQN_STEP * i) & SQN_MAX;
            let av = auc::derive_av(&info.k, &opc, &info.amf, sqn, &rand, plmn_id)?;
            self.store.push_av(imsi, &CachedAv::from(&av))?;
        }

        Ok(())
    }
}
