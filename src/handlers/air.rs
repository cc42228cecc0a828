// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Authentication-Information-Request (command 318).
//!
//! One AIR is a single transaction over the subscriber record: load, handle
//! re-synchronisation, take a vector from the pool, advance the stored
//! `(RAND, SQN)`, and answer with one E-UTRAN vector. The handler keeps no
//! state of its own between requests.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tracing::{debug, error};

use crate::{
    auc::{self, RESYNC_INFO_LEN, SQN_MAX, SQN_STEP},
    context::HssContext,
    crypto::kdf,
    diameter::dispatcher::S6aHandler,
    errors::{AnswerCode, HssError},
    handlers::{error_answer, finish_answer, set_answer_code, user_name, visited_plmn_id},
    models::{
        avp::{Avp, AvpValue},
        dict,
        message::Message,
    },
    store::{AuthInfo, CachedAv},
};

pub struct AirHandler {
    ctx: Arc<HssContext>,
}

impl AirHandler {
    pub fn new(ctx: Arc<HssContext>) -> Self {
        Self { ctx }
    }

    fn process(&self, req: &Message) -> Result<Message> {
        let imsi = user_name(req)?;
        let plmn_id = visited_plmn_id(req)?;

        // One writer per IMSI for the whole transaction, so two concurrent
        // AIRs can never hand out the same (RAND, SQN).
        let serial = self.ctx.imsi_lock(&imsi);
        let _guard = serial
            .lock()
            .map_err(|_| HssError::StoreTransient("IMSI lock poisoned".into()))?;

        let store = self.ctx.store();
        let mut info = store.load(&imsi)?;
        debug!(
            "IMSI {imsi}: RAND {} SQN {:#x} remote {}",
            self.ctx.display_key(&info.rand),
            info.sqn,
            info.use_remote
        );

        // Unprovisioned challenge: first authentication for this record.
        if info.rand == [0u8; 16] {
            debug!("IMSI {imsi}: assigning initial RAND");
            kdf::secure_random(&mut info.rand);
        }

        let opc = info.opc_material()?;

        if let Some(blob) = resync_info(req)? {
            self.handle_resync(&imsi, &mut info, &opc, &blob)?;
        }

        let av = self.ctx.pool().acquire(&info, &plmn_id)?;

        if info.is_local() {
            // Fixed ordering: the stored state must reflect the vector that
            // was handed out before the answer leaves.
            store.update_rand_sqn(&imsi, &av.rand, info.sqn)?;
            store.bump_sqn(&imsi)?;
        }

        debug!(
            "IMSI {imsi}: answering with SQN {:#x} XRES {}",
            av.sqn,
            self.ctx.display_key(&av.xres)
        );

        let mut ans = Message::answer_to(req);
        ans.push(authentication_info(&av));
        set_answer_code(&mut ans, AnswerCode::Base(dict::RC_SUCCESS));
        finish_answer(&self.ctx, &mut ans);
        Ok(ans)
    }

    /// TS 33.102 §6.3.5: verify MAC_S over the UE-reported sequence number,
    /// then restart the SQN series one IND step past it. The new state (and
    /// the flushed queue) is persisted before any answer vector is derived.
    fn handle_resync(
        &self,
        imsi: &str,
        info: &mut AuthInfo,
        opc: &[u8; 16],
        blob: &[u8],
    ) -> Result<()> {
        let outcome = auc::resync(opc, &info.k, blob)?;
        if outcome.mac_s[..] != blob[RESYNC_INFO_LEN - 8..] {
            error!("IMSI {imsi}: re-synchronisation MAC_S verification failed");
            return Err(HssError::ResyncMacMismatch { imsi: imsi.to_string() }.into());
        }

        kdf::secure_random(&mut info.rand);
        // 33.102 C.3.4: next SQN is one IND step plus one past SQN_MS.
        info.sqn = outcome.sqn_ms.wrapping_add(SQN_STEP + 1) & SQN_MAX;
        debug!("IMSI {imsi}: re-synchronised, SQN now {:#x}", info.sqn);

        if info.is_local() {
            let store = self.ctx.store();
            store.update_rand_sqn(imsi, &info.rand, info.sqn)?;
            // Queued vectors predate the UE's counter; they would be
            // rejected again.
            store.clear_avs(imsi)?;
        }
        Ok(())
    }
}

impl S6aHandler for AirHandler {
    fn handle(&self, req: &Message) -> Result<Message> {
        debug!("[HSS] Authentication-Information-Request");
        let ans = match self.process(req) {
            Ok(ans) => ans,
            Err(e) => error_answer(&self.ctx, req, &e),
        };
        debug!("[HSS] Authentication-Information-Answer");
        Ok(ans)
    }
}

/// `Requested-EUTRAN-Authentication-Info` → `Re-Synchronization-Info`, when
/// the MME asks for a re-sync.
fn resync_info(req: &Message) -> Result<Option<Vec<u8>>> {
    let Some(auth_info) =
        req.find(dict::AVP_REQUESTED_EUTRAN_AUTH_INFO, Some(dict::VENDOR_3GPP))
    else {
        return Ok(None);
    };
    let Some(resync) = auth_info
        .find_child(dict::AVP_RE_SYNCHRONIZATION_INFO, Some(dict::VENDOR_3GPP))?
    else {
        return Ok(None);
    };
    Ok(Some(resync.octets()?.to_vec()))
}

/// `Authentication-Info` with exactly one E-UTRAN vector.
fn authentication_info(av: &CachedAv) -> Avp {
    let vector = Avp::grouped(
        dict::AVP_E_UTRAN_VECTOR,
        vec![
            Avp::vendor(
                dict::AVP_RAND,
                AvpValue::OctetString(Bytes::copy_from_slice(&av.rand)),
            ),
            Avp::vendor(
                dict::AVP_XRES,
                AvpValue::OctetString(Bytes::copy_from_slice(&av.xres)),
            ),
            Avp::vendor(
                dict::AVP_AUTN,
                AvpValue::OctetString(Bytes::copy_from_slice(&av.autn)),
            ),
            Avp::vendor(
                dict::AVP_KASME,
                AvpValue::OctetString(Bytes::copy_from_slice(&av.kasme)),
            ),
        ],
    );
    Avp::grouped(dict::AVP_AUTHENTICATION_INFO, vec![vector])
}
