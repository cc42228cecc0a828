// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Authentication-centre derivations: EPS authentication vectors
//! (TS 33.401) and AUTS re-synchronisation (TS 33.102 §6.3.5).

use anyhow::{Result, ensure};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{kdf, milenage};

/// 48-bit sequence-number space; the low 5 bits are the IND sub-field.
pub const SQN_MAX: u64 = 0x0000_ffff_ffff_ffff;
/// One IND array step: 2^5.
pub const SQN_STEP: u64 = 32;

pub const AUTN_LEN: usize = 16;
pub const KASME_LEN: usize = 32;
pub const PLMN_ID_LEN: usize = 3;
/// Re-Synchronization-Info AVP payload: RAND ‖ AUTS = 16 + 14.
pub const RESYNC_INFO_LEN: usize = 30;

/// FC for the KASME derivation (TS 33.401 Annex A.2).
const FC_KASME: u8 = 0x10;

/// A fully derived EPS authentication vector. Key material is scrubbed when
/// the value is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EpsAuthVector {
    pub rand: [u8; milenage::RAND_LEN],
    pub autn: [u8; AUTN_LEN],
    pub xres: Vec<u8>,
    pub kasme: [u8; KASME_LEN],
    pub ck: [u8; milenage::KEY_LEN],
    pub ik: [u8; milenage::KEY_LEN],
    pub ak: [u8; milenage::AK_LEN],
    pub sqn: u64,
}

/// Result of parsing and recomputing an AUTS token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncOutcome {
    /// Sequence number the UE reported, recovered through AK*.
    pub sqn_ms: u64,
    /// MAC_S recomputed over `(RAND, SQN_MS)`; the caller compares it with
    /// the trailing 8 bytes of the token.
    pub mac_s: [u8; milenage::MAC_LEN],
}

/// Big-endian encoding of the low 48 bits of `sqn`.
pub fn sqn_to_bytes(sqn: u64) -> [u8; milenage::SQN_LEN] {
    let be = (sqn & SQN_MAX).to_be_bytes();
    let mut out = [0u8; milenage::SQN_LEN];
    out.copy_from_slice(&be[2..8]);
    out
}

pub fn sqn_from_bytes(b: &[u8; milenage::SQN_LEN]) -> u64 {
    let mut be = [0u8; 8];
    be[2..8].copy_from_slice(b);
    u64::from_be_bytes(be)
}

/// `KASME = HMAC-SHA-256(CK ‖ IK, S)` with
/// `S = FC ‖ PLMN_ID ‖ 0x0003 ‖ (SQN ⊕ AK) ‖ 0x0006`.
pub fn kasme(
    ck: &[u8; milenage::KEY_LEN],
    ik: &[u8; milenage::KEY_LEN],
    plmn_id: &[u8; PLMN_ID_LEN],
    sqn_xor_ak: &[u8; milenage::SQN_LEN],
) -> Result<[u8; KASME_LEN]> {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(ck);
    key[16..].copy_from_slice(ik);

    let mut s = [0u8; 14];
    s[0] = FC_KASME;
    s[1..4].copy_from_slice(plmn_id);
    s[4] = 0x00;
    s[5] = 0x03;
    s[6..12].copy_from_slice(sqn_xor_ak);
    s[12] = 0x00;
    s[13] = 0x06;

    let out = kdf::hmac_sha256(&key, &s);
    key.zeroize();
    out
}

/// Derives one EPS authentication vector from the subscriber's key material
/// and the serving network identity.
///
/// `AUTN = (SQN ⊕ AK) ‖ AMF ‖ MAC_A`; KASME binds the visited PLMN.
pub fn derive_av(
    k: &[u8; milenage::KEY_LEN],
    opc: &[u8; milenage::KEY_LEN],
    amf: &[u8; milenage::AMF_LEN],
    sqn: u64,
    rand: &[u8; milenage::RAND_LEN],
    plmn_id: &[u8; PLMN_ID_LEN],
) -> Result<EpsAuthVector> {
    let keys = milenage::f2345(opc, k, rand);
    let sqn_bytes = sqn_to_bytes(sqn);
    let (mac_a, _) = milenage::f1(opc, k, rand, &sqn_bytes, amf);

    let mut autn = [0u8; AUTN_LEN];
    for (dst, (s, a)) in autn.iter_mut().zip(sqn_bytes.iter().zip(keys.ak.iter())) {
        *dst = s ^ a;
    }
    autn[6..8].copy_from_slice(amf);
    autn[8..16].copy_from_slice(&mac_a);

    let mut sqn_xor_ak = [0u8; milenage::SQN_LEN];
    sqn_xor_ak.copy_from_slice(&autn[..6]);
    let kasme = kasme(&keys.ck, &keys.ik, plmn_id, &sqn_xor_ak)?;

    Ok(EpsAuthVector {
        rand: *rand,
        autn,
        xres: keys.res.to_vec(),
        kasme,
        ck: keys.ck,
        ik: keys.ik,
        ak: keys.ak,
        sqn: sqn & SQN_MAX,
    })
}

/// Parses a 30-byte Re-Synchronization-Info payload (`RAND ‖ CONC_SQN_MS ‖
/// MAC_S`) and recomputes `(SQN_MS, MAC_S)`.
///
/// The concealment key is `AK* = f5*(OPc, K, RAND)`, and MAC_S is the f1*
/// half computed with `AMF = 0x0000` as TS 33.102 §6.3.3 requires.
pub fn resync(
    opc: &[u8; milenage::KEY_LEN],
    k: &[u8; milenage::KEY_LEN],
    resync_info: &[u8],
) -> Result<ResyncOutcome> {
    ensure!(
        resync_info.len() == RESYNC_INFO_LEN,
        "Re-Synchronization-Info must be {RESYNC_INFO_LEN} bytes, got {}",
        resync_info.len()
    );

    let mut rand = [0u8; milenage::RAND_LEN];
    rand.copy_from_slice(&resync_info[..16]);
    let conc_sqn_ms = &resync_info[16..22];

    let keys = milenage::f2345(opc, k, &rand);
    let mut sqn_ms = [0u8; milenage::SQN_LEN];
    for (dst, (ak, conc)) in sqn_ms
        .iter_mut()
        .zip(keys.ak_star.iter().zip(conc_sqn_ms.iter()))
    {
        *dst = ak ^ conc;
    }

    let (_, mac_s) = milenage::f1(opc, k, &rand, &sqn_ms, &[0, 0]);

    Ok(ResyncOutcome {
        sqn_ms: sqn_from_bytes(&sqn_ms),
        mac_s,
    })
}
