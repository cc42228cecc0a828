// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use hex_literal::hex;
use hss_s6a_rs::{
    auc::{self, SQN_MAX, sqn_from_bytes, sqn_to_bytes},
    crypto::milenage,
};

use crate::unit_tests::{K, OPC, PLMN_ID};

const RAND: [u8; 16] = hex!("23553cbe9637a89d218ae64dae47bf35");
const AMF: [u8; 2] = hex!("b9b9");
const SQN: u64 = 0xff9b_b4d0_b607;

#[test]
fn derive_av_matches_test_set_1() -> Result<()> {
    let av = auc::derive_av(&K, &OPC, &AMF, SQN, &RAND, &PLMN_ID)?;
    // AUTN = (SQN ⊕ AK) ‖ AMF ‖ MAC_A
    assert_eq!(av.autn, hex!("55f3285c7577b9b94a9ffac354dfafb3"));
    assert_eq!(av.xres, hex!("a54211d5e3ba50bf"));
    assert_eq!(av.ck, hex!("b40ba9a3c58b2a05bbf0d987b21bf8cb"));
    assert_eq!(av.ik, hex!("f769bcd751044604127672711c6d3441"));
    assert_eq!(av.ak, hex!("aa689c648370"));
    assert_eq!(av.sqn, SQN);
    Ok(())
}

#[test]
fn derive_av_is_byte_identical_for_fixed_inputs() -> Result<()> {
    let a = auc::derive_av(&K, &OPC, &AMF, SQN, &RAND, &PLMN_ID)?;
    let b = auc::derive_av(&K, &OPC, &AMF, SQN, &RAND, &PLMN_ID)?;
    assert_eq!(a.autn, b.autn);
    assert_eq!(a.xres, b.xres);
    assert_eq!(a.kasme, b.kasme);
    Ok(())
}

#[test]
fn kasme_binds_the_visited_plmn() -> Result<()> {
    let home = auc::derive_av(&K, &OPC, &AMF, SQN, &RAND, &PLMN_ID)?;
    let roaming = auc::derive_av(&K, &OPC, &AMF, SQN, &RAND, &[0x13, 0xf0, 0x71])?;
    assert_eq!(home.autn, roaming.autn);
    assert_ne!(home.kasme, roaming.kasme);
    Ok(())
}

/// Builds a well-formed AUTS the way a UE would and checks the round trip.
#[test]
fn resync_recovers_sqn_ms_and_mac_s() -> Result<()> {
    let sqn_ms: u64 = 0x0000_1234_5678;
    let sqn_ms_bytes = sqn_to_bytes(sqn_ms);

    let keys = milenage::f2345(&OPC, &K, &RAND);
    let mut conc = [0u8; 6];
    for i in 0..6 {
        conc[i] = sqn_ms_bytes[i] ^ keys.ak_star[i];
    }
    let (_, mac_s) = milenage::f1(&OPC, &K, &RAND, &sqn_ms_bytes, &[0, 0]);

    let mut blob = Vec::with_capacity(auc::RESYNC_INFO_LEN);
    blob.extend_from_slice(&RAND);
    blob.extend_from_slice(&conc);
    blob.extend_from_slice(&mac_s);

    let outcome = auc::resync(&OPC, &K, &blob)?;
    assert_eq!(outcome.sqn_ms, sqn_ms);
    assert_eq!(outcome.mac_s, mac_s);
    Ok(())
}

#[test]
fn resync_rejects_short_tokens() {
    assert!(auc::resync(&OPC, &K, &[0u8; 29]).is_err());
}

#[test]
fn sqn_codec_is_lossless_mod_2_48() {
    assert_eq!(sqn_from_bytes(&sqn_to_bytes(SQN_MAX)), SQN_MAX);
    assert_eq!(sqn_from_bytes(&sqn_to_bytes(0)), 0);
    // Bits above 48 are dropped on encode.
    assert_eq!(sqn_from_bytes(&sqn_to_bytes(0x1_0000_0000_0001)), 1);
}
