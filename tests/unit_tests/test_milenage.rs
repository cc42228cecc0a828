// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use hex_literal::hex;
use hss_s6a_rs::crypto::{kdf, milenage};

use crate::unit_tests::{K, OP, OPC};

const RAND: [u8; 16] = hex!("23553cbe9637a89d218ae64dae47bf35");
const SQN: [u8; 6] = hex!("ff9bb4d0b607");
const AMF: [u8; 2] = hex!("b9b9");

#[test]
fn opc_derivation() {
    assert_eq!(milenage::opc(&K, &OP), OPC);
}

#[test]
fn f1_produces_expected_mac_a() {
    let (mac_a, mac_s) = milenage::f1(&OPC, &K, &RAND, &SQN, &AMF);
    assert_eq!(mac_a, hex!("4a9ffac354dfafb3"));
    // The two halves of OUT1 are distinct directions.
    assert_ne!(mac_a, mac_s);
}

#[test]
fn f2345_produces_expected_keys() {
    let out = milenage::f2345(&OPC, &K, &RAND);
    assert_eq!(out.res, hex!("a54211d5e3ba50bf"));
    assert_eq!(out.ck, hex!("b40ba9a3c58b2a05bbf0d987b21bf8cb"));
    assert_eq!(out.ik, hex!("f769bcd751044604127672711c6d3441"));
    assert_eq!(out.ak, hex!("aa689c648370"));
    assert_ne!(out.ak, out.ak_star);
}

#[test]
fn f1_is_deterministic() {
    let a = milenage::f1(&OPC, &K, &RAND, &SQN, &AMF);
    let b = milenage::f1(&OPC, &K, &RAND, &SQN, &AMF);
    assert_eq!(a, b);
}

#[test]
fn f1_depends_on_every_input() {
    let base = milenage::f1(&OPC, &K, &RAND, &SQN, &AMF).0;

    let mut rand = RAND;
    rand[0] ^= 1;
    assert_ne!(milenage::f1(&OPC, &K, &rand, &SQN, &AMF).0, base);

    let mut sqn = SQN;
    sqn[5] ^= 1;
    assert_ne!(milenage::f1(&OPC, &K, &RAND, &sqn, &AMF).0, base);

    let mut amf = AMF;
    amf[0] ^= 1;
    assert_ne!(milenage::f1(&OPC, &K, &RAND, &SQN, &amf).0, base);
}

#[test]
fn aes_cmac_is_shared_with_nas_algorithms() {
    // RFC 4493 example 3 (40-byte message).
    let key = hex!("2b7e151628aed2a6abf7158809cf4f3c");
    let msg = hex!(
        "6bc1bee22e409f96e93d7e117393172a"
        "ae2d8a571e03ac9c9eb76fac45af8e51"
        "30c81c46a35ce411"
    );
    assert_eq!(
        kdf::aes_cmac(&key, &msg),
        hex!("dfa66747de9ae63030ca32611497c827")
    );
}
