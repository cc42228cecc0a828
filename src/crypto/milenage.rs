// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! MILENAGE f1/f1* and f2..f5* (3GPP TS 35.205/35.206) on top of the
//! AES-128 block cipher.
//!
//! All functions are pure over fixed-length byte blocks. The kernel is the
//! same for every output: `TEMP = E_K(RAND ⊕ OPc)`, then one more AES pass
//! over a rotated/constant-mixed block. Rotation amounts are whole bytes
//! (r1..r5 = 8, 0, 4, 8, 12) and the c-constants only touch the last byte
//! (0, 1, 2, 4, 8), so the loop bodies below index rather than shift.

use aes::{
    Aes128,
    cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use zeroize::Zeroize;

pub const KEY_LEN: usize = 16;
pub const RAND_LEN: usize = 16;
pub const SQN_LEN: usize = 6;
pub const AMF_LEN: usize = 2;
pub const MAC_LEN: usize = 8;
pub const RES_LEN: usize = 8;
pub const AK_LEN: usize = 6;

/// Output block of `f2345`: RES/CK/IK plus both anonymity keys.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct F2345 {
    pub res: [u8; RES_LEN],
    pub ck: [u8; KEY_LEN],
    pub ik: [u8; KEY_LEN],
    pub ak: [u8; AK_LEN],
    /// f5* output, used only on the re-synchronisation path.
    pub ak_star: [u8; AK_LEN],
}

#[inline]
fn encrypt_block(k: &[u8; KEY_LEN], block: &mut [u8; 16]) {
    let cipher = Aes128::new(GenericArray::from_slice(k));
    cipher.encrypt_block(GenericArray::from_mut_slice(block));
}

#[inline]
fn xor_in_place(dst: &mut [u8; 16], src: &[u8; 16]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

/// `OPc = E_K(OP) ⊕ OP` (TS 35.206 §4.1).
pub fn opc(k: &[u8; KEY_LEN], op: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let mut out = *op;
    encrypt_block(k, &mut out);
    for (o, m) in out.iter_mut().zip(op.iter()) {
        *o ^= m;
    }
    out
}

/// f1/f1*: network and re-synchronisation message authentication codes.
///
/// Returns `(MAC_A, MAC_S)`, the two halves of OUT1. The caller picks the
/// half matching its direction; re-sync passes `AMF = 0x0000`.
pub fn f1(
    opc: &[u8; KEY_LEN],
    k: &[u8; KEY_LEN],
    rand: &[u8; RAND_LEN],
    sqn: &[u8; SQN_LEN],
    amf: &[u8; AMF_LEN],
) -> ([u8; MAC_LEN], [u8; MAC_LEN]) {
    let mut temp = *rand;
    xor_in_place(&mut temp, opc);
    encrypt_block(k, &mut temp);

    // IN1 = SQN ‖ AMF ‖ SQN ‖ AMF
    let mut in1 = [0u8; 16];
    in1[0..6].copy_from_slice(sqn);
    in1[6..8].copy_from_slice(amf);
    in1[8..14].copy_from_slice(sqn);
    in1[14..16].copy_from_slice(amf);

    // OUT1 = E_K(TEMP ⊕ rot(IN1 ⊕ OPc, r1) ⊕ c1) ⊕ OPc, r1 = 8 bytes, c1 = 0
    let mut block = [0u8; 16];
    for i in 0..16 {
        block[(i + 8) % 16] = in1[i] ^ opc[i];
    }
    xor_in_place(&mut block, &temp);
    encrypt_block(k, &mut block);
    xor_in_place(&mut block, opc);

    let mut mac_a = [0u8; MAC_LEN];
    let mut mac_s = [0u8; MAC_LEN];
    mac_a.copy_from_slice(&block[..8]);
    mac_s.copy_from_slice(&block[8..]);

    temp.zeroize();
    block.zeroize();

    (mac_a, mac_s)
}

/// f2..f5*: RES, CK, IK, AK and AK* from one RAND.
pub fn f2345(
    opc: &[u8; KEY_LEN],
    k: &[u8; KEY_LEN],
    rand: &[u8; RAND_LEN],
) -> F2345 {
    let mut temp = *rand;
    xor_in_place(&mut temp, opc);
    encrypt_block(k, &mut temp);

    let mut out = F2345 {
        res: [0u8; RES_LEN],
        ck: [0u8; KEY_LEN],
        ik: [0u8; KEY_LEN],
        ak: [0u8; AK_LEN],
        ak_star: [0u8; AK_LEN],
    };

    // f2 ‖ f5: r2 = 0, c2 = ..01
    let mut block = temp;
    xor_in_place(&mut block, opc);
    block[15] ^= 1;
    encrypt_block(k, &mut block);
    xor_in_place(&mut block, opc);
    out.res.copy_from_slice(&block[8..16]);
    out.ak.copy_from_slice(&block[..6]);

    // f3: r3 = 4 bytes, c3 = ..02
    for i in 0..16 {
        block[(i + 12) % 16] = temp[i] ^ opc[i];
    }
    block[15] ^= 2;
    encrypt_block(k, &mut block);
    xor_in_place(&mut block, opc);
    out.ck.copy_from_slice(&block);

    // f4: r4 = 8 bytes, c4 = ..04
    for i in 0..16 {
        block[(i + 8) % 16] = temp[i] ^ opc[i];
    }
    block[15] ^= 4;
    encrypt_block(k, &mut block);
    xor_in_place(&mut block, opc);
    out.ik.copy_from_slice(&block);

    // f5*: r5 = 12 bytes, c5 = ..08
    for i in 0..16 {
        block[(i + 4) % 16] = temp[i] ^ opc[i];
    }
    block[15] ^= 8;
    encrypt_block(k, &mut block);
    xor_in_place(&mut block, opc);
    out.ak_star.copy_from_slice(&block[..6]);

    temp.zeroize();
    block.zeroize();

    out
}
