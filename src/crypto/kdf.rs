// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Keyed-digest primitives shared by the authentication centre: HMAC-SHA-256
//! for the KASME KDF, AES-CMAC (RFC 4493) for the EIA2/EEA2 family, and the
//! CSPRNG draw used for fresh RAND challenges.

use aes::{Aes128, cipher::generic_array::GenericArray};
use anyhow::{Context, Result};
use cmac::{Cmac, Mac};
use hmac::Hmac;
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const HMAC_SHA256_LEN: usize = 32;
pub const CMAC_LEN: usize = 16;

/// HMAC-SHA-256 over `msg`, any key length.
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<[u8; HMAC_SHA256_LEN]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .context("HMAC-SHA-256 rejected key")?;
    mac.update(msg);
    let out = mac.finalize().into_bytes();
    let mut digest = [0u8; HMAC_SHA256_LEN];
    digest.copy_from_slice(&out);
    Ok(digest)
}

/// AES-128-CMAC over `msg` with a 128-bit key.
pub fn aes_cmac(key: &[u8; 16], msg: &[u8]) -> [u8; CMAC_LEN] {
    let mut mac = <Cmac<Aes128>>::new(GenericArray::from_slice(key));
    mac.update(msg);
    let out = mac.finalize().into_bytes();
    let mut tag = [0u8; CMAC_LEN];
    tag.copy_from_slice(&out);
    tag
}

/// Fills `buf` from the process CSPRNG.
pub fn secure_random(buf: &mut [u8]) {
    rand::rng().fill(buf);
}
