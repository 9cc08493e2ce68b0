// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The stealth address codec.
//!
//! A stealth address packages a recipient's two compressed edwards25519
//! public keys into a 69-byte buffer with a truncated Keccak-256 checksum:
//!
//! ```text
//! prefix (1) || sign pubkey (32) || view pubkey (32) || keccak256(buf[0..65])[0..4]
//! ```
//!
//! The buffer is rendered as a CryptoNote-style Base58 string: the bytes are
//! split into 8-byte blocks, each block encoded independently into a fixed
//! 11 characters (the 5-byte tail into 7), zero-padded with the alphabet's
//! first character. Receipt addresses reuse the same layout to package a
//! one-time key together with the committee randomness `R·G`.

use crate::{
    curve::CurveTrait,
    errors::{CallerError, Result},
    Ed25519,
};
use sha3::{Digest, Keccak256};
use tracing::error;

/// The network prefix carried in the first byte of every address.
pub const ADDRESS_PREFIX: u8 = 0x12;

const POINT_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;
const CHECKED_LEN: usize = 1 + 2 * POINT_LEN;
const RAW_LEN: usize = CHECKED_LEN + CHECKSUM_LEN;

/// Bytes per full Base58 block, and the encoded size of each partial block
/// length (`ENCODED_SIZES[n]` characters for an `n`-byte block).
const FULL_BLOCK_LEN: usize = 8;
const ENCODED_SIZES: [usize; 9] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

/// Encode a recipient's (sign, view) public key pair as an address string.
pub fn encode(sign_pub: &Ed25519, view_pub: &Ed25519) -> String {
    let mut buf = [0u8; RAW_LEN];
    buf[0] = ADDRESS_PREFIX;
    buf[1..1 + POINT_LEN].copy_from_slice(&sign_pub.compress());
    buf[1 + POINT_LEN..CHECKED_LEN].copy_from_slice(&view_pub.compress());
    let checksum = Keccak256::digest(&buf[..CHECKED_LEN]);
    buf[CHECKED_LEN..].copy_from_slice(&checksum[..CHECKSUM_LEN]);
    base58_encode(&buf)
}

/// Decode an address string back into its (sign, view) public key pair.
pub fn decode(address: &str) -> Result<(Ed25519, Ed25519)> {
    let raw = base58_decode(address)?;
    if raw.len() != RAW_LEN {
        error!(
            "address decodes to {} bytes, expected {RAW_LEN}",
            raw.len()
        );
        Err(CallerError::InvalidAddress)?
    }
    if raw[0] != ADDRESS_PREFIX {
        error!("address carries prefix {:#04x}", raw[0]);
        Err(CallerError::InvalidPrefix)?
    }
    let checksum = Keccak256::digest(&raw[..CHECKED_LEN]);
    if checksum[..CHECKSUM_LEN] != raw[CHECKED_LEN..] {
        error!("address checksum mismatch");
        Err(CallerError::InvalidAddress)?
    }
    let sign_pub = Ed25519::try_from_bytes(&raw[1..1 + POINT_LEN])?;
    let view_pub = Ed25519::try_from_bytes(&raw[1 + POINT_LEN..CHECKED_LEN])?;
    Ok((sign_pub, view_pub))
}

fn base58_encode(data: &[u8]) -> String {
    let mut out = String::new();
    for block in data.chunks(FULL_BLOCK_LEN) {
        let target = ENCODED_SIZES[block.len()];
        let encoded = bs58::encode(block).into_string();
        // Fixed-size blocks: pad with the zero digit up to the block width.
        for _ in encoded.len()..target {
            out.push('1');
        }
        out.push_str(&encoded);
    }
    out
}

fn base58_decode(s: &str) -> Result<Vec<u8>> {
    const FULL_ENCODED_LEN: usize = ENCODED_SIZES[FULL_BLOCK_LEN];
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::new();
    for chunk in chars.chunks(FULL_ENCODED_LEN) {
        let block_len = ENCODED_SIZES
            .iter()
            .position(|&size| size == chunk.len())
            .ok_or_else(|| {
                error!("address length is not a valid block sequence");
                CallerError::InvalidAddress
            })?;
        let chunk: String = chunk.iter().collect();
        let decoded = bs58::decode(&chunk).into_vec().map_err(|_| {
            error!("address contains invalid base58");
            CallerError::InvalidAddress
        })?;
        // The decoding carries one zero byte per leading pad digit; the
        // significant bytes must fit the block.
        let significant: Vec<u8> = decoded.iter().copied().skip_while(|&b| b == 0).collect();
        if significant.len() > block_len {
            error!("base58 block overflows its width");
            Err(CallerError::InvalidAddress)?
        }
        let mut block = vec![0u8; block_len - significant.len()];
        block.extend_from_slice(&significant);
        out.extend_from_slice(&block);
    }
    Ok(out)
}
