// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    errors::{InternalError, Result},
    Ed25519,
};
use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::error;

/// A finalized threshold signature: 64 bytes, `R (32) || s (32)`,
/// verifiable as a plain Ed25519 signature under the one-time receipt key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSignature {
    /// The compressed aggregate nonce point `R`.
    pub r: [u8; 32],
    /// The aggregate response scalar, little-endian.
    pub s: [u8; 32],
}

impl ThresholdSignature {
    /// The 64-byte wire form.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Verify as an Ed25519 signature on `message` under `public_key`.
    pub fn verify(&self, public_key: &Ed25519, message: &[u8]) -> Result<()> {
        let verifying_key = VerifyingKey::from_bytes(&public_key.compress()).map_err(|_| {
            error!("one-time key is not a valid Ed25519 verifying key");
            InternalError::FailedToVerifySignature
        })?;
        let signature = DalekSignature::from_bytes(&self.to_bytes());
        verifying_key
            .verify(message, &signature)
            .map_err(|_| InternalError::FailedToVerifySignature)
    }
}
