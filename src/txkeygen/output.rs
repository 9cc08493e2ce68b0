// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{keys::ViewKey, Ed25519};
use serde::{Deserialize, Serialize};
use unknown_order::BigNumber;

/// Everything a participant saves when transaction keygen finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxKeygenOutput {
    /// The recipient's stealth address, as given to the protocol.
    pub stealth_address: String,
    /// The generated one-time receipt address packaging
    /// `(one-time key, R·G)`.
    pub receipt_address: String,
    /// The committee-shared view key, passed through from key material.
    pub view_key: ViewKey,
    /// The one-time EdDSA verification key for this receipt.
    pub eddsa_pub: Ed25519,
    /// Every participant's share id, passed through from key material.
    pub ks: Vec<BigNumber>,
    /// Our own share id.
    pub share_id: BigNumber,
}
