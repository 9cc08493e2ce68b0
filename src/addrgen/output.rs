// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::Ed25519;
use serde::{Deserialize, Serialize};

/// The terminal value of an address-generation run. Every honest participant
/// ends with the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AddrGenOutput {
    /// The one-time receipt key `H(R·V)·G + S`.
    pub address: Ed25519,
    /// The committee randomness in the exponent, `R·G`; published so the
    /// recipient can recover `R·V` with its view secret.
    pub big_r: Ed25519,
}
