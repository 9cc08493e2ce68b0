// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    commitments::{HashCommitment, HashDecommitment},
    messages::ProtocolContent,
};
use serde::{Deserialize, Serialize};

pub(super) const ROUND_ONE: usize = 0;
pub(super) const ROUND_TWO: usize = 1;

/// The closed message set of the transaction-keygen protocol; the same
/// commit/open wire as address generation, re-deriving `R` on the recipient
/// side. Every variant travels as a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxKeygenContent {
    /// Round 1: commitment to the sender's partial scalar `ri`.
    Round1(HashCommitment),
    /// Round 2: opening of the round-1 commitment.
    Round2(HashDecommitment),
}

impl ProtocolContent for TxKeygenContent {
    const KIND_COUNT: usize = 2;

    fn kind(&self) -> usize {
        match self {
            TxKeygenContent::Round1(_) => ROUND_ONE,
            TxKeygenContent::Round2(_) => ROUND_TWO,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            TxKeygenContent::Round1(_) => "TxKGRound1",
            TxKeygenContent::Round2(_) => "TxKGRound2",
        }
    }

    fn expects_broadcast(&self) -> bool {
        true
    }
}
