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

/// Slot index of each content variant in the message store.
pub(super) const ROUND_ONE: usize = 0;
pub(super) const ROUND_TWO: usize = 1;

/// The closed message set of the address-generation protocol. Every variant
/// travels as a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AddrGenContent {
    /// Round 1: commitment to the sender's partial scalar `ri`.
    Round1(HashCommitment),
    /// Round 2: opening of the round-1 commitment.
    Round2(HashDecommitment),
}

impl ProtocolContent for AddrGenContent {
    const KIND_COUNT: usize = 2;

    fn kind(&self) -> usize {
        match self {
            AddrGenContent::Round1(_) => ROUND_ONE,
            AddrGenContent::Round2(_) => ROUND_TWO,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            AddrGenContent::Round1(_) => "AdrRound1",
            AddrGenContent::Round2(_) => "AdrRound2",
        }
    }

    fn expects_broadcast(&self) -> bool {
        true
    }
}
