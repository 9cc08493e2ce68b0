// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    commitments::{HashCommitment, HashDecommitment},
    messages::ProtocolContent,
    zkp::DLogProof,
    Ed25519,
};
use serde::{Deserialize, Serialize};
use unknown_order::BigNumber;

pub(super) const ROUND_ONE: usize = 0;
pub(super) const ROUND_TWO: usize = 1;
pub(super) const ROUND_THREE: usize = 2;

/// The closed message set of the signing protocol. Every variant travels as
/// a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignContent {
    /// Round 1: commitment to the coordinates of the sender's nonce point
    /// `Ri = ri·G`.
    Round1(HashCommitment),
    /// Round 2: opening of the round-1 commitment plus a proof of knowledge
    /// of `ri`.
    Round2(SignDecommit),
    /// Round 3: the sender's signature share.
    Round3(SignatureShare),
}

/// The round-2 payload: the nonce-point opening and its Schnorr proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignDecommit {
    pub decommitment: HashDecommitment,
    pub proof: DLogProof<Ed25519>,
}

/// A single participant's share of the signature scalar.
///
/// The share is `k·wi + ri mod L`; the stealth term `k·hv` is added exactly
/// once by each participant locally, never broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureShare(pub BigNumber);

impl ProtocolContent for SignContent {
    const KIND_COUNT: usize = 3;

    fn kind(&self) -> usize {
        match self {
            SignContent::Round1(_) => ROUND_ONE,
            SignContent::Round2(_) => ROUND_TWO,
            SignContent::Round3(_) => ROUND_THREE,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            SignContent::Round1(_) => "SignRound1",
            SignContent::Round2(_) => "SignRound2",
            SignContent::Round3(_) => "SignRound3",
        }
    }

    fn expects_broadcast(&self) -> bool {
        true
    }
}
