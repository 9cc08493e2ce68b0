// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Identities and per-run parameters shared by every protocol.

use crate::errors::{CallerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::error;
use unknown_order::BigNumber;

/// A participant identity.
///
/// Two participants are the same participant exactly when their key integers
/// are equal; the `index` is the participant's slot in the [`PeerContext`]
/// for this protocol run and is the engine's sole addressing handle. The
/// moniker is display-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyId {
    index: usize,
    moniker: String,
    key: BigNumber,
}

impl PartyId {
    /// Create an identity. The index must match the participant's slot in
    /// the peer context it will be used with; [`PeerContext::new`] assigns
    /// slots itself.
    pub fn new(index: usize, moniker: impl Into<String>, key: BigNumber) -> Self {
        Self {
            index,
            moniker: moniker.into(),
            key,
        }
    }

    /// The participant's slot in the peer context.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The display name.
    pub fn moniker(&self) -> &str {
        &self.moniker
    }

    /// The key integer that defines this identity.
    pub fn key(&self) -> &BigNumber {
        &self.key
    }
}

impl PartialEq for PartyId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PartyId {}

impl Display for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}, {}}}", self.index, self.moniker)
    }
}

/// The ordered list of participants for one protocol run.
///
/// Every participant must hold an identical context; the ordering defines
/// which slot each participant occupies. Construction orders participants by
/// key integer and assigns slots accordingly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerContext {
    ids: Vec<PartyId>,
}

impl PeerContext {
    /// Build a context from an unordered set of identities.
    pub fn new(mut ids: Vec<PartyId>) -> Self {
        ids.sort_by(|a, b| a.key.cmp(&b.key));
        for (index, id) in ids.iter_mut().enumerate() {
            id.index = index;
        }
        Self { ids }
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when the context is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The participant occupying `index`.
    pub fn get(&self, index: usize) -> Option<&PartyId> {
        self.ids.get(index)
    }

    /// All participants, in slot order.
    pub fn ids(&self) -> &[PartyId] {
        &self.ids
    }

    /// True when `id` occupies exactly the slot it claims.
    pub fn contains(&self, id: &PartyId) -> bool {
        self.ids.get(id.index).map_or(false, |known| known == id)
    }
}

/// Immutable parameters for one protocol run.
#[derive(Debug, Clone)]
pub struct Parameters {
    peers: PeerContext,
    self_id: PartyId,
    party_count: usize,
    threshold: usize,
}

impl Parameters {
    /// Create parameters, enforcing `0 < threshold < party_count` and that
    /// `self_id` occupies its slot in the peer context.
    pub fn new(peers: PeerContext, self_id: PartyId, threshold: usize) -> Result<Self> {
        let party_count = peers.len();
        if party_count < 2 || threshold == 0 || threshold >= party_count {
            error!(
                "invalid threshold configuration: t = {threshold}, n = {party_count}"
            );
            Err(CallerError::ConfigInvalid)?
        }
        if !peers.contains(&self_id) {
            error!("our own identity is missing from the peer context");
            Err(CallerError::ConfigInvalid)?
        }
        Ok(Self {
            peers,
            self_id,
            party_count,
            threshold,
        })
    }

    /// The peer context for this run.
    pub fn peers(&self) -> &PeerContext {
        &self.peers
    }

    /// Our own identity.
    pub fn self_id(&self) -> &PartyId {
        &self.self_id
    }

    /// Our own slot.
    pub fn self_index(&self) -> usize {
        self.self_id.index
    }

    /// Total number of participants.
    pub fn party_count(&self) -> usize {
        self.party_count
    }

    /// The threshold `t`; any `t + 1` participants can sign.
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::utils::bn_from_u64;

    /// A peer context of `n` participants with small consecutive key
    /// integers, mirroring how share ids are assigned in fixtures.
    pub(crate) fn test_peer_context(n: usize) -> PeerContext {
        let ids = (0..n)
            .map(|i| PartyId::new(0, format!("P[{}]", i + 1), bn_from_u64(i as u64 + 1)))
            .collect();
        PeerContext::new(ids)
    }

    /// Parameters for each of the `n` participants with threshold `t`.
    pub(crate) fn test_parameters(n: usize, t: usize) -> Vec<Parameters> {
        let peers = test_peer_context(n);
        peers
            .ids()
            .iter()
            .map(|id| Parameters::new(peers.clone(), id.clone(), t).unwrap())
            .collect()
    }
}
