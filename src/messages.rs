// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The framed message envelope exchanged between parties.
//!
//! Each protocol defines a closed content enum; the envelope adds routing.
//! A message with no recipient list is a broadcast, and the invariant
//! `to == None <=> is_broadcast` holds for every constructed message.

use crate::{
    errors::Result,
    protocol::PartyId,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// The closed set of wire payloads for one protocol.
///
/// Every variant maps to a message-store slot (`kind`) and declares whether
/// it travels as a broadcast.
pub trait ProtocolContent:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + 'static
{
    /// Number of distinct content variants.
    const KIND_COUNT: usize;

    /// The message-store slot for this variant, in `[0, KIND_COUNT)`.
    fn kind(&self) -> usize;

    /// A short name for logging.
    fn kind_name(&self) -> &'static str;

    /// Whether this variant's policy is broadcast delivery.
    fn expects_broadcast(&self) -> bool;
}

/// A framed protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<C> {
    from: PartyId,
    to: Option<Vec<PartyId>>,
    is_broadcast: bool,
    content: C,
}

impl<C: ProtocolContent> Message<C> {
    /// A message addressed to every other participant.
    pub fn broadcast(from: &PartyId, content: C) -> Self {
        Self {
            from: from.clone(),
            to: None,
            is_broadcast: true,
            content,
        }
    }

    /// A message addressed to the listed recipients only.
    pub fn point_to_point(from: &PartyId, to: Vec<PartyId>, content: C) -> Self {
        Self {
            from: from.clone(),
            to: Some(to),
            is_broadcast: false,
            content,
        }
    }

    /// The sender.
    pub fn from(&self) -> &PartyId {
        &self.from
    }

    /// The recipients; `None` for a broadcast.
    pub fn to(&self) -> Option<&[PartyId]> {
        self.to.as_deref()
    }

    /// Whether the message is a broadcast.
    pub fn is_broadcast(&self) -> bool {
        self.is_broadcast
    }

    /// The protocol payload.
    pub fn content(&self) -> &C {
        &self.content
    }

    /// Serialize the payload for the wire. Routing metadata travels in the
    /// transport's own framing.
    pub fn wire_bytes(&self) -> Result<Vec<u8>> {
        serialize!(&self.content)
    }

    /// Rebuild a message from wire bytes and transport-supplied routing.
    pub fn from_wire(bytes: &[u8], from: PartyId, is_broadcast: bool) -> Result<Self> {
        let content: C = deserialize!(bytes)?;
        Ok(Self {
            from,
            to: None,
            is_broadcast,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        addrgen::AddrGenContent,
        commitments::HashCommitDecommit,
        protocol::testing::test_peer_context,
        utils::{bn_from_u64, testing::init_testing},
    };

    #[test]
    fn wire_bytes_round_trip() {
        let rng = &mut init_testing();
        let peers = test_peer_context(2);
        let from = peers.get(0).unwrap().clone();
        let cmt = HashCommitDecommit::new(rng, &[bn_from_u64(5)]);

        let message = Message::broadcast(&from, AddrGenContent::Round1(cmt.c));
        let bytes = message.wire_bytes().unwrap();
        let rebuilt =
            Message::<AddrGenContent>::from_wire(&bytes, from, true).unwrap();
        assert_eq!(rebuilt, message);
    }

    #[test]
    fn garbage_wire_bytes_are_rejected() {
        let peers = test_peer_context(2);
        let from = peers.get(0).unwrap().clone();
        assert!(Message::<AddrGenContent>::from_wire(&[0xff; 3], from, true).is_err());
    }
}
