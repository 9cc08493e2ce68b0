// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{
    messages::{AddrGenContent, ROUND_ONE, ROUND_TWO},
    output::AddrGenOutput,
    AddrGen,
};
use crate::{
    commitments::HashCommitDecommit,
    curve::CurveTrait,
    ed25519::shared_point_hash,
    errors::{Fault, RoundError},
    messages::Message,
    party::{fanout_peers, ProtocolRng, Round, RoundCtx},
    utils::random_nonzero_bn,
    Ed25519,
};
use tracing::{error, info, instrument};
use unknown_order::BigNumber;
use zeroize::Zeroizing;

/// Per-run temporary state shared by the rounds; thrown away when the party
/// finishes.
pub struct AddrGenState {
    pub_view_key: Ed25519,
    pub_sign_key: Ed25519,
    /// Our partial scalar, sampled in round 1.
    ri: Option<Zeroizing<BigNumber>>,
    /// Our commitment to `ri` and its opening.
    commitment: Option<HashCommitDecommit>,
}

impl AddrGenState {
    pub(super) fn new(pub_view_key: Ed25519, pub_sign_key: Ed25519) -> Self {
        Self {
            pub_view_key,
            pub_sign_key,
            ri: None,
            commitment: None,
        }
    }
}

/// Round 1: sample `ri` and broadcast a commitment to it.
pub(super) struct Round1 {
    started: bool,
}

impl Round1 {
    pub(super) fn new() -> Self {
        Self { started: false }
    }
}

impl Round<AddrGen> for Round1 {
    fn number(&self) -> u16 {
        1
    }

    #[instrument(skip_all)]
    fn start(
        &mut self,
        mut rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, AddrGen>,
    ) -> std::result::Result<(), RoundError> {
        if self.started {
            return Err(ctx.error(1, Fault::AlreadyStarted, Vec::new()));
        }
        self.started = true;
        info!("Generating round one addr-gen messages.");

        let ri = random_nonzero_bn(&mut rng, &Ed25519::order())
            .map_err(|e| ctx.computation(1, e))?;
        let commitment = HashCommitDecommit::new(&mut rng, &[ri.clone()]);
        ctx.state.ri = Some(Zeroizing::new(ri));

        let c = commitment.c.clone();
        ctx.state.commitment = Some(commitment);
        ctx.broadcast(1, AddrGenContent::Round1(c))
    }

    fn can_accept(&self, message: &Message<AddrGenContent>) -> bool {
        matches!(message.content(), AddrGenContent::Round1(_)) && message.is_broadcast()
    }

    fn update(
        &mut self,
        ctx: &mut RoundCtx<'_, AddrGen>,
    ) -> std::result::Result<bool, RoundError> {
        Ok(ctx
            .store
            .complete_where(ROUND_ONE, |message| self.can_accept(message)))
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<AddrGen>>> {
        Some(Box::new(Round2 { started: false }))
    }
}

/// Round 2: open the round-1 commitment to everyone.
pub(super) struct Round2 {
    started: bool,
}

impl Round<AddrGen> for Round2 {
    fn number(&self) -> u16 {
        2
    }

    #[instrument(skip_all)]
    fn start(
        &mut self,
        _rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, AddrGen>,
    ) -> std::result::Result<(), RoundError> {
        if self.started {
            return Err(ctx.error(2, Fault::AlreadyStarted, Vec::new()));
        }
        self.started = true;
        info!("Generating round two addr-gen messages.");

        let decommitment = match &ctx.state.commitment {
            Some(commitment) => commitment.d.clone(),
            None => {
                error!("round two started without a round-one commitment");
                return Err(ctx.error(
                    2,
                    Fault::Computation("missing our own commitment".into()),
                    Vec::new(),
                ));
            }
        };
        ctx.broadcast(2, AddrGenContent::Round2(decommitment))
    }

    fn can_accept(&self, message: &Message<AddrGenContent>) -> bool {
        matches!(message.content(), AddrGenContent::Round2(_)) && message.is_broadcast()
    }

    fn update(
        &mut self,
        ctx: &mut RoundCtx<'_, AddrGen>,
    ) -> std::result::Result<bool, RoundError> {
        Ok(ctx
            .store
            .complete_where(ROUND_TWO, |message| self.can_accept(message)))
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<AddrGen>>> {
        Some(Box::new(Round3 { started: false }))
    }
}

/// Round 3: verify every opening, aggregate `R`, and derive the one-time
/// address. Expects no inbound messages.
pub(super) struct Round3 {
    started: bool,
}

impl Round<AddrGen> for Round3 {
    fn number(&self) -> u16 {
        3
    }

    #[instrument(skip_all)]
    fn start(
        &mut self,
        _rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, AddrGen>,
    ) -> std::result::Result<(), RoundError> {
        if self.started {
            return Err(ctx.error(3, Fault::AlreadyStarted, Vec::new()));
        }
        self.started = true;
        info!("Verifying addr-gen openings and deriving the address.");

        let party_count = ctx.party_count();
        let self_index = ctx.self_index();

        // Pair every peer's commitment with its opening.
        let mut openings: Vec<Option<HashCommitDecommit>> = vec![None; party_count];
        for j in 0..party_count {
            if j == self_index {
                continue;
            }
            let (c, d) = match (ctx.store.content(ROUND_ONE, j), ctx.store.content(ROUND_TWO, j)) {
                (Some(AddrGenContent::Round1(c)), Some(AddrGenContent::Round2(d))) => {
                    (c.clone(), d.clone())
                }
                _ => {
                    error!("round three started with incomplete message slots");
                    return Err(ctx.error(
                        3,
                        Fault::Computation("missing a peer's messages".into()),
                        Vec::new(),
                    ));
                }
            };
            openings[j] = Some(HashCommitDecommit::from_parts(c, d));
        }

        // Per-peer verification fans out across workers; each reports its
        // recovered share or nothing.
        let results = fanout_peers(party_count, self_index, |j| {
            let opening = openings[j].as_ref().expect("peer opening was collected");
            match opening.decommit() {
                Some(values) if values.len() == 1 => Some(values[0].clone()),
                _ => None,
            }
        });

        let mut culprits = Vec::new();
        let mut shares: Vec<BigNumber> = Vec::with_capacity(party_count);
        for (j, share) in results {
            match share {
                Some(share) => shares.push(share),
                None => {
                    if let Some(peer) = ctx.params().peers().get(j) {
                        culprits.push(peer.clone());
                    }
                }
            }
        }
        if !culprits.is_empty() {
            error!("{} de-commitment(s) failed to verify", culprits.len());
            return Err(ctx.error(3, Fault::DecommitFailed, culprits));
        }

        let q = Ed25519::order();
        let ri = ctx.state.ri.as_ref().ok_or_else(|| {
            ctx.error(3, Fault::Computation("missing our own scalar".into()), Vec::new())
        })?;
        let big_r_scalar = shares
            .into_iter()
            .fold((**ri).clone() % &q, |acc, share| (acc + share) % &q);

        let compute = || -> crate::errors::Result<AddrGenOutput> {
            let big_r = Ed25519::scale_generator(&big_r_scalar)?;
            // address = H(R·V)·G + S
            let shared = ctx.state.pub_view_key.multiply_by_bignum(&big_r_scalar)?;
            let hv = shared_point_hash(&shared)?;
            let address = Ed25519::scale_generator(&hv)? + ctx.state.pub_sign_key;
            Ok(AddrGenOutput { address, big_r })
        };
        let output = compute().map_err(|e| ctx.computation(3, e))?;
        ctx.finish(3, output)
    }

    fn can_accept(&self, _message: &Message<AddrGenContent>) -> bool {
        // Not expecting any incoming messages in this round.
        false
    }

    fn update(
        &mut self,
        _ctx: &mut RoundCtx<'_, AddrGen>,
    ) -> std::result::Result<bool, RoundError> {
        // Vacuously ready: the round consumed its inputs in `start`.
        Ok(true)
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<AddrGen>>> {
        None // finished!
    }
}
