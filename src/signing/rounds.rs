// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{
    messages::{SignContent, SignDecommit, SignatureShare, ROUND_ONE, ROUND_THREE, ROUND_TWO},
    signature::ThresholdSignature,
    Signing,
};
use crate::{
    commitments::HashCommitDecommit,
    curve::CurveTrait,
    ed25519::shared_point_hash,
    errors::{Fault, RoundError},
    messages::Message,
    party::{fanout_peers, ProtocolRng, Round, RoundCtx},
    utils::random_nonzero_bn,
    zkp::DLogProof,
    Ed25519,
};
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha512};
use tracing::{error, info, instrument};
use unknown_order::BigNumber;
use zeroize::Zeroizing;

/// Per-run temporary state shared by the rounds.
pub struct SignState {
    message: Vec<u8>,
    /// Our additive share of the signing key.
    wi: Zeroizing<BigNumber>,
    /// The committee-shared view secret.
    view_sk: Zeroizing<BigNumber>,
    /// The one-time verification key decoded from the receipt address.
    one_time_pub: Ed25519,
    /// The committee randomness `R·G` decoded from the receipt address.
    big_r_pub: Ed25519,
    /// Our nonce, sampled in round 1.
    ri: Option<Zeroizing<BigNumber>>,
    /// Our nonce point `ri·G`.
    big_ri: Option<Ed25519>,
    /// Our commitment to the coordinates of `big_ri`.
    commitment: Option<HashCommitDecommit>,
    /// The aggregate nonce point, computed in round 3.
    aggregate_r: Option<Ed25519>,
    /// Our full local share `k·wi + ri + k·hv`, computed in round 3.
    si: Option<Zeroizing<Scalar>>,
}

impl SignState {
    pub(super) fn new(
        message: Vec<u8>,
        wi: Zeroizing<BigNumber>,
        view_sk: Zeroizing<BigNumber>,
        one_time_pub: Ed25519,
        big_r_pub: Ed25519,
    ) -> Self {
        Self {
            message,
            wi,
            view_sk,
            one_time_pub,
            big_r_pub,
            ri: None,
            big_ri: None,
            commitment: None,
            aggregate_r: None,
            si: None,
        }
    }
}

/// Round 1: sample the nonce `ri` and broadcast a commitment to the
/// coordinates of `Ri = ri·G`.
pub(super) struct Round1 {
    started: bool,
}

impl Round1 {
    pub(super) fn new() -> Self {
        Self { started: false }
    }
}

impl Round<Signing> for Round1 {
    fn number(&self) -> u16 {
        1
    }

    #[instrument(skip_all)]
    fn start(
        &mut self,
        mut rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<(), RoundError> {
        if self.started {
            return Err(ctx.error(1, Fault::AlreadyStarted, Vec::new()));
        }
        self.started = true;
        info!("Generating round one signing messages.");

        let ri = random_nonzero_bn(&mut rng, &Ed25519::order())
            .map_err(|e| ctx.computation(1, e))?;
        let big_ri = Ed25519::scale_generator(&ri).map_err(|e| ctx.computation(1, e))?;
        let (x, y) = big_ri.affine_xy().map_err(|e| ctx.computation(1, e))?;
        let commitment = HashCommitDecommit::new(&mut rng, &[x, y]);

        ctx.state.ri = Some(Zeroizing::new(ri));
        ctx.state.big_ri = Some(big_ri);
        let c = commitment.c.clone();
        ctx.state.commitment = Some(commitment);
        ctx.broadcast(1, SignContent::Round1(c))
    }

    fn can_accept(&self, message: &Message<SignContent>) -> bool {
        matches!(message.content(), SignContent::Round1(_)) && message.is_broadcast()
    }

    fn update(
        &mut self,
        ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<bool, RoundError> {
        Ok(ctx
            .store
            .complete_where(ROUND_ONE, |message| self.can_accept(message)))
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<Signing>>> {
        Some(Box::new(Round2 { started: false }))
    }
}

/// Round 2: open the commitment and prove knowledge of `ri`.
pub(super) struct Round2 {
    started: bool,
}

impl Round<Signing> for Round2 {
    fn number(&self) -> u16 {
        2
    }

    #[instrument(skip_all)]
    fn start(
        &mut self,
        mut rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<(), RoundError> {
        if self.started {
            return Err(ctx.error(2, Fault::AlreadyStarted, Vec::new()));
        }
        self.started = true;
        info!("Generating round two signing messages.");

        let (decommitment, proof) = {
            let (ri, big_ri, commitment) = match (
                ctx.state.ri.as_ref(),
                ctx.state.big_ri.as_ref(),
                ctx.state.commitment.as_ref(),
            ) {
                (Some(ri), Some(big_ri), Some(commitment)) => (ri, big_ri, commitment),
                _ => {
                    error!("round two started without round-one state");
                    return Err(ctx.error(
                        2,
                        Fault::Computation("missing our own nonce".into()),
                        Vec::new(),
                    ));
                }
            };
            let proof = DLogProof::new(&mut rng, ri, big_ri)
                .map_err(|e| ctx.computation(2, e))?;
            (commitment.d.clone(), proof)
        };
        ctx.broadcast(2, SignContent::Round2(SignDecommit { decommitment, proof }))
    }

    fn can_accept(&self, message: &Message<SignContent>) -> bool {
        matches!(message.content(), SignContent::Round2(_)) && message.is_broadcast()
    }

    fn update(
        &mut self,
        ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<bool, RoundError> {
        Ok(ctx
            .store
            .complete_where(ROUND_TWO, |message| self.can_accept(message)))
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<Signing>>> {
        Some(Box::new(Round3 { started: false }))
    }
}

/// Round 3: verify every opening and nonce proof, aggregate `R`, and
/// broadcast our signature share.
pub(super) struct Round3 {
    started: bool,
}

impl Round<Signing> for Round3 {
    fn number(&self) -> u16 {
        3
    }

    #[instrument(skip_all)]
    fn start(
        &mut self,
        _rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<(), RoundError> {
        if self.started {
            return Err(ctx.error(3, Fault::AlreadyStarted, Vec::new()));
        }
        self.started = true;
        info!("Verifying signing openings and producing our share.");

        let party_count = ctx.party_count();
        let self_index = ctx.self_index();

        // Pair every peer's commitment with its opening and nonce proof.
        let mut inputs: Vec<Option<(HashCommitDecommit, DLogProof<Ed25519>)>> =
            vec![None; party_count];
        for j in 0..party_count {
            if j == self_index {
                continue;
            }
            let pair = match (ctx.store.content(ROUND_ONE, j), ctx.store.content(ROUND_TWO, j)) {
                (
                    Some(SignContent::Round1(c)),
                    Some(SignContent::Round2(SignDecommit { decommitment, proof })),
                ) => (
                    HashCommitDecommit::from_parts(c.clone(), decommitment.clone()),
                    proof.clone(),
                ),
                _ => {
                    error!("round three started with incomplete message slots");
                    return Err(ctx.error(
                        3,
                        Fault::Computation("missing a peer's messages".into()),
                        Vec::new(),
                    ));
                }
            };
            inputs[j] = Some(pair);
        }

        // Per-peer verification: open the commitment to (x, y), move the
        // point into the prime-order subgroup, and check the nonce proof.
        let results = fanout_peers(party_count, self_index, |j| {
            let (opening, proof) = inputs[j].as_ref().expect("peer input was collected");
            let values = opening.decommit().ok_or(Fault::DecommitFailed)?;
            if values.len() != 2 {
                return Err(Fault::DecommitFailed);
            }
            let point = Ed25519::try_from_affine(&values[0], &values[1])
                .map_err(|_| Fault::DecommitFailed)?;
            let point = point.clear_cofactor();
            proof.verify(&point).map_err(|_| Fault::ZkFailed)?;
            Ok(point)
        });

        let mut opening_culprits = Vec::new();
        let mut proof_culprits = Vec::new();
        let mut nonce_points = Vec::with_capacity(party_count);
        for (j, outcome) in results {
            let peer = ctx.params().peers().get(j).cloned();
            match outcome {
                Ok(point) => nonce_points.push(point),
                Err(Fault::ZkFailed) => proof_culprits.extend(peer),
                Err(_) => opening_culprits.extend(peer),
            }
        }
        if !opening_culprits.is_empty() {
            error!("{} nonce opening(s) failed to verify", opening_culprits.len());
            return Err(ctx.error(3, Fault::DecommitFailed, opening_culprits));
        }
        if !proof_culprits.is_empty() {
            error!("{} nonce proof(s) failed to verify", proof_culprits.len());
            return Err(ctx.error(3, Fault::ZkFailed, proof_culprits));
        }

        let (ri, big_ri) = match (ctx.state.ri.as_ref(), ctx.state.big_ri.as_ref()) {
            (Some(ri), Some(big_ri)) => (ri, big_ri),
            _ => {
                return Err(ctx.error(
                    3,
                    Fault::Computation("missing our own nonce".into()),
                    Vec::new(),
                ))
            }
        };
        let aggregate_r = nonce_points
            .into_iter()
            .fold(*big_ri, |acc, point| acc + point);

        let compute = || -> crate::errors::Result<(Ed25519, Scalar, Scalar)> {
            // The standard Ed25519 challenge k = SHA-512(R || A || m),
            // reduced little-endian mod L.
            let mut hasher = Sha512::new();
            hasher.update(aggregate_r.compress());
            hasher.update(ctx.state.one_time_pub.compress());
            hasher.update(&ctx.state.message);
            let mut wide = [0u8; 64];
            wide.copy_from_slice(&hasher.finalize());
            let k = Scalar::from_bytes_mod_order_wide(&wide);

            // The stealth term: hv = SHA-512(viewSk·bigR) mod L equals the
            // hash the address side derived from R·V.
            let shared = ctx.state.big_r_pub.multiply_by_bignum(&ctx.state.view_sk)?;
            let hv = shared_point_hash(&shared)?;

            let w = Ed25519::bn_to_scalar(&ctx.state.wi)?;
            let r = Ed25519::bn_to_scalar(ri)?;
            let hv = Ed25519::bn_to_scalar(&hv)?;

            // Broadcast k·wi + ri; keep the stealth term local so the
            // finalized sum carries it exactly once.
            let broadcast_share = k * w + r;
            let si = broadcast_share + k * hv;
            Ok((aggregate_r, broadcast_share, si))
        };
        let (aggregate_r, broadcast_share, si) = compute().map_err(|e| ctx.computation(3, e))?;

        ctx.state.aggregate_r = Some(aggregate_r);
        ctx.state.si = Some(Zeroizing::new(si));
        ctx.broadcast(
            3,
            SignContent::Round3(SignatureShare(Ed25519::scalar_to_bn(&broadcast_share))),
        )
    }

    fn can_accept(&self, message: &Message<SignContent>) -> bool {
        matches!(message.content(), SignContent::Round3(_)) && message.is_broadcast()
    }

    fn update(
        &mut self,
        ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<bool, RoundError> {
        Ok(ctx
            .store
            .complete_where(ROUND_THREE, |message| self.can_accept(message)))
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<Signing>>> {
        Some(Box::new(Finalize { started: false }))
    }
}

/// Finalize: sum the shares, assemble the 64-byte signature, and verify it
/// under the one-time key. Expects no inbound messages.
pub(super) struct Finalize {
    started: bool,
}

impl Round<Signing> for Finalize {
    fn number(&self) -> u16 {
        4
    }

    #[instrument(skip_all)]
    fn start(
        &mut self,
        _rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<(), RoundError> {
        if self.started {
            return Err(ctx.error(4, Fault::AlreadyStarted, Vec::new()));
        }
        self.started = true;
        info!("Finalizing the threshold signature.");

        let party_count = ctx.party_count();
        let self_index = ctx.self_index();
        let (si, aggregate_r) = match (ctx.state.si.as_ref(), ctx.state.aggregate_r.as_ref()) {
            (Some(si), Some(aggregate_r)) => (si, aggregate_r),
            _ => {
                return Err(ctx.error(
                    4,
                    Fault::Computation("missing round-three state".into()),
                    Vec::new(),
                ))
            }
        };

        let mut sum = **si;
        for j in 0..party_count {
            if j == self_index {
                continue;
            }
            let share = match ctx.store.content(ROUND_THREE, j) {
                Some(SignContent::Round3(SignatureShare(share))) => {
                    Ed25519::bn_to_scalar(share).map_err(|e| ctx.computation(4, e))?
                }
                _ => {
                    error!("finalize started with incomplete message slots");
                    return Err(ctx.error(
                        4,
                        Fault::Computation("missing a peer's share".into()),
                        Vec::new(),
                    ));
                }
            };
            sum += share;
        }

        let signature = ThresholdSignature {
            r: aggregate_r.compress(),
            s: sum.to_bytes(),
        };
        // Without an identifiable-abort sub-protocol a bad signature has no
        // attributable culprit.
        if signature
            .verify(&ctx.state.one_time_pub, &ctx.state.message)
            .is_err()
        {
            error!("finalized signature failed Ed25519 verification");
            return Err(ctx.error(4, Fault::VerificationFailed, Vec::new()));
        }
        ctx.finish(4, signature)
    }

    fn can_accept(&self, _message: &Message<SignContent>) -> bool {
        // Not expecting any incoming messages in this round.
        false
    }

    fn update(
        &mut self,
        _ctx: &mut RoundCtx<'_, Signing>,
    ) -> std::result::Result<bool, RoundError> {
        Ok(true)
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<Signing>>> {
        None // finished!
    }
}
