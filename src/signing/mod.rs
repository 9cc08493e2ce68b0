//! Types and functions related to the threshold EdDSA signing sub-protocol.
//!
//! Produces a plain Ed25519 signature under the one-time receipt key, with
//! the private key never reconstructed anywhere.
//!
//! # High-level protocol description
//! The signing protocol runs in three rounds plus a finalization step:
//! - In the first round, each participant samples a nonce `ri` and
//!   broadcasts a commitment to the coordinates of `Ri = ri·G`.
//! - In the second round, each participant opens its commitment and attaches
//!   a Schnorr proof of knowledge of `ri`.
//! - In the third round, each participant checks every opening and proof
//!   (naming failures as culprits), moves each received nonce point into the
//!   prime-order subgroup, aggregates `R = sum(Rj)`, and derives the
//!   Ed25519 challenge `k = SHA-512(R || A || m) mod L` where `A` is the
//!   one-time key decoded from the receipt address. It then broadcasts the
//!   share `k·wi + ri`, keeping the stealth term `k·hv` local.
//! - Finalization sums its own full share with every received share,
//!   assembles `R || s`, and verifies it as an ordinary Ed25519 signature
//!   under the one-time key. A verification failure is fatal and carries no
//!   culprits.
//!
//! # Protocol input
//! Each signer provides the message bytes, its [`SigningKeyMaterial`] (the
//! Lagrange-weighted share of the signing key plus the shared view secret),
//! and the receipt address produced by transaction keygen. The signing
//! committee is exactly the peer context; the key material must have been
//! prepared for that committee.
// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

mod messages;
mod rounds;
mod signature;

pub use messages::{SignContent, SignDecommit, SignatureShare};
pub use signature::ThresholdSignature;

use crate::{
    address,
    errors::{Result, RoundError},
    keys::SigningKeyMaterial,
    messages::Message,
    party::{Party, Protocol, Round},
    protocol::Parameters,
};
use rounds::{Round1, SignState};
use std::sync::mpsc::Sender;
use tracing::error;
use zeroize::Zeroizing;

/// The threshold signing protocol.
#[derive(Debug)]
pub struct Signing;

impl Protocol for Signing {
    const NAME: &'static str = "sign";
    type Content = SignContent;
    type State = SignState;
    type Output = ThresholdSignature;

    fn first_round() -> Box<dyn Round<Self>> {
        Box::new(Round1::new())
    }
}

/// Construct a party for one signing run.
///
/// The receipt address is decoded here; a malformed address fails
/// construction.
pub fn new_party(
    params: Parameters,
    message: &[u8],
    key_material: SigningKeyMaterial,
    receipt_address: &str,
    out: Sender<Message<SignContent>>,
    end: Sender<ThresholdSignature>,
    err: Sender<RoundError>,
) -> Result<Party<Signing>> {
    let (one_time_pub, big_r_pub) = address::decode(receipt_address).map_err(|e| {
        error!("invalid receipt address given to signing");
        e
    })?;
    let SigningKeyMaterial { wi, view_key } = key_material;
    let state = SignState::new(
        message.to_vec(),
        wi,
        Zeroizing::new(view_key.sk),
        one_time_pub,
        big_r_pub,
    );
    Ok(Party::new(params, state, out, end, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address,
        commitments::HashCommitDecommit,
        curve::CurveTrait,
        ed25519::shared_point_hash,
        errors::Fault,
        keys::{testing::simulate_keygen, KeyData, SigningKeyMaterial},
        party::Status,
        protocol::{testing::test_peer_context, Parameters, PeerContext},
        utils::{bn_from_u64, random_nonzero_bn, testing::init_testing},
        Ed25519,
    };
    use rand::{CryptoRng, RngCore};
    use std::sync::mpsc::{channel, Receiver};
    use unknown_order::BigNumber;

    struct TestNet {
        parties: Vec<Party<Signing>>,
        outs: Vec<Receiver<Message<SignContent>>>,
        ends: Vec<Receiver<ThresholdSignature>>,
        errs: Vec<Receiver<RoundError>>,
    }

    /// Build a receipt address for the committee's long-term key: a fresh
    /// transaction scalar `r`, `bigR = r·G`, and the one-time key
    /// `H(r·V)·G + Y`.
    fn make_receipt_address<R: RngCore + CryptoRng>(rng: &mut R, key: &KeyData) -> String {
        let q = Ed25519::order();
        let r = random_nonzero_bn(rng, &q).unwrap();
        let big_r = Ed25519::scale_generator(&r).unwrap();
        let shared = key.view_key.pk.multiply_by_bignum(&r).unwrap();
        let hv = shared_point_hash(&shared).unwrap();
        let one_time = Ed25519::scale_generator(&hv).unwrap() + key.eddsa_pub;
        address::encode(&one_time, &big_r)
    }

    /// Build a signing net for the committee members named by their indices
    /// in the keygen peer context.
    fn build_net<R: RngCore + CryptoRng>(
        rng: &mut R,
        n: usize,
        t: usize,
        committee: &[usize],
        message: &[u8],
    ) -> (TestNet, String) {
        let keygen_peers = test_peer_context(n);
        let (key_data, _) = simulate_keygen(rng, &keygen_peers, t).unwrap();
        let receipt_address = make_receipt_address(rng, &key_data[0]);

        let signing_ids: Vec<BigNumber> = committee
            .iter()
            .map(|&i| key_data[i].share_id.clone())
            .collect();
        let signing_peers = PeerContext::new(
            committee
                .iter()
                .map(|&i| keygen_peers.get(i).unwrap().clone())
                .collect(),
        );

        let mut parties = Vec::new();
        let mut outs = Vec::new();
        let mut ends = Vec::new();
        let mut errs = Vec::new();
        for &i in committee {
            let material = SigningKeyMaterial::prepare(&key_data[i], &signing_ids).unwrap();
            let self_id = signing_peers
                .ids()
                .iter()
                .find(|id| id.key() == &key_data[i].share_id)
                .unwrap()
                .clone();
            let params = Parameters::new(signing_peers.clone(), self_id, t).unwrap();
            let (out_tx, out_rx) = channel();
            let (end_tx, end_rx) = channel();
            let (err_tx, err_rx) = channel();
            parties.push(
                new_party(
                    params,
                    message,
                    material,
                    &receipt_address,
                    out_tx,
                    end_tx,
                    err_tx,
                )
                .unwrap(),
            );
            outs.push(out_rx);
            ends.push(end_rx);
            errs.push(err_rx);
        }
        (
            TestNet {
                parties,
                outs,
                ends,
                errs,
            },
            receipt_address,
        )
    }

    fn route_until_quiet<R, F>(net: &mut TestNet, rng: &mut R, mut tamper: F)
    where
        R: RngCore + CryptoRng,
        F: FnMut(usize, Message<SignContent>) -> Message<SignContent>,
    {
        loop {
            let mut deliveries = Vec::new();
            for (sender, out) in net.outs.iter().enumerate() {
                while let Ok(message) = out.try_recv() {
                    deliveries.push((sender, tamper(sender, message)));
                }
            }
            if deliveries.is_empty() {
                return;
            }
            for (sender, message) in deliveries {
                for (receiver, party) in net.parties.iter_mut().enumerate() {
                    if receiver == sender || *party.status() != Status::InProgress {
                        continue;
                    }
                    let _ = party.update(rng, &message);
                }
            }
        }
    }

    #[test]
    fn a_threshold_committee_produces_a_valid_signature() {
        let rng = &mut init_testing();
        let message = b"hello";
        // t + 1 = 2 signers out of n = 3.
        let (mut net, receipt_address) = build_net(rng, 3, 1, &[0, 2], message);
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }
        route_until_quiet(&mut net, rng, |_, m| m);

        let signatures: Vec<ThresholdSignature> = net
            .ends
            .iter()
            .map(|end| end.try_recv().expect("every signer should finish"))
            .collect();
        assert_eq!(signatures[0], signatures[1]);

        // The 64-byte signature verifies as plain Ed25519 under the one-time
        // key decoded from the receipt address.
        let (one_time_pub, _) = address::decode(&receipt_address).unwrap();
        assert!(signatures[0].verify(&one_time_pub, message).is_ok());
        assert_eq!(signatures[0].to_bytes().len(), 64);
    }

    #[test]
    fn the_full_committee_can_sign_too() {
        let rng = &mut init_testing();
        let message = b"all three of us";
        let (mut net, receipt_address) = build_net(rng, 3, 1, &[0, 1, 2], message);
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }
        route_until_quiet(&mut net, rng, |_, m| m);

        let (one_time_pub, _) = address::decode(&receipt_address).unwrap();
        for end in &net.ends {
            let signature = end.try_recv().unwrap();
            assert!(signature.verify(&one_time_pub, message).is_ok());
        }
    }

    #[test]
    fn a_forged_nonce_opening_names_its_sender() {
        let rng = &mut init_testing();
        let (mut net, _) = build_net(rng, 3, 1, &[0, 1, 2], b"blame");
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }

        // Participant 2 opens a commitment inconsistent with round 1.
        let bogus_point = Ed25519::random(&mut rand::rngs::OsRng);
        let (x, y) = bogus_point.affine_xy().unwrap();
        let forged_opening = HashCommitDecommit::new(&mut rand::rngs::OsRng, &[x, y]);
        route_until_quiet(&mut net, rng, |sender, message| {
            if sender == 2 {
                if let SignContent::Round2(SignDecommit { proof, .. }) = message.content() {
                    return Message::broadcast(
                        message.from(),
                        SignContent::Round2(SignDecommit {
                            decommitment: forged_opening.d.clone(),
                            proof: proof.clone(),
                        }),
                    );
                }
            }
            message
        });

        for honest in [0, 1] {
            assert_eq!(*net.parties[honest].status(), Status::Failed);
            let report = net.errs[honest].try_recv().expect("failure was reported");
            assert_eq!(report.cause, Fault::DecommitFailed);
            assert_eq!(report.round, 3);
            assert_eq!(report.culprits.len(), 1);
            assert_eq!(report.culprits[0].index(), 2);
        }
    }

    #[test]
    fn a_proof_for_the_wrong_nonce_names_its_sender() {
        let rng = &mut init_testing();
        let (mut net, _) = build_net(rng, 3, 1, &[0, 1, 2], b"wrong proof");
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }

        // Participant 2 keeps its honest opening but attaches a proof for a
        // nonce it does not hold.
        let other_rng = &mut rand::rngs::OsRng;
        let wrong_nonce = random_nonzero_bn(other_rng, &Ed25519::order()).unwrap();
        let wrong_point = Ed25519::scale_generator(&wrong_nonce).unwrap();
        let wrong_proof =
            crate::zkp::DLogProof::new(other_rng, &wrong_nonce, &wrong_point).unwrap();
        route_until_quiet(&mut net, rng, |sender, message| {
            if sender == 2 {
                if let SignContent::Round2(SignDecommit { decommitment, .. }) = message.content()
                {
                    return Message::broadcast(
                        message.from(),
                        SignContent::Round2(SignDecommit {
                            decommitment: decommitment.clone(),
                            proof: wrong_proof.clone(),
                        }),
                    );
                }
            }
            message
        });

        for honest in [0, 1] {
            assert_eq!(*net.parties[honest].status(), Status::Failed);
            let report = net.errs[honest].try_recv().expect("failure was reported");
            assert_eq!(report.cause, Fault::ZkFailed);
            assert_eq!(report.culprits.len(), 1);
            assert_eq!(report.culprits[0].index(), 2);
        }
    }

    #[test]
    fn a_corrupted_share_fails_finalization_without_culprits() {
        let rng = &mut init_testing();
        let (mut net, _) = build_net(rng, 3, 1, &[0, 1, 2], b"corrupt");
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }

        route_until_quiet(&mut net, rng, |sender, message| {
            if sender == 1 && matches!(message.content(), SignContent::Round3(_)) {
                return Message::broadcast(
                    message.from(),
                    SignContent::Round3(SignatureShare(bn_from_u64(12345))),
                );
            }
            message
        });

        for honest in [0, 2] {
            assert_eq!(*net.parties[honest].status(), Status::Failed);
            let report = net.errs[honest].try_recv().expect("failure was reported");
            assert_eq!(report.cause, Fault::VerificationFailed);
            assert_eq!(report.round, 4);
            assert!(report.culprits.is_empty());
        }
    }

    #[test]
    fn malformed_receipt_addresses_fail_construction() {
        let rng = &mut init_testing();
        let peers = test_peer_context(2);
        let (key_data, _) = simulate_keygen(rng, &peers, 1).unwrap();
        let signing_ids: Vec<BigNumber> =
            key_data.iter().map(|key| key.share_id.clone()).collect();
        let material = SigningKeyMaterial::prepare(&key_data[0], &signing_ids).unwrap();
        let params = Parameters::new(peers.clone(), peers.get(0).unwrap().clone(), 1).unwrap();
        let (out_tx, _out_rx) = channel();
        let (end_tx, _end_rx) = channel();
        let (err_tx, _err_rx) = channel();
        assert!(new_party(
            params,
            b"msg",
            material,
            "bogus-address",
            out_tx,
            end_tx,
            err_tx
        )
        .is_err());
    }
}
