//! Types and functions related to the address-generation sub-protocol.
//!
//! Produces a one-time receipt address for a recipient identified by its
//! long-term (view, sign) public key pair.
//!
//! # High-level protocol description
//! The address generation protocol runs in three rounds:
//! - In the first round, each participant samples a random partial scalar
//!   `ri` and broadcasts a commitment to it.
//! - Once all commitment broadcasts have been received, the second round
//!   proceeds by each participant opening its commitment to all other
//!   participants.
//! - In the third round, each participant checks the validity of all the
//!   openings (naming any participant whose opening fails as a culprit),
//!   aggregates the shared randomness `R = sum(rj) mod q`, and derives the
//!   one-time key `H(R·V)·G + S` together with `bigR = R·G`. Both are
//!   delivered on the end sink; the recipient later recovers `R·V` from
//!   `bigR` with its view secret.
// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

mod messages;
mod output;
mod rounds;

pub use messages::AddrGenContent;
pub use output::AddrGenOutput;

use crate::{
    errors::{Result, RoundError},
    messages::Message,
    party::{Party, Protocol, Round},
    protocol::Parameters,
    Ed25519,
};
use rounds::{AddrGenState, Round1};
use std::sync::mpsc::Sender;

/// The address-generation protocol.
#[derive(Debug)]
pub struct AddrGen;

impl Protocol for AddrGen {
    const NAME: &'static str = "addr-gen";
    type Content = AddrGenContent;
    type State = AddrGenState;
    type Output = AddrGenOutput;

    fn first_round() -> Box<dyn Round<Self>> {
        Box::new(Round1::new())
    }
}

/// Construct a party for one address-generation run.
///
/// `pub_view_key` and `pub_sign_key` are the recipient's long-term public
/// keys; every participant must be given the same pair.
pub fn new_party(
    params: Parameters,
    pub_view_key: Ed25519,
    pub_sign_key: Ed25519,
    out: Sender<Message<AddrGenContent>>,
    end: Sender<AddrGenOutput>,
    err: Sender<RoundError>,
) -> Result<Party<AddrGen>> {
    let state = AddrGenState::new(pub_view_key, pub_sign_key);
    Ok(Party::new(params, state, out, end, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commitments::HashCommitDecommit,
        curve::CurveTrait,
        errors::Fault,
        keys::derive_receipt_key,
        party::Status,
        protocol::testing::test_parameters,
        utils::{bn_from_u64, random_nonzero_bn, testing::init_testing},
    };
    use rand::{CryptoRng, RngCore};
    use std::sync::mpsc::{channel, Receiver};

    struct TestNet {
        parties: Vec<Party<AddrGen>>,
        outs: Vec<Receiver<Message<AddrGenContent>>>,
        ends: Vec<Receiver<AddrGenOutput>>,
        errs: Vec<Receiver<RoundError>>,
    }

    fn build_net<R: RngCore + CryptoRng>(rng: &mut R, n: usize, t: usize) -> TestNet {
        let q = Ed25519::order();
        let view_pub = Ed25519::scale_generator(&random_nonzero_bn(rng, &q).unwrap()).unwrap();
        let sign_pub = Ed25519::scale_generator(&random_nonzero_bn(rng, &q).unwrap()).unwrap();
        build_net_for_keys(n, t, view_pub, sign_pub)
    }

    fn build_net_for_keys(n: usize, t: usize, view_pub: Ed25519, sign_pub: Ed25519) -> TestNet {
        let mut parties = Vec::new();
        let mut outs = Vec::new();
        let mut ends = Vec::new();
        let mut errs = Vec::new();
        for params in test_parameters(n, t) {
            let (out_tx, out_rx) = channel();
            let (end_tx, end_rx) = channel();
            let (err_tx, err_rx) = channel();
            parties.push(new_party(params, view_pub, sign_pub, out_tx, end_tx, err_tx).unwrap());
            outs.push(out_rx);
            ends.push(end_rx);
            errs.push(err_rx);
        }
        TestNet {
            parties,
            outs,
            ends,
            errs,
        }
    }

    /// Deliver every queued broadcast to every other party until the network
    /// goes quiet. `tamper` may replace a message before delivery.
    fn route_until_quiet<R, F>(net: &mut TestNet, rng: &mut R, mut tamper: F)
    where
        R: RngCore + CryptoRng,
        F: FnMut(usize, Message<AddrGenContent>) -> Message<AddrGenContent>,
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
                    // Failures surface on the error sink; routing continues
                    // so other parties can reach their own verdicts.
                    let _ = party.update(rng, &message);
                }
            }
        }
    }

    #[test]
    fn honest_committees_agree_on_the_address() {
        let rng = &mut init_testing();
        let mut net = build_net(rng, 3, 1);
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }
        route_until_quiet(&mut net, rng, |_, m| m);

        let outputs: Vec<AddrGenOutput> = net
            .ends
            .iter()
            .map(|end| end.try_recv().expect("every party should finish"))
            .collect();
        for party in &net.parties {
            assert_eq!(*party.status(), Status::TerminatedSuccessfully);
        }
        for output in &outputs[1..] {
            assert_eq!(output.address, outputs[0].address);
            assert_eq!(output.big_r, outputs[0].big_r);
        }
    }

    #[test]
    fn the_view_key_recovers_the_address_from_big_r() {
        let rng = &mut init_testing();
        let q = Ed25519::order();
        let view_sk = random_nonzero_bn(rng, &q).unwrap();
        let view_pub = Ed25519::scale_generator(&view_sk).unwrap();
        let sign_pub = Ed25519::scale_generator(&random_nonzero_bn(rng, &q).unwrap()).unwrap();

        let mut net = build_net_for_keys(3, 1, view_pub, sign_pub);
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }
        route_until_quiet(&mut net, rng, |_, m| m);
        let output = net.ends[0].try_recv().unwrap();

        // hv·G + S recomputed from the view secret and bigR alone.
        let recovered = derive_receipt_key(&view_sk, &output.big_r, &sign_pub).unwrap();
        assert_eq!(recovered, output.address);
    }

    #[test]
    fn a_forged_decommitment_names_its_sender() {
        let rng = &mut init_testing();
        let mut net = build_net(rng, 3, 1);
        for party in net.parties.iter_mut() {
            party.start(rng).unwrap();
        }

        let forged = HashCommitDecommit::new(
            &mut rand::rngs::OsRng,
            &[bn_from_u64(999)],
        );
        route_until_quiet(&mut net, rng, |sender, message| {
            if sender == 2 && matches!(message.content(), AddrGenContent::Round2(_)) {
                Message::broadcast(message.from(), AddrGenContent::Round2(forged.d.clone()))
            } else {
                message
            }
        });

        // The two honest receivers blame participant 2 in round 3.
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
    fn messages_ahead_of_the_current_round_are_stashed() {
        let rng = &mut init_testing();
        let mut net = build_net(rng, 3, 1);
        // Parties 0 and 1 start; party 2's messages arrive before it starts.
        net.parties[0].start(rng).unwrap();
        net.parties[1].start(rng).unwrap();

        let mut stashed = Vec::new();
        for out in &net.outs[..2] {
            while let Ok(message) = out.try_recv() {
                stashed.push(message);
            }
        }
        for message in &stashed {
            let sender = message.from().index();
            for (index, party) in net.parties.iter_mut().enumerate() {
                if index != sender {
                    party.update(rng, message).unwrap();
                }
            }
        }
        net.parties[2].start(rng).unwrap();
        route_until_quiet(&mut net, rng, |_, m| m);

        for end in &net.ends {
            assert!(end.try_recv().is_ok());
        }
    }

    #[test]
    fn a_stranger_cannot_inject_messages() {
        let rng = &mut init_testing();
        let mut net = build_net(rng, 3, 1);
        net.parties[0].start(rng).unwrap();

        let stranger = crate::protocol::PartyId::new(1, "mallory", bn_from_u64(99));
        let forged = HashCommitDecommit::new(rng, &[bn_from_u64(1)]);
        let message = Message::broadcast(&stranger, AddrGenContent::Round1(forged.c));
        assert!(net.parties[0].update(rng, &message).is_err());
        let report = net.errs[0].try_recv().unwrap();
        assert_eq!(report.cause, Fault::InvalidSender);
    }
}
