// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Long-term key material and signing-share preparation.
//!
//! Key generation itself is a prior ceremony; this module defines the
//! contract of its output (each participant's Shamir share of the signing
//! key, the share ids of the whole committee, the shared view key) and the
//! preparation step that Lagrange-weights a Shamir share into the additive
//! share the signing protocol consumes.

use crate::{
    curve::CurveTrait,
    ed25519::{shared_point_hash, Ed25519},
    errors::{CallerError, Result},
    utils::lagrange_coefficient_at_zero,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use unknown_order::BigNumber;
use zeroize::Zeroizing;

/// The recipient's view key pair. The whole committee holds the same view
/// secret; it is what lets a recipient detect payments to its one-time
/// addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewKey {
    /// The view secret scalar.
    pub sk: BigNumber,
    /// The view public key `sk·G`.
    pub pk: Ed25519,
}

impl ViewKey {
    /// Build a view key pair from its secret scalar.
    pub fn from_sk(sk: BigNumber) -> Result<Self> {
        let pk = Ed25519::scale_generator(&sk)?;
        Ok(Self { sk, pk })
    }
}

/// One participant's output of the long-term key-generation ceremony.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyData {
    /// Our private Shamir share of the signing key.
    pub xi: BigNumber,
    /// Our share id (the evaluation point of our share).
    pub share_id: BigNumber,
    /// Every participant's share id, in keygen order.
    pub ks: Vec<BigNumber>,
    /// The committee-shared view key.
    pub view_key: ViewKey,
    /// The joint EdDSA public key `s·G`.
    pub eddsa_pub: Ed25519,
}

/// The key material one signer feeds into the signing protocol: the Shamir
/// share already weighted into an additive share for the signing committee.
#[derive(Debug)]
pub struct SigningKeyMaterial {
    /// The additive share `wi = λi·xi mod q`; summing the committee's shares
    /// yields the signing key.
    pub(crate) wi: Zeroizing<BigNumber>,
    /// The committee-shared view key.
    pub(crate) view_key: ViewKey,
}

impl SigningKeyMaterial {
    /// Weight `key`'s Shamir share for a signing committee identified by its
    /// share ids. The committee must include our own share id, and must have
    /// more members than the sharing threshold for the weights to
    /// reconstruct the secret.
    pub fn prepare(key: &KeyData, signing_ids: &[BigNumber]) -> Result<Self> {
        if !signing_ids.contains(&key.share_id) {
            error!("our share id is not part of the signing committee");
            Err(CallerError::BadInput)?
        }
        let q = Ed25519::order();
        let lambda = lagrange_coefficient_at_zero(&key.share_id, signing_ids, &q)?;
        let wi = Zeroizing::new(&key.xi * lambda % q);
        Ok(Self {
            wi,
            view_key: key.view_key.clone(),
        })
    }

    /// The committee-shared view key.
    pub fn view_key(&self) -> &ViewKey {
        &self.view_key
    }
}

/// Recompute the one-time receipt key from the published committee
/// randomness `bigR` and the recipient's view secret:
/// `H(viewSk·bigR)·G + S`.
///
/// A recipient scans for payments by checking the result against the
/// one-time address a sender claims to have paid.
pub fn derive_receipt_key(
    view_sk: &BigNumber,
    big_r: &Ed25519,
    sign_pub: &Ed25519,
) -> Result<Ed25519> {
    let shared = big_r.multiply_by_bignum(view_sk)?;
    let hv = shared_point_hash(&shared)?;
    Ok(Ed25519::scale_generator(&hv)? + *sign_pub)
}


#[cfg(test)]
mod tests {
    use super::{testing::simulate_keygen, *};
    use crate::{
        protocol::testing::test_peer_context,
        utils::{random_nonzero_bn, testing::init_testing},
    };

    #[test]
    fn weighted_shares_reconstruct_the_signing_key() {
        let rng = &mut init_testing();
        let peers = test_peer_context(4);
        let (key_data, signing_sk) = simulate_keygen(rng, &peers, 2).unwrap();
        let q = Ed25519::order();

        // Any t + 1 = 3 shares reconstruct; use a non-contiguous committee.
        let committee = [0usize, 1, 3];
        let signing_ids: Vec<BigNumber> = committee
            .iter()
            .map(|&i| key_data[i].share_id.clone())
            .collect();
        let reconstructed = committee
            .iter()
            .map(|&i| SigningKeyMaterial::prepare(&key_data[i], &signing_ids).unwrap())
            .fold(BigNumber::zero(), |acc, material| {
                (acc + (*material.wi).clone()) % &q
            });
        assert_eq!(reconstructed, signing_sk % q);
    }

    #[test]
    fn preparation_requires_committee_membership() {
        let rng = &mut init_testing();
        let peers = test_peer_context(3);
        let (key_data, _) = simulate_keygen(rng, &peers, 1).unwrap();
        let other_ids = vec![
            key_data[1].share_id.clone(),
            key_data[2].share_id.clone(),
        ];
        assert!(SigningKeyMaterial::prepare(&key_data[0], &other_ids).is_err());
    }

    #[test]
    fn receipt_keys_match_the_address_derivation() {
        let rng = &mut init_testing();
        let q = Ed25519::order();
        let view_key = ViewKey::from_sk(random_nonzero_bn(rng, &q).unwrap()).unwrap();
        let sign_pub = Ed25519::random(rng);

        // The sender derives from (R, V); the recipient from (viewSk, R·G).
        let r = random_nonzero_bn(rng, &q).unwrap();
        let big_r = Ed25519::scale_generator(&r).unwrap();
        let shared = view_key.pk.multiply_by_bignum(&r).unwrap();
        let hv = shared_point_hash(&shared).unwrap();
        let sender_side = Ed25519::scale_generator(&hv).unwrap() + sign_pub;

        let recipient_side = derive_receipt_key(&view_key.sk, &big_r, &sign_pub).unwrap();
        assert_eq!(recipient_side, sender_side);
    }
}
