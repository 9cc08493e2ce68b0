// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A two-message hash commitment scheme over tuples of integers.
//!
//! The committer broadcasts `C = SHA-512/256(r || values...)` for a random
//! 256-bit blind `r`, and later opens by broadcasting the full de-commitment
//! `[r, values...]`. The receiver recomputes the hash to check the opening.

use crate::utils::{random_positive_bn, sha512_256i};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;
use unknown_order::BigNumber;

/// Bit length of the random blind prepended to the committed values.
const BLIND_BITS: usize = 256;

/// The first, hiding message of the scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCommitment(BigNumber);

/// The opening of a [`HashCommitment`]: the blind followed by the committed
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDecommitment(Vec<BigNumber>);

/// A commitment together with its opening, as held by the committer between
/// rounds.
#[derive(Debug, Clone)]
pub struct HashCommitDecommit {
    pub c: HashCommitment,
    pub d: HashDecommitment,
}

impl HashCommitDecommit {
    /// Commit to `values`.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R, values: &[BigNumber]) -> Self {
        let blind = random_positive_bn(rng, &(BigNumber::one() << BLIND_BITS));
        let mut opening = Vec::with_capacity(values.len() + 1);
        opening.push(blind);
        opening.extend_from_slice(values);

        let refs: Vec<&BigNumber> = opening.iter().collect();
        let c = HashCommitment(sha512_256i(&refs));
        HashCommitDecommit {
            c,
            d: HashDecommitment(opening),
        }
    }

    /// Rebuild the pair from a stored commitment and a received opening.
    pub fn from_parts(c: HashCommitment, d: HashDecommitment) -> Self {
        HashCommitDecommit { c, d }
    }

    /// Check the opening against the commitment; on success, return the
    /// committed values without the blind.
    pub fn decommit(&self) -> Option<Vec<BigNumber>> {
        let HashDecommitment(opening) = &self.d;
        if opening.is_empty() {
            error!("de-commitment is missing its blind");
            return None;
        }
        let refs: Vec<&BigNumber> = opening.iter().collect();
        if sha512_256i(&refs) != self.c.0 {
            return None;
        }
        Some(opening[1..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{bn_from_u64, testing::init_testing};

    #[test]
    fn commitments_open_to_their_values() {
        let rng = &mut init_testing();
        let values = vec![bn_from_u64(17), bn_from_u64(42)];
        let cmt = HashCommitDecommit::new(rng, &values);
        assert_eq!(cmt.decommit().unwrap(), values);
    }

    #[test]
    fn tampered_openings_are_rejected() {
        let rng = &mut init_testing();
        let values = vec![bn_from_u64(17)];
        let cmt = HashCommitDecommit::new(rng, &values);

        // A different opening under the same commitment must not verify.
        let forged = HashCommitDecommit::from_parts(
            cmt.c.clone(),
            HashDecommitment(vec![bn_from_u64(99), bn_from_u64(17)]),
        );
        assert!(forged.decommit().is_none());

        // Changing a committed value must not verify either.
        let mut opening = cmt.d.0.clone();
        opening[1] = bn_from_u64(18);
        let forged = HashCommitDecommit::from_parts(cmt.c, HashDecommitment(opening));
        assert!(forged.decommit().is_none());
    }

    #[test]
    fn empty_openings_are_rejected() {
        let rng = &mut init_testing();
        let cmt = HashCommitDecommit::new(rng, &[bn_from_u64(1)]);
        let forged = HashCommitDecommit::from_parts(cmt.c, HashDecommitment(Vec::new()));
        assert!(forged.decommit().is_none());
    }

    #[test]
    fn commitments_to_the_same_values_differ() {
        let rng = &mut init_testing();
        let values = vec![bn_from_u64(7)];
        let first = HashCommitDecommit::new(rng, &values);
        let second = HashCommitDecommit::new(rng, &values);
        // The 256-bit blind hides the committed values.
        assert_ne!(first.c, second.c);
    }
}
