// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A non-interactive Schnorr proof of knowledge of a discrete logarithm,
//! made non-interactive with the Fiat-Shamir transform.
//!
//! Proves knowledge of `x` such that `X = x·G`. The challenge is derived by
//! rejection-sampling the hash of the affine coordinates of `X`, the
//! generator, and the prover's nonce commitment into `[0, q)`.

use crate::{
    curve::CurveTrait,
    errors::{InternalError, Result},
    utils::{random_nonzero_bn, rejection_sample, sha512_256i},
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;
use unknown_order::BigNumber;

/// Schnorr proof of knowledge of the discrete logarithm of `X`.
///
/// The curve is carried by the type parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DLogProof<C: CurveTrait> {
    alpha: C,
    t: BigNumber,
}

impl<C: CurveTrait> DLogProof<C> {
    /// Prove knowledge of `x` with `X = x·G`.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R, x: &BigNumber, X: &C) -> Result<Self> {
        let q = C::order();
        let a = random_nonzero_bn(rng, &q)?;
        let alpha = C::scale_generator(&a)?;
        let c = Self::challenge(X, &alpha)?;
        let t = (a + c * x) % q;
        Ok(Self { alpha, t })
    }

    /// Verify the proof against `X`.
    pub fn verify(&self, X: &C) -> Result<()> {
        let c = Self::challenge(X, &self.alpha)?;
        let lhs = self.alpha + X.multiply_by_bignum(&c)?;
        let rhs = C::scale_generator(&self.t)?;
        if lhs != rhs {
            error!("schnorr verification equation does not hold");
            return Err(InternalError::FailedToVerifyProof);
        }
        Ok(())
    }

    fn challenge(X: &C, alpha: &C) -> Result<BigNumber> {
        let q = C::order();
        let (x_x, x_y) = X.affine_xy()?;
        let (g_x, g_y) = C::generator().affine_xy()?;
        let (a_x, a_y) = alpha.affine_xy()?;
        let hash = sha512_256i(&[&x_x, &x_y, &g_x, &g_y, &a_x, &a_y]);
        rejection_sample(&q, &hash)
    }
}
