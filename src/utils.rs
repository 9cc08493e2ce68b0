// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Big-integer and hashing helpers shared across the protocols.

use crate::errors::{CallerError, InternalError, Result};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512_256};
use tracing::error;
use unknown_order::BigNumber;

pub(crate) const CRYPTOGRAPHIC_RETRY_MAX: usize = 500usize;

/// Delimiter written between hash inputs so that adjacent values cannot be
/// re-split into a colliding tuple.
const HASH_INPUT_DELIMITER: u8 = b'$';

/// SHA-512/256 over a tuple of non-negative integers.
///
/// The framing commits to the number of inputs (little-endian `u64` prefix)
/// and delimits each value's big-endian bytes, so distinct tuples hash to
/// distinct inputs.
pub(crate) fn sha512_256i(values: &[&BigNumber]) -> BigNumber {
    let mut data = Vec::new();
    data.extend_from_slice(&(values.len() as u64).to_le_bytes());
    for value in values {
        data.extend_from_slice(&value.to_bytes());
        data.push(HASH_INPUT_DELIMITER);
    }
    let digest = Sha512_256::digest(&data);
    BigNumber::from_slice(digest)
}

/// Map a hash output into `[0, q)` without modular bias.
///
/// Returns `h` unchanged when `h < q`; otherwise re-hashes until the value
/// falls under `q`. Conditioned on termination the output is uniform; for the
/// curve orders used here (252 bits and up) each iteration succeeds with
/// probability at least one half, so the retry budget is never exhausted in
/// practice.
pub(crate) fn rejection_sample(q: &BigNumber, h: &BigNumber) -> Result<BigNumber> {
    let mut h = h.clone();
    for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
        if &h < q {
            return Ok(h);
        }
        h = sha512_256i(&[&h]);
    }
    error!("rejection sampling exhausted its retries; the modulus is too small");
    Err(CallerError::RetryFailed)?
}

/// Sample a number uniformly at random from the range [0, n). This can be used
/// for sampling from a prime field `F_p` or the integers modulo `n` (for any
/// `n`).
pub(crate) fn random_positive_bn<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Sample a number uniformly at random from the range [1, n).
pub(crate) fn random_nonzero_bn<R: RngCore + CryptoRng>(
    rng: &mut R,
    n: &BigNumber,
) -> Result<BigNumber> {
    // Try up to `CRYPTOGRAPHIC_RETRY_MAX` times to draw a non-zero element.
    // This should virtually never retry at all.
    std::iter::repeat_with(|| BigNumber::from_rng(n, rng))
        .take(CRYPTOGRAPHIC_RETRY_MAX)
        .find(|result| result != &BigNumber::zero())
        .ok_or(InternalError::CallingApplicationMistake(
            CallerError::RetryFailed,
        ))
}

/// Number of significant bits in `n`; leading zeros are not counted.
#[cfg(test)]
pub(crate) fn bit_length(n: &BigNumber) -> usize {
    let bytes = n.to_bytes();
    match bytes.iter().position(|&b| b != 0) {
        None => 0,
        Some(i) => (bytes.len() - i) * 8 - bytes[i].leading_zeros() as usize,
    }
}

/// A small constant as a [`BigNumber`].
pub(crate) fn bn_from_u64(value: u64) -> BigNumber {
    BigNumber::from_slice(value.to_be_bytes())
}

/// The Lagrange coefficient for `my_point`, evaluated at zero over the prime
/// field `Z_q`.
///
/// Multiplying a Shamir share by this coefficient converts it into an
/// additive share of the interpolated secret. Inversion is by Fermat's
/// little theorem, so `q` must be prime.
pub(crate) fn lagrange_coefficient_at_zero(
    my_point: &BigNumber,
    all_points: &[BigNumber],
    q: &BigNumber,
) -> Result<BigNumber> {
    let exponent = q - BigNumber::one() - BigNumber::one();
    let mut result = BigNumber::one();
    for point in all_points {
        if point == my_point {
            continue;
        }
        let difference = (point + q - my_point) % q;
        if difference == BigNumber::zero() {
            error!("two signing shares carry the same share id");
            return Err(CallerError::BadInput)?;
        }
        let inverse = difference.modpow(&exponent, q);
        result = result * (point % q) * inverse % q;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;
    use rand::RngCore;

    fn random_odd_modulus(bits: usize, rng: &mut impl RngCore) -> BigNumber {
        let mut bytes = vec![0u8; bits / 8];
        rng.fill_bytes(&mut bytes);
        bytes[0] |= 0x80;
        bytes[bits / 8 - 1] |= 1;
        BigNumber::from_slice(bytes)
    }

    #[test]
    fn sha512_256i_separates_tuples() {
        let rng = &mut init_testing();
        let mut values: Vec<BigNumber> = (0..11)
            .map(|_| random_positive_bn(rng, &(BigNumber::one() << 256)))
            .collect();
        let refs: Vec<&BigNumber> = values.iter().collect();
        let first = sha512_256i(&refs);

        values[10] = random_positive_bn(rng, &(BigNumber::one() << 256));
        let refs: Vec<&BigNumber> = values.iter().collect();
        let second = sha512_256i(&refs);
        assert_ne!(first, second);
    }

    #[test]
    fn rejection_sample_stays_under_modulus() {
        let rng = &mut init_testing();
        let q = random_odd_modulus(256, rng);
        for _ in 0..10_000 {
            let h = random_positive_bn(rng, &(BigNumber::one() << 512));
            let sampled = rejection_sample(&q, &h).unwrap();
            assert!(sampled < q);
            assert!(bit_length(&sampled) <= 256);
        }
    }

    #[test]
    fn rejection_sample_is_stable() {
        let rng = &mut init_testing();
        let q = random_odd_modulus(256, rng);
        let h = sha512_256i(&[&bn_from_u64(123)]);
        assert_eq!(
            rejection_sample(&q, &h).unwrap(),
            rejection_sample(&q, &h).unwrap()
        );
    }

    #[test]
    fn bit_length_ignores_leading_zeros() {
        assert_eq!(bit_length(&BigNumber::zero()), 0);
        assert_eq!(bit_length(&BigNumber::one()), 1);
        assert_eq!(bit_length(&bn_from_u64(255)), 8);
        assert_eq!(bit_length(&bn_from_u64(256)), 9);
        assert_eq!(bit_length(&(BigNumber::one() << 255)), 256);
    }

    #[test]
    fn lagrange_weights_reconstruct_the_constant_term() {
        // A deliberately small prime field keeps the polynomial readable.
        let q = bn_from_u64(7919);
        // f(x) = 42 + 3x + 5x^2, so f(0) = 42.
        let f = |x: u64| (42 + 3 * x + 5 * x * x) % 7919;
        let points: Vec<BigNumber> = [2u64, 5, 11].iter().map(|&k| bn_from_u64(k)).collect();

        let reconstructed = [2u64, 5, 11]
            .iter()
            .map(|&k| {
                let share = bn_from_u64(f(k));
                let coeff = lagrange_coefficient_at_zero(&bn_from_u64(k), &points, &q).unwrap();
                share * coeff % &q
            })
            .fold(BigNumber::zero(), |acc, term| (acc + term) % &q);
        assert_eq!(reconstructed, bn_from_u64(42));
    }

    #[test]
    fn lagrange_rejects_duplicate_points() {
        let q = bn_from_u64(7919);
        let points = vec![bn_from_u64(2), bn_from_u64(2)];
        assert!(lagrange_coefficient_at_zero(&bn_from_u64(2), &points, &q).is_err());
    }
}

////////////////////////////
// Test Utility Functions //
////////////////////////////
