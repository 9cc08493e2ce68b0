//! Edwards25519 functions
// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    curve::{CurveTrait, ScalarTrait},
    errors::{CallerError, InternalError::InternalInvariantFailed, Result},
};
use curve25519_dalek::{
    constants::ED25519_BASEPOINT_POINT,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
    traits::Identity,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};
use std::sync::OnceLock;
use tracing::error;
use unknown_order::BigNumber;
use zeroize::{Zeroize, Zeroizing};

/// Wrapper around [`EdwardsPoint`] so that we can define our own
/// serialization/deserialization and integer-coordinate conversions for it.
///
/// The compressed encoding is the standard 32-byte form: the `y` coordinate
/// little-endian with the sign of `x` in the most significant bit of the last
/// byte.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Zeroize)]
pub struct Ed25519(pub(crate) EdwardsPoint);

impl AsRef<Ed25519> for Ed25519 {
    fn as_ref(&self) -> &Ed25519 {
        self
    }
}

/// Field constants for the curve equation over `2^255 - 19`, derived once.
struct FieldConstants {
    p: BigNumber,
    d: BigNumber,
    sqrt_m1: BigNumber,
}

fn field() -> &'static FieldConstants {
    static FIELD: OnceLock<FieldConstants> = OnceLock::new();
    FIELD.get_or_init(|| {
        let p = (BigNumber::one() << 255) - crate::utils::bn_from_u64(19);
        // d = -121665 / 121666, with the inverse by Fermat's little theorem.
        let p_minus_2 = (BigNumber::one() << 255) - crate::utils::bn_from_u64(21);
        let inv_121666 = crate::utils::bn_from_u64(121666).modpow(&p_minus_2, &p);
        let d = (&p - crate::utils::bn_from_u64(121665)) * inv_121666 % &p;
        // sqrt(-1) = 2^((p - 1) / 4)
        let sqrt_m1_exponent = (BigNumber::one() << 253) - crate::utils::bn_from_u64(5);
        let sqrt_m1 = crate::utils::bn_from_u64(2).modpow(&sqrt_m1_exponent, &p);
        FieldConstants { p, d, sqrt_m1 }
    })
}

pub(crate) fn ed25519_order() -> BigNumber {
    // The order of the prime-order subgroup: 2^252 + 27742317777372353535851937790883648493.
    let tail: [u8; 16] = [
        0x14, 0xde, 0xf9, 0xde, 0xa2, 0xf7, 0x9c, 0xd6, 0x58, 0x12, 0x63, 0x1a, 0x5c, 0xf5, 0xd3,
        0xed,
    ];
    (BigNumber::one() << 252) + BigNumber::from_slice(tail)
}

/// Recover the `x` coordinate of a point from `y` and the sign bit, via the
/// curve equation `x^2 = (y^2 - 1) / (d y^2 + 1)`.
fn recover_x(y: &BigNumber, sign: u8) -> Result<BigNumber> {
    let FieldConstants { p, d, sqrt_m1 } = field();
    if y >= p {
        Err(CallerError::InvalidPoint)?
    }
    let yy = y * y % p;
    let u = (&yy + p - BigNumber::one()) % p;
    let v = (&yy * d + BigNumber::one()) % p;
    let p_minus_2 = p - crate::utils::bn_from_u64(2);
    let xx = u * v.modpow(&p_minus_2, p) % p;

    // Candidate square root by the (p + 3) / 8 exponent, fixed up by sqrt(-1)
    // when it lands on the wrong branch.
    let sqrt_exponent = (BigNumber::one() << 252) - crate::utils::bn_from_u64(2);
    let mut x = xx.modpow(&sqrt_exponent, p);
    if &x * &x % p != xx {
        x = x * sqrt_m1 % p;
    }
    if &x * &x % p != xx {
        Err(CallerError::InvalidPoint)?
    }
    if x == BigNumber::zero() && sign == 1 {
        Err(CallerError::InvalidPoint)?
    }
    let parity_bit = x.to_bytes().last().copied().unwrap_or(0) & 1;
    if parity_bit != sign {
        x = p - &x;
    }
    Ok(x)
}

/// A coordinate as its 32-byte little-endian encoding.
fn coordinate_to_le_bytes(value: &BigNumber) -> Result<[u8; 32]> {
    let be = value.to_bytes();
    if be.len() > 32 {
        Err(CallerError::InvalidPoint)?
    }
    let mut le = [0u8; 32];
    for (i, byte) in be.iter().rev().enumerate() {
        le[i] = *byte;
    }
    Ok(le)
}

fn le_bytes_to_bn(bytes: &[u8]) -> BigNumber {
    let mut be = bytes.to_vec();
    be.reverse();
    BigNumber::from_slice(be)
}

impl Ed25519 {
    /// The compressed 32-byte encoding of the point.
    pub fn compress(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    /// Move a received point into the prime-order subgroup by multiplying by
    /// `8^-1 mod L` and then by the cofactor, which kills any small-order
    /// component while fixing points that were already in the subgroup.
    pub(crate) fn clear_cofactor(&self) -> Self {
        let eight_inverse = Scalar::from(8u8).invert();
        Ed25519((self.0 * eight_inverse).mul_by_cofactor())
    }

    pub(crate) fn multiply_by_scalar(&self, scalar: &Scalar) -> Self {
        Self(self.0 * scalar)
    }
}

impl std::ops::Add for Ed25519 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl From<EdwardsPoint> for Ed25519 {
    fn from(p: EdwardsPoint) -> Self {
        Self(p)
    }
}

impl Serialize for Ed25519 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.compress().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ed25519 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        let point = CompressedEdwardsY(bytes)
            .decompress()
            .ok_or_else(|| serde::de::Error::custom("not a valid edwards25519 point"))?;
        Ok(Self(point))
    }
}

impl CurveTrait for Ed25519 {
    type Scalar = Scalar;

    fn generator() -> Self {
        Ed25519(ED25519_BASEPOINT_POINT)
    }

    fn identity() -> Self {
        Ed25519(EdwardsPoint::identity())
    }

    fn order() -> BigNumber {
        ed25519_order()
    }

    fn scale_generator(scalar: &BigNumber) -> Result<Self> {
        let s = Zeroizing::new(Self::bn_to_scalar(scalar)?);
        Ok(Ed25519(EdwardsPoint::mul_base(&s)))
    }

    fn multiply_by_bignum(&self, scalar: &BigNumber) -> Result<Self> {
        let s = Zeroizing::new(Self::bn_to_scalar(scalar)?);
        Ok(self.multiply_by_scalar(&s))
    }

    fn multiply_by_scalar(&self, scalar: &Self::Scalar) -> Self {
        self.multiply_by_scalar(scalar)
    }

    fn affine_xy(&self) -> Result<(BigNumber, BigNumber)> {
        let bytes = self.compress();
        let sign = bytes[31] >> 7;
        let mut y_bytes = bytes;
        y_bytes[31] &= 0x7f;
        let y = le_bytes_to_bn(&y_bytes);
        let x = recover_x(&y, sign).map_err(|_| {
            error!("Failed to recover the x coordinate of a valid point");
            InternalInvariantFailed
        })?;
        Ok((x, y))
    }

    fn try_from_affine(x: &BigNumber, y: &BigNumber) -> Result<Self> {
        let FieldConstants { p, .. } = field();
        if x >= p || y >= p || x < &BigNumber::zero() || y < &BigNumber::zero() {
            Err(CallerError::InvalidPoint)?
        }
        let sign = x.to_bytes().last().copied().unwrap_or(0) & 1;
        let mut compressed = coordinate_to_le_bytes(y)?;
        compressed[31] |= sign << 7;
        let point = CompressedEdwardsY(compressed)
            .decompress()
            .ok_or(CallerError::InvalidPoint)?;
        // Decompression only used `y` and the sign, so check that the claimed
        // `x` is the one the curve equation produces.
        let recovered = recover_x(y, sign)?;
        if &recovered != x {
            error!("Affine coordinates do not satisfy the edwards25519 curve equation");
            Err(CallerError::InvalidPoint)?
        }
        Ok(Self(point))
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.compress().to_vec()
    }

    fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let fixed_len_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            error!("Compressed edwards25519 points are exactly 32 bytes");
            CallerError::InvalidPoint
        })?;
        let point = CompressedEdwardsY(fixed_len_bytes)
            .decompress()
            .ok_or_else(|| {
                error!("Failed to decompress bytes as an edwards25519 point");
                CallerError::InvalidPoint
            })?;
        Ok(Self(point))
    }

    // Returns x: BigNumber as a curve25519 Scalar mod the group order
    fn bn_to_scalar(x: &BigNumber) -> Result<Self::Scalar> {
        let order = Self::order();
        let x_modded = x % order;

        let le_bytes = Zeroizing::new(coordinate_to_le_bytes(&x_modded).map_err(|_| {
            error!("Reduced scalar does not fit in 32 bytes");
            InternalInvariantFailed
        })?);
        let mut ret: Self::Scalar = Option::from(Scalar::from_canonical_bytes(*le_bytes))
            .ok_or_else(|| {
                error!("Failed to convert BigNumber into curve25519 Scalar");
                InternalInvariantFailed
            })?;

        // Make sure to negate the scalar if the original input was negative
        if x < &BigNumber::zero() {
            ret = -ret;
        }

        Ok(ret)
    }

    // Convert from curve25519 Scalar to BigNumber
    fn scalar_to_bn(x: &Self::Scalar) -> BigNumber {
        le_bytes_to_bn(&x.to_bytes())
    }

    // Random point.
    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Ed25519(EdwardsPoint::mul_base(&Scalar::random(rng)))
    }
}

impl ScalarTrait for Scalar {
    fn zero() -> Self {
        Scalar::ZERO
    }

    fn one() -> Self {
        Scalar::ONE
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn sub(&self, other: &Self) -> Self {
        self - other
    }

    fn mul(&self, other: &Self) -> Self {
        self * other
    }

    fn negate(&self) -> Self {
        -self
    }

    fn invert(&self) -> Option<Self> {
        if self == &Scalar::ZERO {
            return None;
        }
        Some(Scalar::invert(self))
    }

    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Scalar::random(rng)
    }

    fn to_bytes(&self) -> Vec<u8> {
        Scalar::to_bytes(self).to_vec()
    }
}

/// Hash a shared curve point into a scalar in `[0, L)`.
///
/// This is the view-key discovery hash `hv = SHA-512(x || y) mod L` that ties
/// a one-time address to the recipient's view key: the address side hashes
/// `R·V` and the signer side hashes `viewSk·bigR`, which are the same point.
pub(crate) fn shared_point_hash(point: &Ed25519) -> Result<BigNumber> {
    let (x, y) = point.affine_xy()?;
    let mut hasher = Sha512::new();
    hasher.update(x.to_bytes());
    hasher.update(y.to_bytes());
    let digest = hasher.finalize();
    Ok(BigNumber::from_slice(digest) % ed25519_order())
}
