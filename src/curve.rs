//! Elliptic Curve abstraction
use crate::errors::Result;
use rand::{CryptoRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, ops::Add};
use unknown_order::BigNumber;
use zeroize::Zeroize;

/// Generic elliptic curve point.
///
/// The protocols hash affine coordinates as integers and exchange scalars as
/// [`BigNumber`]s on the wire, so the trait carries conversions in both
/// directions alongside the group operations.
pub trait CurveTrait:
    'static
    + Clone
    + Copy
    + Debug
    + Send
    + Sync
    + Eq
    + PartialEq
    + Serialize
    + DeserializeOwned
    + Add<Output = Self>
{
    /// The type of scalars.
    type Scalar: ScalarTrait;

    /// A generator point.
    fn generator() -> Self;

    /// The identity point, used to initialize point aggregation.
    fn identity() -> Self;

    /// The order of the prime-order subgroup.
    fn order() -> BigNumber;

    /// Multiply the generator by a [`BigNumber`] scalar.
    fn scale_generator(scalar: &BigNumber) -> Result<Self>;

    /// Multiply `self` by a [`BigNumber`], which is first converted to the
    /// curve [`Self::Scalar`] field (taken mod `q`, where `q` is the order of
    /// the curve).
    ///
    /// Note: This method ends up cloning the scalar value in the process of
    /// converting it. This may be insecure if the scalar contains private
    /// data.
    fn multiply_by_bignum(&self, scalar: &BigNumber) -> Result<Self>;

    /// Multiply `self` by a [`Self::Scalar`].
    fn multiply_by_scalar(&self, scalar: &Self::Scalar) -> Self;

    /// The affine coordinates of the point as non-negative integers.
    ///
    /// Fails on the point at infinity for curves whose affine chart does not
    /// contain it.
    fn affine_xy(&self) -> Result<(BigNumber, BigNumber)>;

    /// Build a point from affine coordinates, verifying the curve equation.
    fn try_from_affine(x: &BigNumber, y: &BigNumber) -> Result<Self>;

    /// Serialize the point in its compressed encoding.
    fn to_bytes(&self) -> Vec<u8>;

    /// Deserialize a point from its compressed encoding.
    fn try_from_bytes(bytes: &[u8]) -> Result<Self>;

    /// Convert a [`BigNumber`] to a scalar, reduced mod the curve order.
    fn bn_to_scalar(bn: &BigNumber) -> Result<Self::Scalar>;

    /// Convert a scalar to a non-negative [`BigNumber`].
    fn scalar_to_bn(scalar: &Self::Scalar) -> BigNumber;

    /// Random point.
    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self;
}

/// Scalar trait.
pub trait ScalarTrait:
    Sync
    + Send
    + Clone
    + Copy
    + Debug
    + PartialEq
    + Eq
    + Zeroize
    + Serialize
    + DeserializeOwned
    + Add<Output = Self>
{
    /// Return the zero scalar.
    fn zero() -> Self;

    /// Return the one scalar.
    fn one() -> Self;

    /// Add two scalars.
    fn add(&self, other: &Self) -> Self;

    /// Subtract two scalars.
    fn sub(&self, other: &Self) -> Self;

    /// Multiply two scalars.
    fn mul(&self, other: &Self) -> Self;

    /// Negate.
    fn negate(&self) -> Self;

    /// Invert the scalar, if non-zero.
    fn invert(&self) -> Option<Self>;

    /// Random scalar.
    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self;

    /// Convert to the scalar's canonical byte encoding.
    fn to_bytes(&self) -> Vec<u8>;
}

#[cfg(test)]
mod tests {
    use crate::{
        curve::{CurveTrait, ScalarTrait},
        ed25519::Ed25519,
        k256::K256,
        utils::testing::init_testing,
    };
    use unknown_order::BigNumber;


    fn scalar_round_trips_through_bignum<C: CurveTrait>() {
        let rng = &mut init_testing();
        let scalar = C::Scalar::random(rng);
        let bn = C::scalar_to_bn(&scalar);
        assert_eq!(C::bn_to_scalar(&bn).unwrap(), scalar);
    }

    fn bignum_multiplication_reduces_mod_order<C: CurveTrait>() {
        let rng = &mut init_testing();
        let point = C::random(rng);
        let k = crate::utils::random_positive_bn(rng, &C::order());
        let shifted = &k + C::order();
        assert_eq!(
            point.multiply_by_bignum(&k).unwrap(),
            point.multiply_by_bignum(&shifted).unwrap()
        );
    }

    fn affine_coordinates_round_trip<C: CurveTrait>() {
        let rng = &mut init_testing();
        let point = C::random(rng);
        let (x, y) = point.affine_xy().unwrap();
        assert_eq!(C::try_from_affine(&x, &y).unwrap(), point);
    }

    fn off_curve_coordinates_are_rejected<C: CurveTrait>() {
        let rng = &mut init_testing();
        let point = C::random(rng);
        let (x, y) = point.affine_xy().unwrap();
        let bad_x = (x + BigNumber::one()) % C::order();
        assert!(C::try_from_affine(&bad_x, &y).is_err());
    }

    #[test]
    fn k256_scalar_bignum_round_trip() {
        scalar_round_trips_through_bignum::<K256>();
    }

    #[test]
    fn ed25519_scalar_bignum_round_trip() {
        scalar_round_trips_through_bignum::<Ed25519>();
    }

    #[test]
    fn k256_bignum_multiplication_reduces() {
        bignum_multiplication_reduces_mod_order::<K256>();
    }

    #[test]
    fn ed25519_bignum_multiplication_reduces() {
        bignum_multiplication_reduces_mod_order::<Ed25519>();
    }

    #[test]
    fn k256_affine_round_trip() {
        affine_coordinates_round_trip::<K256>();
        off_curve_coordinates_are_rejected::<K256>();
    }

    #[test]
    fn ed25519_affine_round_trip() {
        affine_coordinates_round_trip::<Ed25519>();
        off_curve_coordinates_are_rejected::<Ed25519>();
    }
}
