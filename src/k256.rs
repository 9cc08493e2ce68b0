//! K256 functions

use crate::{
    curve::{CurveTrait, ScalarTrait},
    errors::{
        CallerError,
        InternalError::{self, InternalInvariantFailed},
        Result,
    },
};
use generic_array::GenericArray;
use k256::{
    elliptic_curve::{
        bigint::Encoding,
        group::GroupEncoding,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Curve, Field, Group, PrimeField,
    },
    AffinePoint, EncodedPoint, ProjectivePoint, Scalar as K256_Scalar,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::error;
use unknown_order::BigNumber;
use zeroize::{Zeroize, Zeroizing};

/// Wrapper around k256::ProjectivePoint so that we can define our own
/// serialization/deserialization for it
///
/// Note that this type derives [`Debug`]; if a [`K256`] is used in a
/// private type, `Debug` should be manually implemented with the field of this
/// type explicitly redacted!
#[derive(Eq, PartialEq, Debug, Clone, Copy, Zeroize)]
pub struct K256(pub k256::ProjectivePoint);

impl AsRef<K256> for K256 {
    fn as_ref(&self) -> &K256 {
        self
    }
}

impl K256 {
    pub(crate) const GENERATOR: Self = K256(k256::ProjectivePoint::GENERATOR);
    /// The identity point, used to initialize the aggregation of a verification
    /// key
    pub const IDENTITY: Self = K256(k256::ProjectivePoint::IDENTITY);

    /// Multiply `self` by a [`BigNumber`] point, which is first converted to
    /// the secp256k1 [`K256_Scalar`] field (taken mod `q`, where `q` is the
    /// order of the curve).
    ///
    /// Note: This method ends up cloning the `point` value in the process of
    /// converting it. This may be insecure if the point contains private
    /// data.
    pub(crate) fn multiply_by_bignum(&self, point: &BigNumber) -> Result<Self> {
        let s = Zeroizing::new(K256::bn_to_scalar(point)?);
        let p = self.multiply_by_scalar(&s);
        Ok(p)
    }

    pub(crate) fn multiply_by_scalar(&self, point: &K256_Scalar) -> Self {
        Self(self.0 * point)
    }

    /// Serialize the point as a compressed SEC1-encoded secp256k1 byte array.
    pub(crate) fn to_bytes(self) -> Vec<u8> {
        let mut generic_array = AffinePoint::from(self.0).to_bytes();
        let bytes = generic_array.to_vec();
        generic_array.zeroize();
        bytes
    }

    pub(crate) fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut fixed_len_bytes: [u8; 33] = bytes.try_into().map_err(|_| {
            error!("Failed to encode bytes as a curve point");
            CallerError::DeserializationFailed
        })?;

        let point: Option<AffinePoint> =
            AffinePoint::from_bytes(&fixed_len_bytes.into()).into();
        fixed_len_bytes.zeroize();

        match point {
            Some(point) => Ok(Self(point.into())),
            None => {
                error!("Failed to encode bytes as a curve point");
                Err(CallerError::DeserializationFailed)?
            }
        }
    }
}

impl std::ops::Add for K256 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl From<k256::ProjectivePoint> for K256 {
    fn from(p: k256::ProjectivePoint) -> Self {
        Self(p)
    }
}

impl Serialize for K256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let afp = AffinePoint::from(self.0);
        afp.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for K256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = AffinePoint::deserialize(deserializer)?;
        Ok(Self(p.into()))
    }
}

pub(crate) fn k256_order() -> BigNumber {
    // Set order = q
    let order_bytes: [u8; 32] = k256::Secp256k1::ORDER.to_be_bytes();
    BigNumber::from_slice(order_bytes)
}

/// Left-pad the minimal big-endian encoding of a coordinate out to a field
/// element's 32 bytes.
fn coordinate_bytes(value: &BigNumber) -> Result<k256::FieldBytes> {
    let bytes = value.to_bytes();
    if bytes.len() > 32 {
        error!("Coordinate does not fit in a secp256k1 field element");
        Err(CallerError::InvalidPoint)?
    }
    let mut padded = vec![0u8; 32 - bytes.len()];
    padded.extend_from_slice(&bytes);
    Ok(k256::FieldBytes::clone_from_slice(&padded))
}

impl CurveTrait for K256 {
    type Scalar = K256_Scalar;

    fn generator() -> Self {
        K256::GENERATOR
    }

    fn identity() -> Self {
        K256::IDENTITY
    }

    fn order() -> BigNumber {
        k256_order()
    }

    fn scale_generator(scalar: &BigNumber) -> Result<Self> {
        K256::GENERATOR.multiply_by_bignum(scalar)
    }

    fn multiply_by_bignum(&self, scalar: &BigNumber) -> Result<Self> {
        self.multiply_by_bignum(scalar)
    }

    fn multiply_by_scalar(&self, scalar: &Self::Scalar) -> Self {
        self.multiply_by_scalar(scalar)
    }

    fn affine_xy(&self) -> Result<(BigNumber, BigNumber)> {
        let encoded = self.0.to_affine().to_encoded_point(false);
        let x = encoded.x().ok_or_else(|| {
            error!("The point at infinity has no affine coordinates");
            InternalInvariantFailed
        })?;
        let y = encoded.y().ok_or(InternalInvariantFailed)?;
        Ok((BigNumber::from_slice(x), BigNumber::from_slice(y)))
    }

    fn try_from_affine(x: &BigNumber, y: &BigNumber) -> Result<Self> {
        let encoded =
            EncodedPoint::from_affine_coordinates(&coordinate_bytes(x)?, &coordinate_bytes(y)?, false);
        let point: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        match point {
            Some(point) => Ok(Self(point.into())),
            None => {
                error!("Affine coordinates do not satisfy the secp256k1 curve equation");
                Err(CallerError::InvalidPoint)?
            }
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        K256::to_bytes(*self)
    }

    fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        K256::try_from_bytes(bytes)
    }

    // Returns x: BigNumber as a k256::Scalar mod k256_order
    fn bn_to_scalar(x: &BigNumber) -> Result<Self::Scalar> {
        // Take (mod q)
        let order = Self::order();

        let x_modded = x % order;

        let bytes = Zeroizing::new(x_modded.to_bytes());
        let mut slice = Zeroizing::new(vec![0u8; 32 - bytes.len()]);
        slice.extend_from_slice(&bytes);

        let mut ret: Self::Scalar = Option::from(<K256_Scalar as PrimeField>::from_repr(
            GenericArray::clone_from_slice(&slice),
        ))
        .ok_or_else(|| {
            error!("Failed to convert BigNumber into k256::Scalar");
            InternalError::InternalInvariantFailed
        })?;

        // Make sure to negate the scalar if the original input was negative
        if x < &BigNumber::zero() {
            ret = ret.negate();
        }

        Ok(ret)
    }

    // Convert from k256::Scalar to BigNumber
    fn scalar_to_bn(x: &Self::Scalar) -> BigNumber {
        let bytes = x.to_repr();
        BigNumber::from_slice(bytes)
    }

    // Random point.
    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let random_point = ProjectivePoint::random(rng);
        K256(random_point)
    }
}

impl ScalarTrait for K256_Scalar {
    fn zero() -> Self {
        K256_Scalar::ZERO
    }

    fn one() -> Self {
        K256_Scalar::ONE
    }

    fn add(&self, other: &Self) -> Self {
        k256::Scalar::add(self, other)
    }

    fn sub(&self, other: &Self) -> Self {
        k256::Scalar::sub(self, other)
    }

    fn mul(&self, other: &Self) -> Self {
        k256::Scalar::mul(self, other)
    }

    fn negate(&self) -> Self {
        k256::Scalar::negate(self)
    }

    fn invert(&self) -> Option<Self> {
        K256_Scalar::invert(self).into()
    }

    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        <K256_Scalar as Field>::random(rng)
    }

    fn to_bytes(&self) -> Vec<u8> {
        K256_Scalar::to_bytes(self).to_vec()
    }
}

#[cfg(test)]
mod curve_point_tests {
    use crate::{k256::K256, utils::testing::init_testing};
    use k256::elliptic_curve::Group;

    #[test]
    fn curve_point_byte_conversion_works() {
        let rng = &mut init_testing();
        let point = K256(k256::ProjectivePoint::random(rng));
        let bytes = point.to_bytes();
        let reconstructed = K256::try_from_bytes(&bytes).unwrap();
        assert_eq!(point, reconstructed);
    }
}
