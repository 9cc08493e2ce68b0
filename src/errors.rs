//! Error types for the protocol library.
//!
//! Errors are split the same way the rest of the API is: [`CallerError`]
//! covers misuse that the calling application can fix, [`InternalError`]
//! covers everything the library itself surfaces, and [`RoundError`] carries
//! the attributable failure of a protocol round (victim and culprits) that is
//! also delivered on the party's error sink.
// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::protocol::PartyId;
use thiserror::Error;

/// The default result type for the crate.
pub type Result<T> = std::result::Result<T, InternalError>;

/// Errors produced by the calling application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallerError {
    /// Protocol parameters are out of range (`t >= n`, `n < 2`, a self id
    /// missing from the peer context, ...).
    #[error("protocol parameters are invalid")]
    ConfigInvalid,
    /// A stealth or receipt address failed to decode: wrong length, bad
    /// Base58, or a checksum mismatch.
    #[error("address decoding failed")]
    InvalidAddress,
    /// A stealth or receipt address carries an unknown network prefix.
    #[error("address carries an invalid network prefix")]
    InvalidPrefix,
    /// A compressed encoding or coordinate pair does not describe a point on
    /// the curve.
    #[error("value is not a valid curve point")]
    InvalidPoint,
    /// The protocol input failed a sanity check.
    #[error("protocol input is invalid")]
    BadInput,
    /// A party was started twice.
    #[error("party was already started")]
    AlreadyStarted,
    /// A message was delivered to a party that already terminated.
    #[error("protocol already terminated")]
    ProtocolAlreadyTerminated,
    /// A value could not be encoded for the wire.
    #[error("serialization failed")]
    SerializationFailed,
    /// Bytes from the wire could not be decoded.
    #[error("deserialization failed")]
    DeserializationFailed,
    /// A randomized sampling routine exhausted its retry budget.
    #[error("cryptographic sampling exhausted its retries")]
    RetryFailed,
}

/// Errors that the library surfaces to its caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InternalError {
    /// An invariant the library maintains internally was violated; this is a
    /// bug in the library.
    #[error("internal invariant failed")]
    InternalInvariantFailed,
    /// The calling application made a mistake.
    #[error("caller error: {0}")]
    CallingApplicationMistake(#[from] CallerError),
    /// A zero-knowledge proof failed to verify.
    #[error("could not verify proof")]
    FailedToVerifyProof,
    /// An aggregated signature failed Ed25519 verification.
    #[error("could not verify signature")]
    FailedToVerifySignature,
    /// A protocol round failed; the inner error names the culprits.
    #[error(transparent)]
    Round(Box<RoundError>),
}

impl From<RoundError> for InternalError {
    fn from(err: RoundError) -> Self {
        InternalError::Round(Box::new(err))
    }
}

/// The cause of a [`RoundError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// A round's `start` was invoked twice.
    #[error("round already started")]
    AlreadyStarted,
    /// A message sender is outside the peer context.
    #[error("message sender is not a known committee member")]
    InvalidSender,
    /// A second message for an occupied slot differed from the first.
    #[error("conflicting duplicate message")]
    DuplicateDivergent,
    /// A message's structure does not match its content variant's policy.
    #[error("message structure does not match its round")]
    UnexpectedMessage,
    /// A de-commitment did not match its commitment.
    #[error("de-commitment verification failed")]
    DecommitFailed,
    /// A Schnorr proof of knowledge failed to verify.
    #[error("schnorr proof verification failed")]
    ZkFailed,
    /// The finalized signature failed Ed25519 verification. No culprit can be
    /// attributed without an identifiable-abort sub-protocol.
    #[error("signature verification failed")]
    VerificationFailed,
    /// An old-committee member reported a view key inconsistent with ours.
    #[error("inconsistent view key report")]
    ViewKeyMismatch,
    /// A result sink was dropped by the caller.
    #[error("a result sink was dropped by the caller")]
    SinkDropped,
    /// A cryptographic computation inside the round failed.
    #[error("round computation failed: {0}")]
    Computation(String),
}

/// An attributable failure of a protocol round.
///
/// The `victim` is the reporting party; `culprits` are the participants whose
/// inputs violated a proof, a de-commitment, or the store discipline. The
/// party that produced this error has stopped; upper layers decide whether to
/// restart the ceremony with a reduced committee.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("party {victim} failed in round {round}: {cause}")]
pub struct RoundError {
    /// The reporting party.
    pub victim: PartyId,
    /// Participants responsible for the failure, if attributable.
    pub culprits: Vec<PartyId>,
    /// The round number in which the failure was observed.
    pub round: u16,
    /// What went wrong.
    pub cause: Fault,
}

impl RoundError {
    pub(crate) fn new(victim: PartyId, round: u16, cause: Fault, culprits: Vec<PartyId>) -> Self {
        Self {
            victim,
            culprits,
            round,
            cause,
        }
    }
}
