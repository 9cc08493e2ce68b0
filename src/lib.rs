//! A multi-party threshold signing library with one-time receipt
//! addresses.[^cite]
//!
//! A committee of participants jointly produces Ed25519 signatures without
//! ever reconstructing the private signing key, and jointly derives
//! CryptoNote-style stealth addresses ("one-time receipt addresses") for a
//! recipient identified by a long-term (view, sign) key pair. An attacker
//! controlling fewer than a threshold number of participants learns nothing
//! about the secret.
//!
//! # Protocols
//! Three round-driven protocols are provided, all built on the same
//! [`Party`](party::Party) engine:
//! - [`addrgen`]: the committee samples shared randomness `R` and derives the
//!   one-time address `H(R·V)·G + S` together with `R·G`.
//! - [`txkeygen`]: the recipient side; re-derives `R` from the same wire and
//!   packages the one-time key and `R·G` into a receipt address string.
//! - [`signing`]: a three-round threshold EdDSA signing protocol whose output
//!   verifies under the one-time key decoded from the receipt address.
//!
//! # Driving a party
//! Each participant constructs a `Party` bound to one protocol, calls
//! [`start`](party::Party::start), and feeds every inbound wire message to
//! [`update`](party::Party::update). Outbound messages, the terminal output,
//! and any attributable failure are delivered on caller-supplied sinks; the
//! library provides no transport. The transport must preserve order between
//! any single pair of participants and is assumed to authenticate and encrypt
//! messages.
//!
//! [^cite]: Rosario Gennaro and Steven Goldfeder. Fast Multiparty Threshold
//! ECDSA with Fast Trustless Setup. 2018. The EdDSA variant follows the same
//! commit/de-commit round discipline; the one-time address construction
//! follows CryptoNote.
// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

#![allow(non_snake_case)]

/// Serialize a value into the wire encoding.
macro_rules! serialize {
    ($x:expr) => {{
        bincode::serialize($x).map_err(|_| {
            crate::errors::InternalError::from(crate::errors::CallerError::SerializationFailed)
        })
    }};
}

/// Deserialize a value out of the wire encoding.
macro_rules! deserialize {
    ($x:expr) => {{
        bincode::deserialize($x).map_err(|_| {
            crate::errors::InternalError::from(crate::errors::CallerError::DeserializationFailed)
        })
    }};
}

pub mod address;
pub mod addrgen;
mod commitments;
pub mod curve;
mod ed25519;
pub mod errors;
mod k256;
pub mod keys;
pub mod messages;
pub mod party;
pub mod protocol;
pub mod resharing;
pub mod signing;
pub mod txkeygen;
mod utils;
pub mod zkp;

pub use commitments::{HashCommitDecommit, HashCommitment, HashDecommitment};
pub use ed25519::Ed25519;
pub use errors::{CallerError, Fault, InternalError, Result, RoundError};
pub use k256::K256;
pub use keys::{derive_receipt_key, KeyData, SigningKeyMaterial, ViewKey};
pub use messages::Message;
pub use party::{Party, Status};
pub use protocol::{Parameters, PartyId, PeerContext};
