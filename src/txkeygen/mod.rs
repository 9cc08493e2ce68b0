//! Types and functions related to the transaction-keygen sub-protocol.
//!
//! The recipient side of address generation: the committee re-derives the
//! shared randomness `R` over the same two-round commit/open wire, then each
//! participant decodes the recipient's stealth address locally and packages
//! the one-time key together with `R·G` into a *receipt address*: a
//! stealth-format string a signing committee can later decode to recover
//! both the one-time verification key and `R·G`.
// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

mod messages;
mod output;
mod rounds;

pub use messages::TxKeygenContent;
pub use output::TxKeygenOutput;

use crate::{
    address,
    errors::{Result, RoundError},
    keys::KeyData,
    messages::Message,
    party::{Party, Protocol, Round},
    protocol::Parameters,
};
use rounds::{Round1, TxKeygenState};
use std::sync::mpsc::Sender;
use tracing::error;

/// The transaction-keygen protocol.
#[derive(Debug)]
pub struct TxKeygen;

impl Protocol for TxKeygen {
    const NAME: &'static str = "tx-keygen";
    type Content = TxKeygenContent;
    type State = TxKeygenState;
    type Output = TxKeygenOutput;

    fn first_round() -> Box<dyn Round<Self>> {
        Box::new(Round1::new())
    }
}

/// Construct a party for one transaction-keygen run.
///
/// The stealth address is decoded here; a malformed address fails
/// construction. `key` is this participant's long-term key material from the
/// prior ceremony and is passed through into the save data.
pub fn new_party(
    params: Parameters,
    stealth_address: impl Into<String>,
    key: KeyData,
    out: Sender<Message<TxKeygenContent>>,
    end: Sender<TxKeygenOutput>,
    err: Sender<RoundError>,
) -> Result<Party<TxKeygen>> {
    let stealth_address = stealth_address.into();
    let (pub_sign_key, pub_view_key) = address::decode(&stealth_address).map_err(|e| {
        error!("invalid stealth address given to tx-keygen");
        e
    })?;
    let state = TxKeygenState::new(stealth_address, pub_sign_key, pub_view_key, key);
    Ok(Party::new(params, state, out, end, err))
}
