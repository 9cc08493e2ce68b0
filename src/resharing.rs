// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! View-key reconciliation during committee resharing.
//!
//! When resharing changes the committee membership, incoming members have no
//! view key of their own and adopt the value a plurality of old-committee
//! members report. Members who already hold the view key instead validate
//! every report against their own copy and blame any old member that
//! disagrees.

use crate::{
    errors::{Fault, RoundError},
    keys::ViewKey,
    protocol::{Parameters, PartyId},
    Ed25519,
};
use crate::curve::CurveTrait;
use tracing::error;
use unknown_order::BigNumber;

/// Round number reported in reconciliation failures; reconciliation runs in
/// the resharing pipeline's final round.
const RECONCILE_ROUND: u16 = 5;

/// Reconcile the view key from old-committee reports.
///
/// `reports` pairs each reporting old member with the view secret it sent
/// us. With no key of our own, the plurality value wins, ties broken in
/// favor of the value whose first reporter has the lowest index. With a key
/// of our own, every report must match it; disagreeing reporters are named
/// as culprits.
pub fn reconcile_view_key(
    params: &Parameters,
    own: Option<&ViewKey>,
    reports: &[(PartyId, BigNumber)],
) -> std::result::Result<ViewKey, RoundError> {
    let victim = params.self_id().clone();
    match own {
        Some(view_key) => {
            let culprits: Vec<PartyId> = reports
                .iter()
                .filter(|(_, sk)| sk != &view_key.sk)
                .map(|(reporter, _)| reporter.clone())
                .collect();
            if !culprits.is_empty() {
                error!(
                    "{} old-committee members reported a view key inconsistent with ours",
                    culprits.len()
                );
                return Err(RoundError::new(
                    victim,
                    RECONCILE_ROUND,
                    Fault::ViewKeyMismatch,
                    culprits,
                ));
            }
            Ok(view_key.clone())
        }
        None => {
            let winner = plurality(reports).ok_or_else(|| {
                error!("no view-key reports to reconcile");
                RoundError::new(victim.clone(), RECONCILE_ROUND, Fault::ViewKeyMismatch, Vec::new())
            })?;
            let pk = Ed25519::scale_generator(&winner).map_err(|e| {
                RoundError::new(
                    victim,
                    RECONCILE_ROUND,
                    Fault::Computation(e.to_string()),
                    Vec::new(),
                )
            })?;
            Ok(ViewKey { sk: winner, pk })
        }
    }
}

/// The most frequently reported value; ties go to the value whose first
/// reporter has the lowest index.
fn plurality(reports: &[(PartyId, BigNumber)]) -> Option<BigNumber> {
    struct Tally<'a> {
        value: &'a BigNumber,
        count: usize,
        first_reporter: usize,
    }

    let mut tallies: Vec<Tally<'_>> = Vec::new();
    for (reporter, value) in reports {
        match tallies.iter_mut().find(|tally| tally.value == value) {
            Some(tally) => tally.count += 1,
            None => tallies.push(Tally {
                value,
                count: 1,
                first_reporter: reporter.index(),
            }),
        }
    }

    tallies
        .into_iter()
        .max_by(|a, b| {
            a.count
                .cmp(&b.count)
                .then(b.first_reporter.cmp(&a.first_reporter))
        })
        .map(|tally| tally.value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::testing::{test_parameters, test_peer_context},
        utils::{bn_from_u64, testing::init_testing},
    };

    fn reports_from(values: &[u64]) -> Vec<(PartyId, BigNumber)> {
        let peers = test_peer_context(values.len());
        values
            .iter()
            .zip(peers.ids())
            .map(|(&value, id)| (id.clone(), bn_from_u64(value)))
            .collect()
    }

    #[test]
    fn the_majority_value_wins() {
        let _rng = init_testing();
        let params = test_parameters(3, 1).remove(0);
        // A first occurrence must not reset the count: two later reports of
        // 7 outweigh the earlier 5.
        let reports = reports_from(&[5, 7, 7]);
        let adopted = reconcile_view_key(&params, None, &reports).unwrap();
        assert_eq!(adopted.sk, bn_from_u64(7));
        assert_eq!(adopted.pk, ViewKey::from_sk(bn_from_u64(7)).unwrap().pk);
    }

    #[test]
    fn ties_break_to_the_lowest_reporter_index() {
        let _rng = init_testing();
        let params = test_parameters(4, 1).remove(0);
        let reports = reports_from(&[9, 5, 5, 9]);
        let adopted = reconcile_view_key(&params, None, &reports).unwrap();
        assert_eq!(adopted.sk, bn_from_u64(9));
    }

    #[test]
    fn holders_blame_disagreeing_reporters() {
        let _rng = init_testing();
        let params = test_parameters(3, 1).remove(0);
        let own = ViewKey::from_sk(bn_from_u64(5)).unwrap();
        let reports = reports_from(&[5, 8, 5]);
        let err = reconcile_view_key(&params, Some(&own), &reports).unwrap_err();
        assert_eq!(err.cause, Fault::ViewKeyMismatch);
        assert_eq!(err.culprits.len(), 1);
        assert_eq!(err.culprits[0].index(), 1);
    }

    #[test]
    fn holders_keep_their_key_when_reports_agree() {
        let _rng = init_testing();
        let params = test_parameters(3, 1).remove(0);
        let own = ViewKey::from_sk(bn_from_u64(5)).unwrap();
        let reports = reports_from(&[5, 5, 5]);
        let adopted = reconcile_view_key(&params, Some(&own), &reports).unwrap();
        assert_eq!(adopted, own);
    }

    #[test]
    fn an_empty_report_set_cannot_be_reconciled() {
        let _rng = init_testing();
        let params = test_parameters(3, 1).remove(0);
        assert!(reconcile_view_key(&params, None, &[]).is_err());
    }
}
