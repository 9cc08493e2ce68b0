// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The round-driven protocol engine.
//!
//! A [`Party`] is the abstract machine one participant runs to execute a
//! multi-round protocol. The transport feeds inbound messages to
//! [`Party::update`]; the engine stores them in per-round slots, asks the
//! current [`Round`] whether it is ready, and advances through the round
//! pipeline until a terminal round delivers the protocol output on the end
//! sink. `update` never blocks: a party suspends only between message
//! deliveries.
//!
//! Failures are attributable: a round reports a [`RoundError`] naming the
//! culprits, the engine forwards it on the error sink, and the party stops.
//! There are no retries at this layer; upper layers decide whether to restart
//! the ceremony with a reduced committee.

use crate::{
    errors::{CallerError, Fault, Result, RoundError},
    messages::{Message, ProtocolContent},
    protocol::{Parameters, PartyId},
};
use rand::{CryptoRng, RngCore};
use std::{
    fmt::{Display, Formatter},
    sync::mpsc::Sender,
};
use tracing::{error, info, warn};

/// Object-safe handle to a cryptographically secure rng, so that boxed
/// rounds can sample without being generic.
pub trait ProtocolRng: RngCore + CryptoRng {}
impl<T: RngCore + CryptoRng> ProtocolRng for T {}

/// A protocol a [`Party`] can run: the closed message set, the mutable state
/// the rounds share, the terminal output, and the first round.
pub trait Protocol: Sized + 'static {
    /// Task name used in logs.
    const NAME: &'static str;

    /// The closed set of wire payloads.
    type Content: ProtocolContent;

    /// State owned by the party and borrowed by its rounds.
    type State: Send;

    /// The terminal value delivered on the end sink.
    type Output: Send;

    /// The entry round of the pipeline.
    fn first_round() -> Box<dyn Round<Self>>;
}

/// A single round of a protocol.
pub trait Round<P: Protocol>: Send {
    /// The round's position in the pipeline, for logs and error reports.
    fn number(&self) -> u16;

    /// Execute the round's local computation and emit outbound messages.
    /// Calling this twice is a programming error and fails with
    /// [`Fault::AlreadyStarted`].
    fn start(
        &mut self,
        rng: &mut dyn ProtocolRng,
        ctx: &mut RoundCtx<'_, P>,
    ) -> std::result::Result<(), RoundError>;

    /// Structural filter: whether this round is willing to consume `message`
    /// (content variant and broadcast flag both match).
    fn can_accept(&self, message: &Message<P::Content>) -> bool;

    /// Whether every expected inbound message has been stored. Never blocks;
    /// a round expecting no inbound messages is vacuously ready.
    fn update(&mut self, ctx: &mut RoundCtx<'_, P>) -> std::result::Result<bool, RoundError>;

    /// The successor round, or `None` when this round was terminal.
    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<P>>>;
}

/// Per-round parallel message slots, indexed by content kind and sender.
///
/// A slot accepts one message; redelivery with identical content is
/// idempotent and divergent redelivery is an attributable fault. Messages
/// for rounds that have not started yet are stored here until their round
/// reads them.
pub(crate) struct MessageStore<C> {
    slots: Vec<Vec<Option<Message<C>>>>,
}

impl<C: ProtocolContent> MessageStore<C> {
    fn new(party_count: usize) -> Self {
        Self {
            slots: vec![vec![None; party_count]; C::KIND_COUNT],
        }
    }

    fn store(&mut self, message: Message<C>) -> std::result::Result<(), Fault> {
        let kind = message.content().kind();
        let sender = message.from().index();
        let slot = &mut self.slots[kind][sender];
        match slot {
            None => {
                *slot = Some(message);
                Ok(())
            }
            Some(existing) if existing.content() == message.content() => Ok(()),
            Some(_) => Err(Fault::DuplicateDivergent),
        }
    }

    /// The stored message of `kind` from `sender`, if any.
    pub(crate) fn message(&self, kind: usize, sender: usize) -> Option<&Message<C>> {
        self.slots[kind][sender].as_ref()
    }

    /// The stored payload of `kind` from `sender`, if any.
    pub(crate) fn content(&self, kind: usize, sender: usize) -> Option<&C> {
        self.message(kind, sender).map(Message::content)
    }

    /// True when a message of `kind` from every participant passes `accept`.
    pub(crate) fn complete_where<F>(&self, kind: usize, accept: F) -> bool
    where
        F: Fn(&Message<C>) -> bool,
    {
        self.slots[kind]
            .iter()
            .all(|slot| slot.as_ref().map_or(false, &accept))
    }
}

/// The party state a round borrows while it executes.
pub struct RoundCtx<'a, P: Protocol> {
    params: &'a Parameters,
    pub(crate) state: &'a mut P::State,
    pub(crate) store: &'a mut MessageStore<P::Content>,
    out: &'a Sender<Message<P::Content>>,
    end: &'a Sender<P::Output>,
}

impl<'a, P: Protocol> RoundCtx<'a, P> {
    /// The run parameters.
    pub fn params(&self) -> &Parameters {
        self.params
    }

    /// Total number of participants.
    pub fn party_count(&self) -> usize {
        self.params.party_count()
    }

    /// Our own slot in the peer context.
    pub fn self_index(&self) -> usize {
        self.params.self_index()
    }

    /// Broadcast a payload to every other participant, storing our own copy
    /// in the message slots the way every received broadcast is stored.
    pub(crate) fn broadcast(
        &mut self,
        round: u16,
        content: P::Content,
    ) -> std::result::Result<(), RoundError> {
        let message = Message::broadcast(self.params.self_id(), content);
        self.store
            .store(message.clone())
            .map_err(|fault| self.error(round, fault, Vec::new()))?;
        self.out
            .send(message)
            .map_err(|_| self.error(round, Fault::SinkDropped, Vec::new()))
    }

    /// Deliver the terminal value on the end sink.
    pub(crate) fn finish(
        &self,
        round: u16,
        output: P::Output,
    ) -> std::result::Result<(), RoundError> {
        self.end
            .send(output)
            .map_err(|_| self.error(round, Fault::SinkDropped, Vec::new()))
    }

    /// Build a [`RoundError`] with ourselves as the victim.
    pub(crate) fn error(&self, round: u16, cause: Fault, culprits: Vec<PartyId>) -> RoundError {
        RoundError::new(self.params.self_id().clone(), round, cause, culprits)
    }

    /// Wrap a failed cryptographic computation as an unattributable
    /// [`RoundError`].
    pub(crate) fn computation(
        &self,
        round: u16,
        cause: crate::errors::InternalError,
    ) -> RoundError {
        self.error(round, Fault::Computation(cause.to_string()), Vec::new())
    }
}

/// Fan a per-peer verification out across worker threads and join on all of
/// them, returning `(peer_index, result)` pairs in slot order. The closure
/// runs once for every slot except `skip` (our own).
pub(crate) fn fanout_peers<T, F>(party_count: usize, skip: usize, f: F) -> Vec<(usize, T)>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    std::thread::scope(|scope| {
        let f = &f;
        let workers: Vec<_> = (0..party_count)
            .filter(|&j| j != skip)
            .map(|j| (j, scope.spawn(move || f(j))))
            .collect();
        workers
            .into_iter()
            .map(|(j, worker)| (j, worker.join().expect("verification worker panicked")))
            .collect()
    })
}

/// Lifecycle of a [`Party`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Constructed but not yet started.
    NotStarted,
    /// Running the round pipeline.
    InProgress,
    /// The terminal round delivered its output on the end sink.
    TerminatedSuccessfully,
    /// A round failed; the error sink received the [`RoundError`].
    Failed,
}

/// One participant's driver for a protocol run.
///
/// The party owns the run parameters, the protocol state, the message slots,
/// and the current round. All coordination with other participants flows
/// through the out sink and inbound [`update`](Party::update) calls;
/// participants never share memory. The engine is the sole writer of the
/// sinks and the caller drains the receivers.
pub struct Party<P: Protocol> {
    params: Parameters,
    state: P::State,
    store: MessageStore<P::Content>,
    round: Option<Box<dyn Round<P>>>,
    status: Status,
    out: Sender<Message<P::Content>>,
    end: Sender<P::Output>,
    err: Sender<RoundError>,
}

impl<P: Protocol> Party<P> {
    pub(crate) fn new(
        params: Parameters,
        state: P::State,
        out: Sender<Message<P::Content>>,
        end: Sender<P::Output>,
        err: Sender<RoundError>,
    ) -> Self {
        let store = MessageStore::new(params.party_count());
        Self {
            params,
            state,
            store,
            round: None,
            status: Status::NotStarted,
            out,
            end,
            err,
        }
    }

    /// Our own identity.
    pub fn party_id(&self) -> &PartyId {
        self.params.self_id()
    }

    /// The run parameters.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Where the party is in its lifecycle.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Enter the first round. Fails with [`CallerError::AlreadyStarted`] if
    /// called twice.
    pub fn start<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        if self.status != Status::NotStarted {
            error!("{}: party was started twice", P::NAME);
            Err(CallerError::AlreadyStarted)?
        }
        info!("{}: party {} starting", P::NAME, self.params.self_id());
        self.status = Status::InProgress;

        let mut first = P::first_round();
        let result = first.start(
            &mut *rng,
            &mut RoundCtx {
                params: &self.params,
                state: &mut self.state,
                store: &mut self.store,
                out: &self.out,
                end: &self.end,
            },
        );
        if let Err(round_error) = result {
            return Err(self.fail(round_error));
        }
        self.round = Some(first);
        self.advance(rng)
    }

    /// Process one inbound message.
    ///
    /// The message is validated against the peer context, stored in its
    /// round's slot (rounds that have not started yet read it on entry), and
    /// the round pipeline advances as far as the stored messages allow.
    pub fn update<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        message: &Message<P::Content>,
    ) -> Result<()> {
        info!(
            "{}: party {} received {} from {}",
            P::NAME,
            self.params.self_id(),
            message.content().kind_name(),
            message.from()
        );
        match self.status {
            Status::TerminatedSuccessfully | Status::Failed => {
                warn!("{}: message delivered to a finished party", P::NAME);
                Err(CallerError::ProtocolAlreadyTerminated)?
            }
            Status::NotStarted | Status::InProgress => {}
        }

        let sender = message.from();
        if sender == self.params.self_id() {
            error!("{}: received a message from ourselves", P::NAME);
            Err(CallerError::BadInput)?
        }
        if !self.params.peers().contains(sender) {
            return Err(self.fail(RoundError::new(
                self.params.self_id().clone(),
                self.round_number(),
                Fault::InvalidSender,
                vec![sender.clone()],
            )));
        }
        if message.content().expects_broadcast() != message.is_broadcast() {
            return Err(self.fail(RoundError::new(
                self.params.self_id().clone(),
                self.round_number(),
                Fault::UnexpectedMessage,
                vec![sender.clone()],
            )));
        }

        if let Err(fault) = self.store.store(message.clone()) {
            return Err(self.fail(RoundError::new(
                self.params.self_id().clone(),
                self.round_number(),
                fault,
                vec![sender.clone()],
            )));
        }

        match self.status {
            Status::InProgress => self.advance(rng),
            // Stored before start; the first round applies it on entry.
            _ => Ok(()),
        }
    }

    /// Process one inbound message straight off the wire.
    pub fn update_from_bytes<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        bytes: &[u8],
        from: PartyId,
        is_broadcast: bool,
    ) -> Result<()> {
        let message = Message::from_wire(bytes, from, is_broadcast)?;
        self.update(rng, &message)
    }

    fn round_number(&self) -> u16 {
        self.round.as_ref().map_or(0, |round| round.number())
    }

    /// Drive the pipeline: whenever the current round is ready, move to its
    /// successor and start it. A round that expects no inbound messages is
    /// ready immediately, so a terminal computation round runs to the end
    /// sink in the same call that completed its predecessor.
    fn advance<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        loop {
            let Some(round) = self.round.as_mut() else {
                return Ok(());
            };
            let ready = {
                let mut ctx = RoundCtx {
                    params: &self.params,
                    state: &mut self.state,
                    store: &mut self.store,
                    out: &self.out,
                    end: &self.end,
                };
                match round.update(&mut ctx) {
                    Ok(ready) => ready,
                    Err(round_error) => return Err(self.fail(round_error)),
                }
            };
            if !ready {
                return Ok(());
            }

            let finished = self
                .round
                .take()
                .expect("round is present while the party is in progress");
            match finished.next_round() {
                None => {
                    info!(
                        "{}: party {} finished",
                        P::NAME,
                        self.params.self_id()
                    );
                    self.status = Status::TerminatedSuccessfully;
                    return Ok(());
                }
                Some(mut next) => {
                    info!(
                        "{}: party {} entering round {}",
                        P::NAME,
                        self.params.self_id(),
                        next.number()
                    );
                    let result = next.start(
                        &mut *rng,
                        &mut RoundCtx {
                            params: &self.params,
                            state: &mut self.state,
                            store: &mut self.store,
                            out: &self.out,
                            end: &self.end,
                        },
                    );
                    if let Err(round_error) = result {
                        return Err(self.fail(round_error));
                    }
                    self.round = Some(next);
                }
            }
        }
    }

    /// Surface a round failure on the error sink and stop the party.
    fn fail(&mut self, round_error: RoundError) -> crate::errors::InternalError {
        error!("{}: {}", P::NAME, round_error);
        self.status = Status::Failed;
        self.round = None;
        // The caller may have dropped the error sink; the returned error
        // still reports the failure.
        let _ = self.err.send(round_error.clone());
        round_error.into()
    }
}

impl<P: Protocol> Display for Party<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.round {
            Some(round) => write!(
                f,
                "id: {}, {} round {}",
                self.params.self_id(),
                P::NAME,
                round.number()
            ),
            None => write!(
                f,
                "id: {}, {} {:?}",
                self.params.self_id(),
                P::NAME,
                self.status
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        addrgen::AddrGenContent,
        commitments::HashCommitDecommit,
        protocol::testing::test_peer_context,
        utils::{bn_from_u64, testing::init_testing},
    };

    fn commit_message(sender: &PartyId, value: u64) -> Message<AddrGenContent> {
        let rng = &mut rand::rngs::OsRng;
        let cmt = HashCommitDecommit::new(rng, &[bn_from_u64(value)]);
        Message::broadcast(sender, AddrGenContent::Round1(cmt.c))
    }

    #[test]
    fn identical_redelivery_is_idempotent() {
        let _rng = init_testing();
        let peers = test_peer_context(3);
        let mut store = MessageStore::<AddrGenContent>::new(3);
        let message = commit_message(peers.get(1).unwrap(), 5);
        store.store(message.clone()).unwrap();
        store.store(message.clone()).unwrap();
        assert_eq!(store.message(0, 1), Some(&message));
    }

    #[test]
    fn divergent_redelivery_is_a_fault() {
        let _rng = init_testing();
        let peers = test_peer_context(3);
        let mut store = MessageStore::<AddrGenContent>::new(3);
        let sender = peers.get(1).unwrap();
        store.store(commit_message(sender, 5)).unwrap();
        assert_eq!(
            store.store(commit_message(sender, 6)),
            Err(Fault::DuplicateDivergent)
        );
    }

    #[test]
    fn completeness_requires_every_slot() {
        let _rng = init_testing();
        let peers = test_peer_context(3);
        let mut store = MessageStore::<AddrGenContent>::new(3);
        for index in 0..2 {
            store
                .store(commit_message(peers.get(index).unwrap(), index as u64))
                .unwrap();
        }
        assert!(!store.complete_where(0, |m| m.is_broadcast()));
        store.store(commit_message(peers.get(2).unwrap(), 2)).unwrap();
        assert!(store.complete_where(0, |m| m.is_broadcast()));
    }

    #[test]
    fn fanout_reports_every_peer_in_slot_order() {
        let results = fanout_peers(5, 2, |j| j * 10);
        assert_eq!(results, vec![(0, 0), (1, 10), (3, 30), (4, 40)]);
    }
}
