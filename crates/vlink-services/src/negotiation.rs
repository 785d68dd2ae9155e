//! Offer/answer/candidate negotiation with one remote peer.
//!
//! ```text
//! New ──local offer──▶ OfferSent ──remote answer──▶ AnswerExchanged ──▶ ChannelOpen
//!  └──remote offer──▶ OfferReceived ──local answer──┘
//! ```
//!
//! Any state may move to `Closed`. Candidates are accepted in both directions
//! once an offer exists and until the channel is open.

use vlink_core::{PeerId, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    OfferSent,
    OfferReceived,
    AnswerExchanged,
    ChannelOpen,
    Closed,
}

impl NegotiationState {
    /// Candidates may flow in this state.
    fn accepts_candidates(self) -> bool {
        matches!(
            self,
            NegotiationState::OfferSent
                | NegotiationState::OfferReceived
                | NegotiationState::AnswerExchanged
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationEvent {
    LocalOffer,
    RemoteOffer,
    LocalAnswer,
    RemoteAnswer,
    LocalCandidate,
    RemoteCandidate,
    ChannelOpened,
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("{event:?} not valid in state {state:?}")]
    Unexpected {
        state: NegotiationState,
        event: NegotiationEvent,
    },
    #[error("signal from {got} but negotiating with {expected}")]
    WrongPeer { expected: PeerId, got: PeerId },
    #[error("`{0}` is not a negotiation message")]
    NotNegotiation(String),
}

/// Negotiation state for one remote peer.
#[derive(Debug, Clone)]
pub struct Negotiation {
    remote: PeerId,
    state: NegotiationState,
}

impl Negotiation {
    pub fn new(remote: PeerId) -> Self {
        Self {
            remote,
            state: NegotiationState::New,
        }
    }

    pub fn remote(&self) -> &PeerId {
        &self.remote
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == NegotiationState::ChannelOpen
    }

    /// Apply one event. On error the state is unchanged.
    pub fn apply(&mut self, event: NegotiationEvent) -> Result<NegotiationState, NegotiationError> {
        use NegotiationEvent as E;
        use NegotiationState as S;

        let next = match (self.state, event) {
            (S::Closed, _) => None,
            (_, E::Closed) => Some(S::Closed),
            (S::New, E::LocalOffer) => Some(S::OfferSent),
            (S::New, E::RemoteOffer) => Some(S::OfferReceived),
            (S::OfferSent, E::RemoteAnswer) => Some(S::AnswerExchanged),
            (S::OfferReceived, E::LocalAnswer) => Some(S::AnswerExchanged),
            (s, E::LocalCandidate | E::RemoteCandidate) if s.accepts_candidates() => Some(s),
            (S::AnswerExchanged, E::ChannelOpened) => Some(S::ChannelOpen),
            _ => None,
        };

        match next {
            Some(state) => {
                if state != self.state {
                    tracing::debug!(remote = %self.remote, from = ?self.state, to = ?state, "negotiation transition");
                }
                self.state = state;
                Ok(state)
            }
            None => Err(NegotiationError::Unexpected {
                state: self.state,
                event,
            }),
        }
    }

    /// Apply a relayed signal. Rejects signals from anyone but the remote.
    pub fn on_signal(
        &mut self,
        from: &PeerId,
        kind: &SignalKind,
    ) -> Result<NegotiationState, NegotiationError> {
        if *from != self.remote {
            return Err(NegotiationError::WrongPeer {
                expected: self.remote.clone(),
                got: from.clone(),
            });
        }
        let event = match kind {
            SignalKind::Offer => NegotiationEvent::RemoteOffer,
            SignalKind::Answer => NegotiationEvent::RemoteAnswer,
            SignalKind::Candidate => NegotiationEvent::RemoteCandidate,
            SignalKind::Other(name) => return Err(NegotiationError::NotNegotiation(name.clone())),
        };
        self.apply(event)
    }

    /// The rendezvous server reported `id` gone. Closes if it is our remote.
    pub fn on_peer_disconnected(&mut self, id: &PeerId) -> bool {
        if *id != self.remote || self.state == NegotiationState::Closed {
            return false;
        }
        self.state = NegotiationState::Closed;
        tracing::debug!(remote = %self.remote, "negotiation closed, remote left");
        true
    }
}
