use std::collections::{HashMap, VecDeque};

use broker_wire::{Identity, OriginAddr, PublishFrame, Topic};

/// Stable handle into a [`crate::Broker`]'s session arena. Sessions
/// are never destroyed (I5), so a plain arena index never dangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub(crate) u32);

/// A session's connection state. `H` is the caller-supplied handle
/// type for a live stream (an `mio::Token`-shaped value in
/// `broker-net`); `broker-core` never touches the handle beyond
/// storing and returning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState<H> {
    Connected(H),
    Disconnected,
}

/// Long-lived logical identity of a subscriber, persisting across
/// reconnections (§3 Session).
pub struct Session<H> {
    pub(crate) identity: Identity,
    pub(crate) conn: ConnState<H>,
    pub(crate) peer_addr: Option<OriginAddr>,
    pub(crate) topics: HashMap<Topic, bool>,
    pub(crate) pending: VecDeque<PublishFrame>,
}

impl<H> Session<H> {
    pub(crate) fn new(identity: Identity, conn: ConnState<H>, peer_addr: Option<OriginAddr>) -> Self {
        Self { identity, conn, peer_addr, topics: HashMap::new(), pending: VecDeque::new() }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn conn(&self) -> &ConnState<H> {
        &self.conn
    }

    #[must_use]
    pub fn peer_addr(&self) -> Option<OriginAddr> {
        self.peer_addr
    }

    #[must_use]
    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.topics.contains_key(topic)
    }

    #[must_use]
    pub fn sf_flag(&self, topic: &Topic) -> Option<bool> {
        self.topics.get(topic).copied()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
