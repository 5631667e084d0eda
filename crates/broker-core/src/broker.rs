use std::collections::HashMap;
use std::hash::Hash;

use broker_utils::safe_assert;
use broker_wire::{Identity, OriginAddr, PublishFrame, Topic};

use crate::{
    fanout::FanOutPlan,
    lookup::Lookup,
    session::{ConnState, Session, SessionId},
};

/// Outcome of a handshake bind attempt (§4.3 session state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome<H> {
    /// No session existed for this identity; one was created and is
    /// now `CONNECTED` on `handle`.
    Created(SessionId),
    /// A `DISCONNECTED` session with this identity was rebound to
    /// `handle`; its SF queue should now be drained by the caller.
    Rebound(SessionId, H),
    /// A `CONNECTED` session already holds this identity; the new
    /// handle must be rejected (ERRSAMEID) and torn down by the
    /// caller without touching the existing session.
    Rejected,
}

/// Owns every session, the topic index, and the subscription
/// registry. `H` is the dispatcher's connection-handle type; this
/// type never performs I/O, only state transitions, so it stays
/// testable without real sockets.
///
/// Sessions are never destroyed (I5): the arena is append-only and a
/// `SessionId` never dangles once issued, so other collections can
/// hold it as a stable reference instead of a pointer into the
/// session itself (see the arena/table ownership note this mirrors
/// from the connection-manager pattern it was generalized from).
pub struct Broker<H> {
    sessions: Vec<Session<H>>,
    by_identity: HashMap<Identity, SessionId>,
    by_handle: HashMap<H, SessionId>,
    topic_index: HashMap<Topic, Vec<SessionId>>,
}

impl<H: Copy + Eq + Hash> Default for Broker<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy + Eq + Hash> Broker<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            by_identity: HashMap::new(),
            by_handle: HashMap::new(),
            topic_index: HashMap::new(),
        }
    }

    #[must_use]
    pub fn session(&self, id: SessionId) -> &Session<H> {
        &self.sessions[id.0 as usize]
    }

    #[must_use]
    pub fn lookup_by_identity(&self, identity: &Identity) -> Lookup {
        match self.by_identity.get(identity) {
            None => Lookup::Absent,
            Some(&id) => match self.session(id).conn {
                ConnState::Connected(_) => Lookup::Connected(id),
                ConnState::Disconnected => Lookup::Disconnected(id),
            },
        }
    }

    #[must_use]
    pub fn lookup_by_handle(&self, handle: H) -> Option<SessionId> {
        self.by_handle.get(&handle).copied()
    }

    /// Applies the handshake bind rules (§4.3) for a newly announced
    /// identity on `handle`.
    pub fn bind(&mut self, identity: Identity, handle: H, peer_addr: OriginAddr) -> BindOutcome<H> {
        match self.lookup_by_identity(&identity) {
            Lookup::Connected(_) => BindOutcome::Rejected,
            Lookup::Disconnected(id) => {
                let session = &mut self.sessions[id.0 as usize];
                session.conn = ConnState::Connected(handle);
                session.peer_addr = Some(peer_addr);
                self.by_handle.insert(handle, id);
                BindOutcome::Rebound(id, handle)
            }
            Lookup::Absent => {
                let id = SessionId(self.sessions.len() as u32);
                self.sessions.push(Session::new(identity, ConnState::Connected(handle), Some(peer_addr)));
                self.by_identity.insert(identity, id);
                self.by_handle.insert(handle, id);
                BindOutcome::Created(id)
            }
        }
    }

    /// Marks a session disconnected as if its peer had closed, or as
    /// a consequence of a failed send. Subscriptions and `pending`
    /// are preserved (I5).
    pub fn mark_disconnected(&mut self, id: SessionId) {
        let session = &mut self.sessions[id.0 as usize];
        if let ConnState::Connected(handle) = session.conn {
            self.by_handle.remove(&handle);
        }
        session.conn = ConnState::Disconnected;
    }

    /// Idempotent with respect to topic membership: a second
    /// subscribe to an already-held topic is a no-op that does not
    /// change the stored `sf_flag`. Returns whether the subscription
    /// was newly added.
    pub fn subscribe(&mut self, id: SessionId, topic: Topic, sf: bool) -> bool {
        let session = &mut self.sessions[id.0 as usize];
        if session.topics.contains_key(&topic) {
            return false;
        }
        session.topics.insert(topic, sf);
        self.topic_index.entry(topic).or_default().push(id);
        safe_assert!(self.session(id).is_subscribed(&topic));
        true
    }

    /// No-op if the session is not currently subscribed to `topic`.
    /// Returns whether a subscription was removed.
    pub fn unsubscribe(&mut self, id: SessionId, topic: &Topic) -> bool {
        let session = &mut self.sessions[id.0 as usize];
        if session.topics.remove(topic).is_none() {
            return false;
        }
        if let Some(subs) = self.topic_index.get_mut(topic) {
            subs.retain(|&s| s != id);
        }
        true
    }

    #[must_use]
    pub fn subscribers(&self, topic: &Topic) -> &[SessionId] {
        self.topic_index.get(topic).map_or(&[], Vec::as_slice)
    }

    /// Computes the publish fan-out (§4.5) for `frame`: SF-enqueues
    /// to every disconnected, SF-flagged subscriber inline, and
    /// returns the set of live sessions the caller must still
    /// attempt to send to.
    pub fn publish_fan_out(&mut self, frame: &PublishFrame) -> FanOutPlan<H> {
        let mut plan = FanOutPlan::default();
        let Some(subs) = self.topic_index.get(&frame.topic) else {
            return plan;
        };
        for &id in subs {
            let session = &mut self.sessions[id.0 as usize];
            match session.conn {
                ConnState::Connected(handle) => plan.live.push((id, handle)),
                ConnState::Disconnected => {
                    if session.topics.get(&frame.topic).copied() == Some(true) {
                        session.pending.push_back(*frame);
                    }
                }
            }
        }
        plan
    }

    /// Peeks the head of a session's SF queue without removing it,
    /// so the caller can attempt delivery before committing.
    #[must_use]
    pub fn pending_front(&self, id: SessionId) -> Option<&PublishFrame> {
        self.session(id).pending.front()
    }

    /// Commits removal of the head of a session's SF queue after a
    /// successful send.
    pub fn pending_pop_front(&mut self, id: SessionId) -> Option<PublishFrame> {
        self.sessions[id.0 as usize].pending.pop_front()
    }
}
