//! The participant table: who is in the session, whether they're
//! local or remote, what state vector they're each known to have
//! reached, and their own private request log.
//!
//! Generalized from `crdt/primitives/user_table.rs`'s id-to-compact-index
//! map: instead of mapping a user id to a span-storage index, this maps
//! a participant id to a small record the engine and log-GC pass read
//! on every call. The dense `Vec` mirror exists for the same reason the
//! C core keeps `users_begin`/`users_end` arrays — `engine::translate`,
//! `algorithm::execute_request` and `algorithm::gc_logs` all iterate
//! every known participant per call, and a hash map alone would make
//! that a cache-unfriendly, unordered walk. Each participant keeps
//! their own `RequestLog`, mirroring the C core's one-log-per-user
//! design (`inf_adopted_user_get_request_log`): reachability walks a
//! single participant's history, never another's.

use rustc_hash::FxHashMap;
use std::hash::Hash;

use crate::log::RequestLog;
use crate::vector::StateVector;

/// Whether a participant's requests originate on this host (`Local`,
/// generated through `Algorithm::generate_*`) or arrive over the wire
/// (`Remote`, applied through `Algorithm::receive_request`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Per-participant bookkeeping: where their requests come from, the
/// state vector they are currently known to have reached, and their
/// own request log.
pub struct ParticipantRecord<P, O> {
    pub id: P,
    pub origin: Origin,
    pub vector: StateVector<P>,
    pub log: RequestLog<P, O>,
}

/// Events emitted as participants join or leave. Delivered through the
/// `Sink` an `Algorithm` is constructed with, the same default-handler-
/// then-listener order the C core's GObject signals use.
#[derive(Clone, Copy, Debug)]
pub enum UserEvent<P> {
    AddUser(P),
    AddLocalUser(P),
    RemoveLocalUser(P),
}

/// The set of participants known to an `Algorithm` instance.
pub struct UserTable<P: Copy + Eq + Hash, O> {
    index: FxHashMap<P, usize>,
    records: Vec<ParticipantRecord<P, O>>,
}

impl<P: Copy + Eq + Hash, O> Default for UserTable<P, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + Eq + Hash, O> UserTable<P, O> {
    pub fn new() -> Self {
        UserTable { index: FxHashMap::default(), records: Vec::new() }
    }

    /// Add a participant known to have originated elsewhere and joined
    /// the session with an empty state vector and log. No-op if
    /// already known.
    pub fn add_user(&mut self, id: P) -> bool {
        self.add(id, Origin::Remote)
    }

    /// Add a participant whose requests this host will generate.
    pub fn add_local_user(&mut self, id: P) -> bool {
        self.add(id, Origin::Local)
    }

    fn add(&mut self, id: P, origin: Origin) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        let idx = self.records.len();
        self.records.push(ParticipantRecord { id, origin, vector: StateVector::new(), log: RequestLog::new() });
        self.index.insert(id, idx);
        true
    }

    /// Demote a local participant to remote, e.g. when a local user
    /// disconnects but the session continues with their history intact.
    pub fn remove_local_user(&mut self, id: P) -> bool {
        match self.index.get(&id) {
            Some(&idx) if self.records[idx].origin == Origin::Local => {
                self.records[idx].origin = Origin::Remote;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: P) -> bool {
        self.index.contains_key(&id)
    }

    pub fn record(&self, id: P) -> Option<&ParticipantRecord<P, O>> {
        self.index.get(&id).map(|&idx| &self.records[idx])
    }

    pub fn record_mut(&mut self, id: P) -> Option<&mut ParticipantRecord<P, O>> {
        match self.index.get(&id) {
            Some(&idx) => Some(&mut self.records[idx]),
            None => None,
        }
    }

    pub fn vector(&self, id: P) -> Option<&StateVector<P>> {
        self.record(id).map(|r| &r.vector)
    }

    pub fn set_vector(&mut self, id: P, vector: StateVector<P>) {
        if let Some(r) = self.record_mut(id) {
            r.vector = vector;
        }
    }

    pub fn log(&self, id: P) -> Option<&RequestLog<P, O>> {
        self.record(id).map(|r| &r.log)
    }

    pub fn log_mut(&mut self, id: P) -> Option<&mut RequestLog<P, O>> {
        self.record_mut(id).map(|r| &mut r.log)
    }

    pub fn is_local(&self, id: P) -> bool {
        matches!(self.record(id), Some(r) if r.origin == Origin::Local)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate every known participant id, in join order. The hot loop
    /// `translate`, `transform_request`, and `gc_logs` all walk.
    pub fn ids(&self) -> impl Iterator<Item = P> + '_ {
        self.records.iter().map(|r| r.id)
    }

    /// Iterate every known participant's full record, in join order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantRecord<P, O>> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParticipantRecord<P, O>> {
        self.records.iter_mut()
    }

    /// Iterate only local participants, in join order.
    pub fn local_ids(&self) -> impl Iterator<Item = P> + '_ {
        self.records.iter().filter(|r| r.origin == Origin::Local).map(|r| r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct Tag;

    type Table = UserTable<u32, Tag>;

    #[test]
    fn empty_table() {
        let t = Table::new();
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn add_user_is_idempotent() {
        let mut t = Table::new();
        assert!(t.add_user(1));
        assert!(!t.add_user(1));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn local_vs_remote_origin() {
        let mut t = Table::new();
        t.add_local_user(1);
        t.add_user(2);
        assert!(t.is_local(1));
        assert!(!t.is_local(2));
        assert_eq!(t.local_ids().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn remove_local_user_demotes_to_remote() {
        let mut t = Table::new();
        t.add_local_user(1);
        assert!(t.remove_local_user(1));
        assert!(!t.is_local(1));
        assert!(t.contains(1));
    }

    #[test]
    fn remove_local_user_no_op_for_unknown_or_remote() {
        let mut t = Table::new();
        assert!(!t.remove_local_user(99));
        t.add_user(1);
        assert!(!t.remove_local_user(1));
    }

    #[test]
    fn set_and_read_vector() {
        let mut t = Table::new();
        t.add_user(1);
        let mut v = StateVector::new();
        v.set(1, 3);
        t.set_vector(1, v.clone());
        assert_eq!(t.vector(1), Some(&v));
    }

    #[test]
    fn each_participant_has_their_own_log() {
        let mut t = Table::new();
        t.add_user(1);
        t.add_user(2);
        assert_eq!(t.log(1).unwrap().end(), 0);
        assert_eq!(t.log(2).unwrap().end(), 0);
    }

    #[test]
    fn iteration_order_is_join_order() {
        let mut t = Table::new();
        t.add_user(3);
        t.add_user(1);
        t.add_user(2);
        assert_eq!(t.ids().collect::<Vec<_>>(), vec![3, 1, 2]);
    }
}
