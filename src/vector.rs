//! State vectors (vector clocks) over participants.
//!
//! A state vector maps each participant to the number of that
//! participant's requests causally included in a given state. Reading
//! an unknown participant yields 0, so vectors compare and combine
//! correctly even as new participants join mid-session.
//!
//! The entry list is kept sorted by participant id so that equality,
//! `causally_before`, and the two closures below never need more than
//! a single merge-style pass. `smallvec` keeps the common case (a
//! handful of participants) on the stack, the same tradeoff the
//! teacher's primitives reach for with compact collections elsewhere.

use smallvec::SmallVec;
use std::hash::Hash;

/// A participant identifier: stable, externally assigned, comparable.
pub trait Pid: Copy + Eq + Ord + Hash {}
impl<T: Copy + Eq + Ord + Hash> Pid for T {}

/// A stable non-zero integer participant id, provided as the default
/// concrete id type for hosts that don't need their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParticipantId(pub u32);

impl ParticipantId {
    pub fn new(id: u32) -> Self {
        assert!(id != 0, "participant id must be non-zero");
        ParticipantId(id)
    }
}

/// A vector clock mapping participant ids to monotonically increasing
/// tick counts. Absent participants read as 0.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateVector<P: Pid> {
    entries: SmallVec<[(P, u64); 4]>,
}

impl<P: Pid> StateVector<P> {
    /// The empty vector: every participant reads as 0.
    pub fn new() -> Self {
        StateVector { entries: SmallVec::new() }
    }

    fn position(&self, p: P) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&p, |(k, _)| *k)
    }

    /// Get the tick for a participant, 0 if unknown.
    pub fn get(&self, p: P) -> u64 {
        match self.position(p) {
            Ok(idx) => self.entries[idx].1,
            Err(_) => 0,
        }
    }

    /// Set the tick for a participant.
    pub fn set(&mut self, p: P, n: u64) {
        match self.position(p) {
            Ok(idx) => self.entries[idx].1 = n,
            Err(idx) => self.entries.insert(idx, (p, n)),
        }
    }

    /// Add `k` to the tick for a participant (creating it at `k` if absent).
    pub fn add(&mut self, p: P, k: u64) {
        let cur = self.get(p);
        self.set(p, cur + k);
    }

    /// Number of participants with a non-default entry. Not the
    /// participant count of the session — only those this vector has
    /// ever touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `self` causally precedes or equals `other`: every component of
    /// `self` is <= the corresponding component of `other`. Checking
    /// only `self`'s stored entries suffices: any participant present
    /// in `other` but not `self` reads as 0 on the `self` side, which
    /// is `<=` any tick count by construction.
    pub fn causally_before(&self, other: &Self) -> bool {
        self.entries.iter().all(|&(p, n)| n <= other.get(p))
    }

    /// Sum of componentwise differences `other[p] - self[p]` over the
    /// given participant set. Requires `self.causally_before(other)`.
    /// Not a pure function of the two vectors: the participant set is
    /// the *currently known* one, supplied by the caller (typically
    /// iterated from a live `UserTable`), so a participant who joined
    /// after both vectors were captured still contributes (0 - 0 = 0).
    pub fn vdiff(&self, other: &Self, participants: impl Iterator<Item = P>) -> u64 {
        debug_assert!(self.causally_before(other));
        participants.map(|p| other.get(p) - self.get(p)).sum()
    }

    /// Componentwise maximum over the given participant set: the
    /// smallest vector both `self` and `other` causally precede.
    pub fn least_common_successor(&self, other: &Self, participants: impl Iterator<Item = P>) -> Self {
        let mut result = StateVector::new();
        for p in participants {
            result.set(p, self.get(p).max(other.get(p)));
        }
        result
    }

    /// Iterate the (participant, tick) entries actually stored, in
    /// participant order. Does not include participants reading as 0
    /// that were never set.
    pub fn iter(&self) -> impl Iterator<Item = (P, u64)> + '_ {
        self.entries.iter().copied()
    }
}

impl<P: Pid> PartialEq for StateVector<P> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.iter().all(|&(p, n)| other.get(p) == n)
            && other.entries.iter().all(|&(p, n)| self.get(p) == n)
    }
}

impl<P: Pid> Eq for StateVector<P> {}
