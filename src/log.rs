//! Per-participant request log.
//!
//! Every participant owns exactly one `RequestLog`, holding only *that*
//! participant's own requests in the order they were generated/applied
//! — `Do`, `Undo`, `Redo`. The log is addressed by absolute, ever-
//! increasing position (the same number that appears as that
//! participant's component in any `StateVector`): position `n` is the
//! participant's `n`-th request. Positions below `begin()` have been
//! garbage-collected and are no longer retrievable.
//!
//! Undo/redo pairing is tracked with two small index stacks rather
//! than scanning the log: `active` holds the positions of `Do`/`Redo`
//! requests not yet undone (top = next to undo), `undone` holds the
//! positions of `Undo` requests not yet redone (top = next to redo).
//! A fresh `Do` clears the redo stack, matching ordinary editor undo
//! history — once you act again, the branch you undid away from is
//! gone.

use std::collections::VecDeque;

use crate::request::Request;

struct LogEntry<P, O> {
    request: Request<P, O>,
    /// For Undo: the position of the Do/Redo request it reverses.
    /// For Redo: the position of the Undo request it replays.
    /// `None` for Do requests.
    associated: Option<u64>,
}

/// The append-only, prefix-trimmable history of one participant's
/// requests.
pub struct RequestLog<P, O> {
    entries: VecDeque<LogEntry<P, O>>,
    begin: u64,
    active: Vec<u64>,
    undone: Vec<u64>,
}

impl<P, O> Default for RequestLog<P, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, O> RequestLog<P, O> {
    pub fn new() -> Self {
        RequestLog { entries: VecDeque::new(), begin: 0, active: Vec::new(), undone: Vec::new() }
    }

    /// Oldest retrievable position.
    pub fn begin(&self) -> u64 {
        self.begin
    }

    /// One past the newest position; also this participant's request
    /// count, and the component this participant contributes to any
    /// `StateVector` that has seen all of their requests.
    pub fn end(&self) -> u64 {
        self.begin + self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&self, position: u64) -> Option<usize> {
        if position < self.begin || position >= self.end() {
            return None;
        }
        Some((position - self.begin) as usize)
    }

    /// Retrieve the request at an absolute position, or `None` if it
    /// has been trimmed or does not exist yet.
    pub fn get(&self, position: u64) -> Option<&Request<P, O>> {
        self.slot(position).map(|i| &self.entries[i].request)
    }

    /// Append a request, recording its undo/redo association and
    /// returning the position it was stored at.
    ///
    /// Panics if an `Undo` is appended with nothing active to undo, or
    /// a `Redo` with nothing undone to redo — callers must check
    /// `next_undo`/`next_redo` (via `Algorithm::can_undo`/`can_redo`)
    /// before generating such a request in the first place.
    pub fn add(&mut self, request: Request<P, O>) -> u64 {
        let position = self.end();
        let associated = match &request.kind {
            crate::request::RequestKind::Do(_) => {
                self.active.push(position);
                self.undone.clear();
                None
            }
            crate::request::RequestKind::Undo => {
                let target = self.active.pop().expect("add(Undo) requires next_undo() to be Some");
                self.undone.push(position);
                Some(target)
            }
            crate::request::RequestKind::Redo => {
                let target = self.undone.pop().expect("add(Redo) requires next_redo() to be Some");
                self.active.push(position);
                Some(target)
            }
        };
        self.entries.push_back(LogEntry { request, associated });
        position
    }

    /// The request that would be undone if this participant issued an
    /// `Undo` right now, if any.
    pub fn next_undo(&self) -> Option<u64> {
        self.active.last().copied()
    }

    /// The request that would be redone if this participant issued a
    /// `Redo` right now, if any.
    pub fn next_redo(&self) -> Option<u64> {
        self.undone.last().copied()
    }

    /// For an `Undo`/`Redo` request at `position`, the position it
    /// reverses or replays. `None` for `Do` requests or unknown
    /// positions.
    pub fn prev_associated(&self, position: u64) -> Option<u64> {
        self.slot(position).and_then(|i| self.entries[i].associated)
    }

    /// Walk the associated-request chain back to the `Do` request that
    /// ultimately produced the operation at `position`. Returns
    /// `position` itself if it already names a `Do` request.
    pub fn original_request(&self, position: u64) -> u64 {
        let mut current = position;
        while let Some(prev) = self.prev_associated(current) {
            current = prev;
        }
        current
    }

    /// The newest position in the log whose `original_request` is the
    /// same as `position`'s — the upper bound of the related group
    /// (a `Do` and every `Undo`/`Redo` that references it, directly or
    /// transitively) that must be garbage-collected together, so a GC
    /// pass never strands an `Undo`/`Redo` whose target has been
    /// dropped.
    pub fn upper_related(&self, position: u64) -> u64 {
        let original = self.original_request(position);
        let mut upper = original;
        for (offset, _) in self.entries.iter().enumerate() {
            let candidate = self.begin + offset as u64;
            if candidate >= original && self.original_request(candidate) == original {
                upper = candidate;
            }
        }
        upper
    }

    /// Drop every request with position `< upto`. No-op positions
    /// already below `begin()` are simply skipped.
    pub fn remove_prefix_upto(&mut self, upto: u64) {
        while self.begin < upto && !self.entries.is_empty() {
            self.entries.pop_front();
            self.begin += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::StateVector;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Tag(u32);

    fn do_req(v: StateVector<u32>) -> Request<u32, Tag> {
        Request::do_(1, v, Tag(0))
    }

    #[test]
    fn empty_log_has_no_undo_or_redo() {
        let log: RequestLog<u32, Tag> = RequestLog::new();
        assert_eq!(log.next_undo(), None);
        assert_eq!(log.next_redo(), None);
        assert_eq!(log.begin(), 0);
        assert_eq!(log.end(), 0);
    }

    #[test]
    fn do_request_becomes_next_undo() {
        let mut log = RequestLog::new();
        let pos = log.add(do_req(StateVector::new()));
        assert_eq!(pos, 0);
        assert_eq!(log.next_undo(), Some(0));
        assert_eq!(log.next_redo(), None);
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut log = RequestLog::new();
        log.add(do_req(StateVector::new()));
        let undo_pos = log.add(Request::undo(1, StateVector::new()));
        assert_eq!(log.prev_associated(undo_pos), Some(0));
        assert_eq!(log.next_undo(), None);
        assert_eq!(log.next_redo(), Some(undo_pos));

        let redo_pos = log.add(Request::redo(1, StateVector::new()));
        assert_eq!(log.prev_associated(redo_pos), Some(undo_pos));
        assert_eq!(log.next_undo(), Some(redo_pos));
        assert_eq!(log.next_redo(), None);
    }

    #[test]
    fn fresh_do_clears_redo_history() {
        let mut log = RequestLog::new();
        log.add(do_req(StateVector::new()));
        log.add(Request::undo(1, StateVector::new()));
        assert_eq!(log.next_redo(), Some(1));

        log.add(do_req(StateVector::new()));
        assert_eq!(log.next_redo(), None);
    }

    #[test]
    fn original_request_walks_the_chain() {
        let mut log = RequestLog::new();
        log.add(do_req(StateVector::new()));
        let undo_pos = log.add(Request::undo(1, StateVector::new()));
        let redo_pos = log.add(Request::redo(1, StateVector::new()));
        assert_eq!(log.original_request(0), 0);
        assert_eq!(log.original_request(undo_pos), 0);
        assert_eq!(log.original_request(redo_pos), 0);
    }

    #[test]
    fn upper_related_spans_the_whole_undo_redo_group() {
        let mut log = RequestLog::new();
        log.add(do_req(StateVector::new()));
        log.add(Request::undo(1, StateVector::new()));
        let redo_pos = log.add(Request::redo(1, StateVector::new()));
        assert_eq!(log.upper_related(0), redo_pos);
    }

    #[test]
    fn remove_prefix_upto_trims_and_advances_begin() {
        let mut log = RequestLog::new();
        log.add(do_req(StateVector::new()));
        log.add(Request::undo(1, StateVector::new()));
        log.add(do_req(StateVector::new()));
        log.remove_prefix_upto(2);
        assert_eq!(log.begin(), 2);
        assert!(log.get(0).is_none());
        assert!(log.get(1).is_none());
        assert!(log.get(2).is_some());
    }

    #[test]
    #[should_panic(expected = "next_undo")]
    fn undo_without_active_panics() {
        let mut log: RequestLog<u32, Tag> = RequestLog::new();
        log.add(Request::undo(1, StateVector::new()));
    }
}
