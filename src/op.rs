//! The operation contract the transformation engine is generic over.
//!
//! `engine`/`algorithm` never know what an operation actually does to
//! a buffer — they only need the five primitives below (transform,
//! mirror, fold, reversibility, concurrency tie-breaking) to run the
//! adOPTed translation recursion. Concrete operations — text insert,
//! tree move, whatever a host's buffer needs — implement `Operation`
//! themselves; `op::text` ships one minimal pair as a worked example
//! and a target for the engine's own tests.

use bitflags::bitflags;

bitflags! {
    /// Static properties of an operation, independent of any request
    /// it's wrapped in. Mirrors `InfAdoptedOperationFlags`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct OperationFlags: u8 {
        /// The operation changes buffer content (as opposed to a pure
        /// no-op or cursor-only operation). `Request::affects_buffer`
        /// consults this for `Do` requests.
        const AFFECTS_BUFFER = 0b0000_0001;
        /// The operation can always be made reversible, so
        /// `make_reversible` never returns `None` for it.
        const ALWAYS_REVERSIBLE = 0b0000_0010;
    }
}

/// Tie-break identity for transforming two operations that both touch
/// the same position. `Self` is the operation being transformed,
/// `Other` is the one it's being transformed against. Grounded in
/// `InfAdoptedConcurrencyId` / the `cid` parameter threaded through
/// `inf_text_insert_operation_transform_insert`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConcurrencyId {
    Self_,
    Other,
}

impl ConcurrencyId {
    /// The tie-break as seen from the other side of the same
    /// transformation: what was `Self_` to one party is `Other` to
    /// its counterpart.
    pub fn flip(self) -> Self {
        match self {
            ConcurrencyId::Self_ => ConcurrencyId::Other,
            ConcurrencyId::Other => ConcurrencyId::Self_,
        }
    }
}

/// Which direction an undone/redone request is being folded: into the
/// log as it's undone, or back out as it's redone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldDirection {
    Undo,
    Redo,
}

/// Capability set an operation must provide for the engine to
/// translate and execute requests carrying it.
///
/// `P` is the participant-id type the surrounding `Request`/`StateVector`
/// machinery is generic over; operations rarely need it directly, but
/// `fold` and `apply` take the acting participant because some
/// operations (e.g. a tree move) need to know who performed them.
pub trait Operation<P>: Clone {
    /// The buffer type this operation mutates.
    type Buffer;

    /// Apply the operation's effect to a buffer.
    fn apply(&self, user: &P, buffer: &mut Self::Buffer);

    /// Return a new operation with the effect of `against` included,
    /// transforming `self` so that applying it after `against` has
    /// already been applied produces the same end state as applying
    /// `self` first and `against` afterwards would have.
    ///
    /// `cid` only matters when `needs_concurrency_id(against)` is true.
    fn transform(&self, against: &Self, cid: ConcurrencyId) -> Self;

    /// The inverse operation, used to build the undo of a request.
    fn mirror(&self) -> Self;

    /// Fold this operation across an undo/redo boundary for the given
    /// user, producing the operation that should be recorded in the
    /// log in its place.
    fn fold(&self, user: &P, direction: FoldDirection) -> Self;

    /// Whether this operation can be made reversible at all.
    fn is_reversible(&self) -> bool;

    /// Build the reversible form of this operation given its already
    /// translated counterpart and the buffer state it is about to be
    /// applied to, or `None` if `is_reversible()` is false.
    fn make_reversible(&self, translated: &Self, buffer: &Self::Buffer) -> Option<Self>;

    /// Static flags describing this operation.
    fn flags(&self) -> OperationFlags;

    /// Whether transforming `self` against `against` is ambiguous
    /// without an explicit tie-break (both touch the same position).
    fn needs_concurrency_id(&self, against: &Self) -> bool;
}

/// A minimal text insert/delete operation pair exercising the
/// `Operation` contract end to end, grounded in
/// `inf-text-insert-operation.c`'s position-shifting transform rules.
/// Not a text CRDT: positions are plain character offsets into a
/// `String` buffer, with no tombstones or identity tracking.
#[cfg(feature = "text-ops")]
pub mod text {
    use super::{ConcurrencyId, FoldDirection, Operation, OperationFlags};

    /// Insert `content` at `position`, or delete `length` characters
    /// starting at `position`.
    ///
    /// A freshly constructed `Delete` doesn't yet know what it removed —
    /// `removed` starts `None` and is filled in by [`make_reversible`]
    /// the moment the engine actually executes it against a real buffer,
    /// the only point at which that text is available. Until then
    /// `is_reversible()` reports `false`, matching the C core's split
    /// between a bare operation and one capable of producing `mirror()`.
    ///
    /// [`make_reversible`]: Operation::make_reversible
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum TextOp {
        Insert { position: usize, content: String },
        Delete { position: usize, length: usize, removed: Option<String> },
    }

    impl TextOp {
        /// Construct a fresh delete intent with no recorded content yet.
        pub fn delete(position: usize, length: usize) -> Self {
            TextOp::Delete { position, length, removed: None }
        }

        fn position(&self) -> usize {
            match self {
                TextOp::Insert { position, .. } => *position,
                TextOp::Delete { position, .. } => *position,
            }
        }
    }

    impl<P> Operation<P> for TextOp {
        type Buffer = String;

        fn apply(&self, _user: &P, buffer: &mut String) {
            match self {
                TextOp::Insert { position, content } => {
                    let byte = char_to_byte(buffer, *position);
                    buffer.insert_str(byte, content);
                }
                TextOp::Delete { position, length, .. } => {
                    let start = char_to_byte(buffer, *position);
                    let end = char_to_byte(buffer, *position + *length);
                    buffer.replace_range(start..end, "");
                }
            }
        }

        fn transform(&self, against: &Self, cid: ConcurrencyId) -> Self {
            match (self, against) {
                (TextOp::Insert { position, content }, TextOp::Insert { position: ap, content: ac }) => {
                    let new_pos = transform_insert_vs_insert(*position, *ap, ac.chars().count(), cid);
                    TextOp::Insert { position: new_pos, content: content.clone() }
                }
                (
                    TextOp::Insert { position, content },
                    TextOp::Delete { position: ap, length: al, .. },
                ) => {
                    let (new_pos, consumed) = transform_insert_vs_delete(*position, *ap, *al);
                    let new_content = if consumed { String::new() } else { content.clone() };
                    TextOp::Insert { position: new_pos, content: new_content }
                }
                (
                    TextOp::Delete { position, length, .. },
                    TextOp::Insert { position: ap, content: ac },
                ) => {
                    let (new_pos, new_len) = transform_delete_vs_insert(*position, *length, *ap, ac.chars().count());
                    TextOp::delete(new_pos, new_len)
                }
                (
                    TextOp::Delete { position, length, .. },
                    TextOp::Delete { position: ap, length: al, .. },
                ) => {
                    let (new_pos, new_len) = transform_delete_vs_delete(*position, *length, *ap, *al);
                    TextOp::delete(new_pos, new_len)
                }
            }
        }

        fn mirror(&self) -> Self {
            match self {
                TextOp::Insert { position, content } => {
                    TextOp::delete(*position, content.chars().count())
                }
                // Only reached once `removed` has been filled in by
                // `make_reversible` — `can_undo` refuses to target a
                // `Delete` that never resolved (`is_reversible() ==
                // false`), so this arm never sees `removed: None` in
                // practice.
                TextOp::Delete { position, removed: Some(content), .. } => {
                    TextOp::Insert { position: *position, content: content.clone() }
                }
                TextOp::Delete { removed: None, .. } => self.clone(),
            }
        }

        fn fold(&self, _user: &P, _direction: FoldDirection) -> Self {
            self.clone()
        }

        fn is_reversible(&self) -> bool {
            match self {
                TextOp::Insert { .. } => true,
                TextOp::Delete { removed, .. } => removed.is_some(),
            }
        }

        /// Resolve a not-yet-reversible `Delete` by recording the text it
        /// is about to remove, read from the buffer at `translated`'s
        /// (execution-time) position — the only moment that text is
        /// still present. `Insert` is already reversible so the engine
        /// never calls this for one; the arm below only exists so the
        /// match is exhaustive.
        fn make_reversible(&self, translated: &Self, buffer: &String) -> Option<Self> {
            match translated {
                TextOp::Insert { position, content } => {
                    Some(TextOp::Insert { position: *position, content: content.clone() })
                }
                TextOp::Delete { position, length, .. } => {
                    let start = char_to_byte(buffer, *position);
                    let end = char_to_byte(buffer, *position + *length);
                    Some(TextOp::Delete {
                        position: *position,
                        length: *length,
                        removed: Some(buffer[start..end].to_string()),
                    })
                }
            }
        }

        fn flags(&self) -> OperationFlags {
            OperationFlags::AFFECTS_BUFFER | OperationFlags::ALWAYS_REVERSIBLE
        }

        fn needs_concurrency_id(&self, against: &Self) -> bool {
            matches!(
                (self, against),
                (TextOp::Insert { position: p, .. }, TextOp::Insert { position: ap, .. }) if p == ap
            )
        }
    }

    fn char_to_byte(buffer: &str, chars: usize) -> usize {
        buffer.char_indices().nth(chars).map(|(b, _)| b).unwrap_or(buffer.len())
    }

    /// Ported from `inf_text_insert_operation_transform_insert`, minus
    /// the lcs-position branch (this sample operation does not retain
    /// a least-common-successor snapshot, so concurrent same-position
    /// inserts fall straight to the `cid` tie-break).
    fn transform_insert_vs_insert(pos: usize, against_pos: usize, against_len: usize, cid: ConcurrencyId) -> usize {
        use std::cmp::Ordering;
        match pos.cmp(&against_pos) {
            Ordering::Less => pos,
            Ordering::Greater => pos + against_len,
            Ordering::Equal => match cid {
                ConcurrencyId::Other => pos,
                ConcurrencyId::Self_ => pos + against_len,
            },
        }
    }

    /// Ported from `inf_text_insert_operation_transform_delete`, with
    /// one addition beyond the position shift: an insert landing
    /// strictly inside a range a concurrent peer is deleting has no
    /// stable position to resolve to relative to the survivors on
    /// either side of it, so it is reported `consumed` — the caller
    /// turns it into an empty-content insert (a no-op) rather than
    /// guessing a side. `transform_delete_vs_insert` makes the matching
    /// choice (extend the deleted span to still cover that position),
    /// so the two transforms agree on which side wins and stay
    /// convergent; a production text op would instead retain a split
    /// point so the inserted text survives.
    fn transform_insert_vs_delete(pos: usize, against_pos: usize, against_len: usize) -> (usize, bool) {
        if pos < against_pos {
            (pos, false)
        } else if pos >= against_pos + against_len {
            (pos - against_len, false)
        } else {
            (against_pos, true)
        }
    }

    /// Ported from `inf_text_delete_operation_transform_insert`'s
    /// position-shift rule, extended to match
    /// `transform_insert_vs_delete`'s "delete wins" choice: an insert
    /// landing strictly inside the range being deleted is folded into
    /// the deletion (the range grows by `against_len` to still remove
    /// it) instead of leaving it stranded mid-range, which a plain
    /// position shift with no length change would do.
    fn transform_delete_vs_insert(pos: usize, length: usize, against_pos: usize, against_len: usize) -> (usize, usize) {
        if against_pos <= pos {
            (pos + against_len, length)
        } else if against_pos >= pos + length {
            (pos, length)
        } else {
            (pos, length + against_len)
        }
    }

    /// Ported from `inf_text_delete_operation_transform_delete`'s
    /// interval-overlap handling: shrink/shift the surviving range.
    fn transform_delete_vs_delete(pos: usize, len: usize, against_pos: usize, against_len: usize) -> (usize, usize) {
        let end = pos + len;
        let against_end = against_pos + against_len;

        if pos >= against_end {
            (pos - against_len, len)
        } else if end <= against_pos {
            (pos, len)
        } else {
            let new_pos = pos.min(against_pos);
            let overlap_start = pos.max(against_pos);
            let overlap_end = end.min(against_end);
            let overlap = overlap_end.saturating_sub(overlap_start);
            let new_len = len.saturating_sub(overlap);
            (new_pos, new_len)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[derive(Clone, Copy, PartialEq, Eq, Debug)]
        struct U(u32);

        #[test]
        fn apply_insert_and_delete() {
            let mut buf = String::from("hello world");
            let ins = TextOp::Insert { position: 5, content: ",".to_string() };
            Operation::<U>::apply(&ins, &U(1), &mut buf);
            assert_eq!(buf, "hello, world");

            let del = TextOp::delete(0, 5);
            Operation::<U>::apply(&del, &U(1), &mut buf);
            assert_eq!(buf, ", world");
        }

        #[test]
        fn insert_before_insert_is_unaffected() {
            let op = TextOp::Insert { position: 0, content: "a".to_string() };
            let against = TextOp::Insert { position: 5, content: "xyz".to_string() };
            let t = Operation::<U>::transform(&op, &against, ConcurrencyId::Self_);
            assert_eq!(t, TextOp::Insert { position: 0, content: "a".to_string() });
        }

        #[test]
        fn insert_after_insert_shifts_right() {
            let op = TextOp::Insert { position: 10, content: "a".to_string() };
            let against = TextOp::Insert { position: 5, content: "xyz".to_string() };
            let t = Operation::<U>::transform(&op, &against, ConcurrencyId::Self_);
            assert_eq!(t, TextOp::Insert { position: 13, content: "a".to_string() });
        }

        #[test]
        fn same_position_insert_tie_break_other_wins_position() {
            let op = TextOp::Insert { position: 5, content: "a".to_string() };
            let against = TextOp::Insert { position: 5, content: "b".to_string() };
            let t = Operation::<U>::transform(&op, &against, ConcurrencyId::Other);
            assert_eq!(t, TextOp::Insert { position: 5, content: "a".to_string() });
        }

        #[test]
        fn same_position_insert_tie_break_self_shifts_right() {
            let op = TextOp::Insert { position: 5, content: "a".to_string() };
            let against = TextOp::Insert { position: 5, content: "b".to_string() };
            let t = Operation::<U>::transform(&op, &against, ConcurrencyId::Self_);
            assert_eq!(t, TextOp::Insert { position: 6, content: "a".to_string() });
        }

        #[test]
        fn delete_overlapping_delete_shrinks() {
            let op = TextOp::delete(2, 6);
            let against = TextOp::delete(4, 4);
            let (pos, len) = transform_delete_vs_delete(2, 6, 4, 4);
            assert_eq!((pos, len), (2, 2));
            let t = Operation::<U>::transform(&op, &against, ConcurrencyId::Self_);
            assert_eq!(t, TextOp::delete(2, 2));
        }

        #[test]
        fn fresh_delete_is_not_reversible_until_resolved() {
            let del = TextOp::delete(0, 5);
            assert!(!Operation::<u32>::is_reversible(&del));
        }

        #[test]
        fn insert_is_always_reversible() {
            let ins = TextOp::Insert { position: 0, content: "a".to_string() };
            assert!(Operation::<u32>::is_reversible(&ins));
        }

        #[test]
        fn needs_concurrency_id_only_for_same_position_inserts() {
            let a = TextOp::Insert { position: 5, content: "x".to_string() };
            let b = TextOp::Insert { position: 5, content: "y".to_string() };
            let c = TextOp::Insert { position: 6, content: "y".to_string() };
            assert!(Operation::<U>::needs_concurrency_id(&a, &b));
            assert!(!Operation::<U>::needs_concurrency_id(&a, &c));
        }

        #[test]
        fn make_reversible_roundtrips() {
            let buf = String::from("hello world");
            let del = TextOp::delete(0, 5);
            let resolved = Operation::<U>::make_reversible(&del, &del, &buf).unwrap();
            assert!(Operation::<U>::is_reversible(&resolved));
            let undo = Operation::<U>::mirror(&resolved);
            assert_eq!(undo, TextOp::Insert { position: 0, content: "hello".to_string() });
        }
    }
}
