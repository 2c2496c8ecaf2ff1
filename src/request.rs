//! Requests: the three things a participant can contribute to the
//! session — perform an operation, undo their last undoable request,
//! or redo their last undone one.

use crate::op::{Operation, OperationFlags};
use crate::vector::StateVector;

/// What a request asks the session to do. Mirrors
/// `InfAdoptedRequestType`'s three variants.
#[derive(Clone, Debug)]
pub enum RequestKind<O> {
    Do(O),
    Undo,
    Redo,
}

/// A single contribution from a participant: what to do, who asked for
/// it, and the state vector the participant had reached when they
/// asked. Everything the engine needs to translate and execute a
/// request travels with the request itself — it never reaches back
/// into the log to look up context.
#[derive(Clone, Debug)]
pub struct Request<P, O> {
    pub user: P,
    pub vector: StateVector<P>,
    pub kind: RequestKind<O>,
}

impl<P: Copy, O> Request<P, O> {
    pub fn do_(user: P, vector: StateVector<P>, op: O) -> Self {
        Request { user, vector, kind: RequestKind::Do(op) }
    }

    pub fn undo(user: P, vector: StateVector<P>) -> Self {
        Request { user, vector, kind: RequestKind::Undo }
    }

    pub fn redo(user: P, vector: StateVector<P>) -> Self {
        Request { user, vector, kind: RequestKind::Redo }
    }

    pub fn is_do(&self) -> bool {
        matches!(self.kind, RequestKind::Do(_))
    }

    pub fn is_undo(&self) -> bool {
        matches!(self.kind, RequestKind::Undo)
    }

    pub fn is_redo(&self) -> bool {
        matches!(self.kind, RequestKind::Redo)
    }

    pub fn operation(&self) -> Option<&O> {
        match &self.kind {
            RequestKind::Do(op) => Some(op),
            _ => None,
        }
    }

    /// Whether applying this request changes buffer content: a `Do`
    /// defers to its operation's flags, an `Undo`/`Redo` always does —
    /// there is nothing to undo or redo that didn't affect the buffer
    /// in the first place.
    pub fn affects_buffer(&self) -> bool
    where
        O: Operation<P>,
    {
        match &self.kind {
            RequestKind::Do(op) => op.flags().contains(OperationFlags::AFFECTS_BUFFER),
            RequestKind::Undo | RequestKind::Redo => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct Noop;

    impl Operation<u32> for Noop {
        type Buffer = ();
        fn apply(&self, _user: &u32, _buffer: &mut ()) {}
        fn transform(&self, _against: &Self, _cid: crate::op::ConcurrencyId) -> Self {
            Noop
        }
        fn mirror(&self) -> Self {
            Noop
        }
        fn fold(&self, _user: &u32, _direction: crate::op::FoldDirection) -> Self {
            Noop
        }
        fn is_reversible(&self) -> bool {
            true
        }
        fn make_reversible(&self, _translated: &Self, _buffer: &()) -> Option<Self> {
            Some(Noop)
        }
        fn flags(&self) -> OperationFlags {
            OperationFlags::empty()
        }
        fn needs_concurrency_id(&self, _against: &Self) -> bool {
            false
        }
    }

    #[test]
    fn do_affects_buffer_follows_operation_flags() {
        let r = Request::do_(1, StateVector::new(), Noop);
        assert!(!r.affects_buffer());
    }

    #[test]
    fn undo_and_redo_always_affect_buffer() {
        let u: Request<u32, Noop> = Request::undo(1, StateVector::new());
        let rd: Request<u32, Noop> = Request::redo(1, StateVector::new());
        assert!(u.affects_buffer());
        assert!(rd.affects_buffer());
    }

    #[test]
    fn operation_accessor() {
        let r = Request::do_(1, StateVector::new(), Noop);
        assert!(r.operation().is_some());
        let u: Request<u32, Noop> = Request::undo(1, StateVector::new());
        assert!(u.operation().is_none());
    }
}
