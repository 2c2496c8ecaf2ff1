//! Error taxonomy for the algorithm facade.
//!
//! `spec.md` names three error *kinds* without prescribing a Rust
//! representation; this crate expresses them as a `thiserror`-derived
//! enum, the same idiom `hxrts-aura`'s `ProtocolError` and
//! `gilbertbw-jj`'s domain errors use (the teacher carries no error
//! crate at all, so this enrichment is drawn from the rest of the pack).

use std::fmt;

/// Everything that can go wrong calling into an `Algorithm`.
///
/// `PreconditionViolation`s are caller bugs — the request violates a
/// contract the caller could have checked first (`can_undo`, whether a
/// user is local, ...). `ProtocolViolation`s indicate a remote peer (or
/// a corrupted transport) sent something inconsistent with the session
/// state. `InternalUnreachable` is the one variant that isn't really
/// "handleable": translation's last-resort search found no reachable
/// candidate. `engine::translate_request` reports this condition via
/// `unreachable!()` rather than returning this variant, since by the
/// time the last-resort search has failed the session's causal history
/// is already corrupt; the variant stays part of the taxonomy for a
/// host that pre-validates reachability itself and wants to surface
/// the same failure through its own `Result`-based API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AlgorithmError<P: fmt::Debug> {
    #[error("participant {0:?} is not local to this host")]
    RemoteFromLocalUser(P),
    #[error("participant {0:?} has nothing to undo")]
    CannotUndo(P),
    #[error("participant {0:?} has nothing to redo")]
    CannotRedo(P),
    #[error("generate_* called for participant {0:?}, who is not registered as local")]
    GeneratorNotLocal(P),
    #[error("state vector component for participant {0:?} does not match its request log")]
    VectorSlotMismatch(P),
    #[error("participant {0:?} is not known to this session")]
    UnknownParticipant(P),
    #[error("translation found no reachable candidate state; the session must be abandoned")]
    InternalUnreachable,
}

pub type AlgorithmResult<T, P> = Result<T, AlgorithmError<P>>;
