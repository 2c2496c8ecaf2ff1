//! The facade a host actually drives: register participants, generate
//! local requests, feed in remote ones, and react to the events that
//! come back out. A structural port of `InfAdoptedAlgorithm`'s public
//! entry points — `execute_request`, `generate_request[_noexec]`,
//! `generate_undo`/`generate_redo`, `receive_request`,
//! `update_request_logs` (here `gc_logs`), and `update_undo_redo` (here
//! `recompute_undo_redo`) — built on top of [`crate::engine`].

use rustc_hash::FxHashMap;

use crate::engine;
use crate::error::{AlgorithmError, AlgorithmResult};
use crate::op::Operation;
use crate::request::{Request, RequestKind};
use crate::user::UserTable;
use crate::vector::{Pid, StateVector};

/// Notifications a host can subscribe to. Named after the GObject
/// signals `InfAdoptedAlgorithm`/`InfUserTable` emit, minus the
/// GObject machinery.
#[derive(Clone, Debug)]
pub enum Event<P> {
    AddUser(P),
    AddLocalUser(P),
    RemoveLocalUser(P),
    /// A request (local or remote) was applied to the buffer.
    ApplyRequest { user: P, affects_buffer: bool },
    CanUndoChanged { user: P, can_undo: bool },
    CanRedoChanged { user: P, can_redo: bool },
}

/// Where [`Event`]s go. Implemented for any `FnMut(Event<P>)`, so a
/// closure or channel sender works directly; implement it yourself for
/// anything that needs to filter, log, or fan events out further.
pub trait Sink<P> {
    fn emit(&mut self, event: Event<P>);
}

impl<P, F: FnMut(Event<P>)> Sink<P> for F {
    fn emit(&mut self, event: Event<P>) {
        (self)(event)
    }
}

/// A sink that does nothing, for hosts that don't care about events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl<P> Sink<P> for NullSink {
    fn emit(&mut self, _event: Event<P>) {}
}

/// Default cap on a participant's own request log before
/// [`Algorithm::gc_logs`] starts trimming it, mirroring libinfinity's
/// `max-total-log-size` construct-only property. `0` disables GC.
pub const DEFAULT_MAX_TOTAL_LOG_SIZE: u64 = 2048;

/// One collaborative editing session: the participant table, the
/// current state vector, the shared buffer, and everything needed to
/// translate and apply requests against them.
pub struct Algorithm<P: Pid, O: Operation<P>, S: Sink<P> = NullSink> {
    users: UserTable<P, O>,
    current: StateVector<P>,
    buffer: O::Buffer,
    max_total_log_size: u64,
    queue: Vec<Request<P, O>>,
    undo_state: FxHashMap<P, bool>,
    redo_state: FxHashMap<P, bool>,
    sink: S,
}

impl<P: Pid + std::fmt::Debug, O: Operation<P>, S: Sink<P>> Algorithm<P, O, S> {
    pub fn new(buffer: O::Buffer, sink: S) -> Self {
        Self::with_max_log_size(buffer, DEFAULT_MAX_TOTAL_LOG_SIZE, sink)
    }

    pub fn with_max_log_size(buffer: O::Buffer, max_total_log_size: u64, sink: S) -> Self {
        Algorithm {
            users: UserTable::new(),
            current: StateVector::new(),
            buffer,
            max_total_log_size,
            queue: Vec::new(),
            undo_state: FxHashMap::default(),
            redo_state: FxHashMap::default(),
            sink,
        }
    }

    pub fn current(&self) -> &StateVector<P> {
        &self.current
    }

    pub fn buffer(&self) -> &O::Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut O::Buffer {
        &mut self.buffer
    }

    pub fn users(&self) -> &UserTable<P, O> {
        &self.users
    }

    pub fn add_user(&mut self, id: P) {
        if self.users.add_user(id) {
            self.sink.emit(Event::AddUser(id));
        }
    }

    pub fn add_local_user(&mut self, id: P) {
        if self.users.add_local_user(id) {
            self.undo_state.insert(id, false);
            self.redo_state.insert(id, false);
            self.sink.emit(Event::AddLocalUser(id));
        }
    }

    pub fn remove_local_user(&mut self, id: P) {
        if self.users.remove_local_user(id) {
            self.sink.emit(Event::RemoveLocalUser(id));
        }
    }

    /// Whether `user` currently has a request they could undo, factoring
    /// in that a request too far back in a bounded log can no longer be
    /// undone (its original has already been, or is about to be,
    /// garbage-collected). Port of `inf_adopted_algorithm_can_undo`.
    pub fn can_undo(&self, user: P) -> bool {
        self.can_undo_redo(user, true)
    }

    /// See [`Algorithm::can_undo`]; the redo-stack counterpart.
    pub fn can_redo(&self, user: P) -> bool {
        self.can_undo_redo(user, false)
    }

    fn can_undo_redo(&self, user: P, undo: bool) -> bool {
        let Some(log) = self.users.log(user) else { return false };
        let target = if undo { log.next_undo() } else { log.next_redo() };
        let Some(position) = target else { return false };
        // The active/undone stacks track positions, not live entries;
        // GC trims the log without walking them, so the position they
        // name may since have scrolled past `begin()`.
        let Some(request) = log.get(position) else { return false };
        let original = engine::resolve_original(log, request);
        // A `Do` that declined reversibility at execution time has no
        // inverse waiting in the log for an `Undo` to replay.
        if let RequestKind::Do(op) = &original.kind {
            if !op.is_reversible() {
                return false;
            }
        }
        if self.max_total_log_size == 0 {
            return true;
        }
        original.vector.vdiff(&self.current, self.users.ids()) < self.max_total_log_size
    }

    /// Generate and apply a local `Do` request, returning it (stamped
    /// with the issuing state vector, untranslated) for the host to
    /// broadcast to other participants. Port of
    /// `inf_adopted_algorithm_generate_request`.
    pub fn generate_request(&mut self, user: P, op: O) -> AlgorithmResult<Request<P, O>, P> {
        self.generate(user, RequestKind::Do(op), true)
    }

    /// Same as [`Algorithm::generate_request`], but without applying
    /// the operation to the buffer — for a host that already applied
    /// the effect itself (e.g. the user's own text widget already
    /// reflects the edit) and only needs the request logged and
    /// broadcast. Port of `inf_adopted_algorithm_generate_request_noexec`.
    pub fn generate_request_noexec(&mut self, user: P, op: O) -> AlgorithmResult<Request<P, O>, P> {
        self.generate(user, RequestKind::Do(op), false)
    }

    pub fn generate_undo(&mut self, user: P) -> AlgorithmResult<Request<P, O>, P> {
        if !self.can_undo(user) {
            return Err(AlgorithmError::CannotUndo(user));
        }
        self.generate(user, RequestKind::Undo, true)
    }

    pub fn generate_redo(&mut self, user: P) -> AlgorithmResult<Request<P, O>, P> {
        if !self.can_redo(user) {
            return Err(AlgorithmError::CannotRedo(user));
        }
        self.generate(user, RequestKind::Redo, true)
    }

    fn generate(&mut self, user: P, kind: RequestKind<O>, apply: bool) -> AlgorithmResult<Request<P, O>, P> {
        if !self.users.contains(user) {
            return Err(AlgorithmError::UnknownParticipant(user));
        }
        if !self.users.is_local(user) {
            return Err(AlgorithmError::GeneratorNotLocal(user));
        }
        let request = Request { user, vector: self.current.clone(), kind };
        tracing::trace!(?user, "generating local request");
        self.execute_request(request.clone(), apply);
        self.sync_local_vectors();
        self.gc_logs();
        // `current` just advanced, which can move any local participant's
        // `vdiff(original.vector, current)` past `max_total_log_size`, not
        // only the generating user's — mirrors `receive_request` below.
        for id in self.users.local_ids().collect::<Vec<_>>() {
            self.recompute_undo_redo(id);
        }
        Ok(request)
    }

    /// Apply a request received from a remote participant. Requests
    /// that arrive ahead of their causal dependencies are queued and
    /// drained once those dependencies land. Port of
    /// `inf_adopted_algorithm_receive_request`.
    pub fn receive_request(&mut self, request: Request<P, O>) -> AlgorithmResult<(), P> {
        let author = request.user;
        if !self.users.contains(author) {
            return Err(AlgorithmError::UnknownParticipant(author));
        }
        if self.users.is_local(author) {
            return Err(AlgorithmError::RemoteFromLocalUser(author));
        }

        // The remote author's own log will grow by one entry once this
        // request lands; reflect that in their cached vector right
        // away so other reachability checks don't need to special-case
        // in-flight requests. Only move the cached vector forward: a
        // reordered or duplicate delivery for the same issuer must not
        // regress (or redundantly re-bump) a vector that's already
        // moved past it, since later reachability/GC reasoning assumes
        // a known participant's recorded vector only ever grows.
        let recorded = self.users.vector(author).expect("known participant").clone();
        if recorded.causally_before(&request.vector) && recorded != request.vector {
            let mut bumped = request.vector.clone();
            if request.affects_buffer() {
                bumped.add(author, 1);
            }
            self.users.set_vector(author, bumped);
        }

        tracing::debug!(?author, "queuing remote request");
        self.queue.push(request);
        self.drain_queue();
        self.sync_local_vectors();
        self.gc_logs();

        for id in self.users.local_ids().collect::<Vec<_>>() {
            self.recompute_undo_redo(id);
        }
        Ok(())
    }

    fn drain_queue(&mut self) {
        loop {
            let ready = self.queue.iter().position(|r| r.vector.causally_before(&self.current));
            let Some(idx) = ready else { break };
            let request = self.queue.remove(idx);
            self.execute_request(request, true);
        }
    }

    fn execute_request(&mut self, request: Request<P, O>, apply: bool) {
        let author = request.user;

        let log_request = match &request.kind {
            RequestKind::Do(_) => request.clone(),
            RequestKind::Undo | RequestKind::Redo => {
                let log = self.users.log(author).expect("known participant");
                let original = engine::resolve_original(log, &request);
                let mut vector = original.vector.clone();
                vector.set(author, request.vector.get(author));
                Request { user: author, vector, kind: request.kind.clone() }
            }
        };

        // A `Do` whose operation never touches the buffer leaves no
        // trace: nothing to translate, log, apply, or count against the
        // author's position.
        if !log_request.affects_buffer() {
            return;
        }

        let translated = engine::translate_request(&log_request, &self.current, &self.users, &self.current);

        // What gets stored in the author's own log always keeps
        // `log_request`'s vector — the request's own causal basis, not
        // wherever the translation recursion last landed — since future
        // translations recurse from this entry's vector outward and
        // expect its op to be valid at exactly that state (§4.3's "same
        // vector, same user"). An `Undo`/`Redo` is stored as built
        // above unconditionally, so the log's active/undone bookkeeping
        // sees an undo as an undo rather than a fresh `Do`. A `Do`
        // already capable of producing its own inverse (`is_reversible`)
        // is stored unchanged; one that isn't gets exactly one chance,
        // right here before `apply` mutates the buffer, to resolve
        // itself against the translated op's execution-time position —
        // a delete's inverse is the text it's about to remove, only
        // readable right now.
        let stored = match (&log_request.kind, &translated.kind) {
            (RequestKind::Do(log_op), RequestKind::Do(translated_op)) if !log_op.is_reversible() => {
                match log_op.make_reversible(translated_op, &self.buffer) {
                    Some(reversible) => {
                        Request { user: author, vector: log_request.vector.clone(), kind: RequestKind::Do(reversible) }
                    }
                    None => log_request.clone(),
                }
            }
            _ => log_request.clone(),
        };

        // `translate_request` resolves an Undo/Redo down to the forward
        // operation of the original `Do` it ultimately targets (see
        // `engine`'s module doc) — it never inverts. Realizing the
        // *undo* half of that pair is this call site's job: an `Undo`
        // applies the mirror of the translated op, a `Redo` (or a plain
        // `Do`) applies it forward. Because `next_undo`/`next_redo` only
        // ever point at a forward-applier (`Do`/`Redo`) or an `Undo`
        // respectively, this single check is correct no matter how many
        // Undo/Redo hops the resolution chain passed through.
        if apply {
            if let RequestKind::Do(op) = &translated.kind {
                if matches!(request.kind, RequestKind::Undo) {
                    op.mirror().apply(&author, &mut self.buffer);
                } else {
                    op.apply(&author, &mut self.buffer);
                }
            }
        }

        self.users.log_mut(author).expect("known participant").add(stored);
        self.current.add(author, 1);

        tracing::trace!(?author, "applied request");
        self.sink.emit(Event::ApplyRequest { user: author, affects_buffer: true });
    }

    /// Bring every local participant's cached vector up to date with
    /// `current`. Local requests are always generated against the
    /// current state, so after executing one, the author (and every
    /// other local participant, who saw it applied immediately too) has
    /// by definition caught up. Port of
    /// `inf_adopted_algorithm_update_local_user_times`.
    fn sync_local_vectors(&mut self) {
        for id in self.users.local_ids().collect::<Vec<_>>() {
            self.users.set_vector(id, self.current.clone());
        }
    }

    /// Recompute and, if changed, emit `CanUndoChanged`/`CanRedoChanged`
    /// for `user`. Port of `inf_adopted_algorithm_update_undo_redo`.
    fn recompute_undo_redo(&mut self, user: P) {
        let undo = self.can_undo(user);
        if self.undo_state.get(&user).copied() != Some(undo) {
            self.undo_state.insert(user, undo);
            self.sink.emit(Event::CanUndoChanged { user, can_undo: undo });
        }
        let redo = self.can_redo(user);
        if self.redo_state.get(&user).copied() != Some(redo) {
            self.redo_state.insert(user, redo);
            self.sink.emit(Event::CanRedoChanged { user, can_redo: redo });
        }
    }

    /// Trim each oversized participant log by (at most) one group per
    /// call, the way `inf_adopted_algorithm_create_removals`/
    /// `perform_removals` do. A group is the log's single oldest
    /// request together with every `Undo`/`Redo` transitively bound to
    /// it (`RequestLog::upper_related`'s span), and it's only a
    /// *candidate* once every known participant's recorded vector has
    /// moved far enough past it (`min_vdiff > max_total_log_size`,
    /// where a participant who hasn't even caught up to the oldest
    /// request yet contributes 0, which can never exceed the bound and
    /// so always blocks). A candidate is then only actually removed if
    /// no other log still holds, above its own retained prefix, a
    /// request whose own recorded knowledge of `author`'s history
    /// reaches into the group being dropped — such a request might
    /// still need to translate back into it later.
    fn gc_logs(&mut self) {
        if self.max_total_log_size == 0 {
            return;
        }
        let ids: Vec<P> = self.users.ids().collect();
        for &author in &ids {
            let (begin, end) = {
                let log = self.users.log(author).expect("known participant");
                (log.begin(), log.end())
            };
            if end - begin <= self.max_total_log_size {
                continue;
            }

            let first = self.users.log(author).expect("known participant").get(begin).expect("log not empty").clone();

            let min_vdiff = ids
                .iter()
                .map(|&id| {
                    let known = self.users.vector(id).expect("known participant");
                    if first.vector.causally_before(known) {
                        first.vector.vdiff(known, ids.iter().copied())
                    } else {
                        0
                    }
                })
                .min()
                .unwrap_or(0);

            if min_vdiff <= self.max_total_log_size {
                continue;
            }

            let upper = self.users.log(author).expect("known participant").upper_related(begin);
            let upper_component = self.users.log(author).expect("known participant").get(upper).expect("upper_related in range").vector.get(author);

            let blocked = ids.iter().any(|&q| {
                if q == author {
                    return false;
                }
                let qlog = self.users.log(q).expect("known participant");
                let qbegin = qlog.begin();
                (qbegin..qlog.end())
                    .rev()
                    .find(|&pos| qlog.get(pos).expect("in range").vector.get(author) <= upper_component)
                    .is_some_and(|pos| pos > qbegin)
            });

            if blocked {
                tracing::debug!(?author, "GC candidate blocked, leaving log in place this pass");
                continue;
            }

            tracing::debug!(?author, from = begin, to = upper + 1, "trimming request log");
            self.users.log_mut(author).expect("known participant").remove_prefix_upto(upper + 1);
        }
    }
}
