//! Threaded host for one session: backend calls run on workers, outcomes
//! queue up until the front end drains them.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use backend_channel::{BackendChannel, BackendError, BackendRequest, Generation, RawReply};

use crate::apply::{ApplyError, ApplyReport};
use crate::events::CoreEvent;
use crate::render::render_session;
use crate::session::{RequestDispatcher, Session, SessionError, SubmitOutcome};
use crate::surface::{lock_unpoisoned, EditingSurface};

#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome {
    Replied {
        generation: Generation,
        reply: RawReply,
    },
    Failed {
        generation: Generation,
        error: BackendError,
    },
}

impl BackendOutcome {
    #[must_use]
    pub fn generation(&self) -> Generation {
        match self {
            Self::Replied { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }
}

type WakeFn = Box<dyn Fn() + Send + Sync>;

/// Runs backend calls on worker threads and feeds their outcomes back into
/// one [`Session`] in arrival order.
///
/// Outcomes are buffered until [`SessionRuntime::drain_pending_events`] is
/// called. The optional wake callback fires whenever the buffer goes from
/// empty to non-empty, so a front end can schedule a drain on its own thread.
pub struct SessionRuntime {
    session: Mutex<Session>,
    backend: Arc<dyn BackendChannel>,
    surface: Arc<dyn EditingSurface>,
    pending_outcomes: Mutex<VecDeque<BackendOutcome>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    wake: Option<WakeFn>,
}

impl SessionRuntime {
    pub fn new(
        session: Session,
        backend: Arc<dyn BackendChannel>,
        surface: Arc<dyn EditingSurface>,
    ) -> Arc<Self> {
        Self::build(session, backend, surface, None)
    }

    pub fn with_wake(
        session: Session,
        backend: Arc<dyn BackendChannel>,
        surface: Arc<dyn EditingSurface>,
        wake: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::build(session, backend, surface, Some(Box::new(wake)))
    }

    fn build(
        session: Session,
        backend: Arc<dyn BackendChannel>,
        surface: Arc<dyn EditingSurface>,
        wake: Option<WakeFn>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(session),
            backend,
            surface,
            pending_outcomes: Mutex::new(VecDeque::new()),
            workers: Mutex::new(Vec::new()),
            wake,
        })
    }

    pub fn backend(&self) -> &Arc<dyn BackendChannel> {
        &self.backend
    }

    pub fn surface(&self) -> &Arc<dyn EditingSurface> {
        &self.surface
    }

    /// Runs `f` against the session under its lock.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = lock_unpoisoned(&self.session);
        f(&mut session)
    }

    pub fn submit(self: &Arc<Self>, text: &str, emit: &mut dyn FnMut(CoreEvent)) -> SubmitOutcome {
        let mut dispatcher = WorkerDispatcher {
            runtime: Arc::clone(self),
        };
        let mut session = lock_unpoisoned(&self.session);
        session.submit(text, self.surface.as_ref(), &mut dispatcher, emit)
    }

    pub fn clear(&self) {
        lock_unpoisoned(&self.session).clear();
    }

    pub fn set_model(&self, model: &str) -> Result<(), SessionError> {
        lock_unpoisoned(&self.session).set_model(model)
    }

    pub fn apply_turn(
        &self,
        turn: usize,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> Result<ApplyReport, ApplyError> {
        lock_unpoisoned(&self.session).apply_turn(turn, self.surface.as_ref(), emit)
    }

    pub fn apply_latest(&self, emit: &mut dyn FnMut(CoreEvent)) -> Result<ApplyReport, ApplyError> {
        lock_unpoisoned(&self.session).apply_latest(self.surface.as_ref(), emit)
    }

    #[must_use]
    pub fn render(&self) -> Vec<String> {
        render_session(&lock_unpoisoned(&self.session))
    }

    #[must_use]
    pub fn pending_outcome_count(&self) -> usize {
        lock_unpoisoned(&self.pending_outcomes).len()
    }

    /// Applies every buffered outcome to the session, oldest first.
    ///
    /// Returns how many outcomes were taken off the queue, stale ones
    /// included.
    pub fn drain_pending_events(&self, emit: &mut dyn FnMut(CoreEvent)) -> usize {
        let mut drained = 0usize;

        loop {
            let outcome = lock_unpoisoned(&self.pending_outcomes).pop_front();
            let Some(outcome) = outcome else {
                break;
            };

            let mut session = lock_unpoisoned(&self.session);
            match outcome {
                BackendOutcome::Replied { generation, reply } => {
                    session.on_backend_reply(generation, &reply, self.surface.as_ref(), emit);
                }
                BackendOutcome::Failed { generation, error } => {
                    session.on_backend_failure(generation, &error.to_string(), emit);
                }
            }
            drained += 1;
        }

        self.reap_finished_workers();
        drained
    }

    /// Blocks until every worker spawned so far has finished.
    pub fn wait_for_workers(&self) {
        let workers = std::mem::take(&mut *lock_unpoisoned(&self.workers));
        for worker in workers {
            let _ = worker.join();
        }
    }

    fn spawn_worker(
        self: &Arc<Self>,
        generation: Generation,
        request: BackendRequest,
    ) -> Result<(), String> {
        let runtime = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("patchwise-request-{generation}"))
            .spawn(move || runtime.run_worker(generation, request))
            .map_err(|error| format!("failed to spawn request worker: {error}"))?;

        lock_unpoisoned(&self.workers).push(handle);
        Ok(())
    }

    fn run_worker(&self, generation: Generation, request: BackendRequest) {
        let backend = Arc::clone(&self.backend);
        let result = catch_unwind(AssertUnwindSafe(move || backend.send(request)));

        let outcome = match result {
            Ok(Ok(reply)) => BackendOutcome::Replied { generation, reply },
            Ok(Err(error)) => BackendOutcome::Failed { generation, error },
            Err(_) => BackendOutcome::Failed {
                generation,
                error: BackendError::transport("backend panicked while handling the request"),
            },
        };

        self.enqueue_outcome(outcome);
    }

    fn enqueue_outcome(&self, outcome: BackendOutcome) {
        let should_wake = {
            let mut queue = lock_unpoisoned(&self.pending_outcomes);
            let should_wake = queue.is_empty();
            queue.push_back(outcome);
            should_wake
        };

        if should_wake {
            if let Some(wake) = &self.wake {
                wake();
            }
        }
    }

    fn reap_finished_workers(&self) {
        let mut workers = lock_unpoisoned(&self.workers);
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut *workers)
            .into_iter()
            .partition(|worker| worker.is_finished());
        *workers = running;
        drop(workers);

        for worker in finished {
            let _ = worker.join();
        }
    }
}

struct WorkerDispatcher {
    runtime: Arc<SessionRuntime>,
}

impl RequestDispatcher for WorkerDispatcher {
    fn dispatch(&mut self, generation: Generation, request: BackendRequest) -> Result<(), String> {
        self.runtime.spawn_worker(generation, request)
    }
}
