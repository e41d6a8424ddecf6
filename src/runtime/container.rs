use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::constants::ERR_ACTOR_CHANNEL;
use crate::error::{GatewayError, Result};
use crate::utils::panic_message;

type ExecFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;
type InterruptFn = Box<dyn FnOnce(Option<&GatewayError>) + Send>;
type CloseFn = Box<dyn FnOnce() + Send>;

/// A long-lived unit of work.
///
/// - `exec` runs until the actor is done or closed
/// - `interrupt` is told how `exec` finished
/// - `close` asks a running `exec` to return and must not block
pub struct RuntimeActor {
    name: String,
    exec: ExecFn,
    interrupt: InterruptFn,
    close: CloseFn,
}

impl RuntimeActor {
    pub fn new<E, Fut, I, C>(name: impl Into<String>, exec: E, interrupt: I, close: C) -> Self
    where
        E: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        I: FnOnce(Option<&GatewayError>) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        Self {
            name: name.into(),
            exec: Box::new(move || exec().boxed()),
            interrupt: Box::new(interrupt),
            close: Box::new(close),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for RuntimeActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeActor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a registered actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Registered without start; `run` skips it
    Registered,
    /// Waiting for the next `run`
    Pending,
    /// `exec` is in flight
    Running,
    /// `exec` returned, or the actor was never started
    Stopped,
}

struct Slot {
    name: String,
    state: ActorState,
    exec: Option<ExecFn>,
    interrupt: Option<InterruptFn>,
    close: Option<CloseFn>,
}

/// Ordered actor registry.
///
/// Ids increase with registration order. `run` starts pending actors in id
/// order and waits for all of them; `stop` closes running actors in reverse id
/// order. Each actor's `interrupt` and `close` are invoked at most once.
#[derive(Default)]
pub struct RuntimeContainer {
    actors: Mutex<BTreeMap<u32, Slot>>,
    next_id: AtomicU32,
}

impl RuntimeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `actor`. With `start` it runs on the next call to [`run`](Self::run).
    pub fn add(&self, actor: RuntimeActor, start: bool) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let state = if start {
            ActorState::Pending
        } else {
            ActorState::Registered
        };
        debug!(id, name = %actor.name, ?state, "Actor registered");

        self.lock().insert(
            id,
            Slot {
                name: actor.name,
                state,
                exec: Some(actor.exec),
                interrupt: Some(actor.interrupt),
                close: Some(actor.close),
            },
        );
        id
    }

    pub fn state(&self, id: u32) -> Option<ActorState> {
        self.lock().get(&id).map(|s| s.state)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u32, Slot>> {
        self.actors.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start every pending actor and wait for all of them to finish.
    ///
    /// Each actor's `interrupt` runs as soon as its `exec` returns, in completion
    /// order. Returns the first error reported, if any.
    pub async fn run(&self) -> Result<()> {
        let started: Vec<(u32, String, ExecFn)> = {
            let mut actors = self.lock();
            actors
                .iter_mut()
                .filter(|(_, slot)| slot.state == ActorState::Pending)
                .filter_map(|(id, slot)| {
                    let exec = slot.exec.take()?;
                    slot.state = ActorState::Running;
                    Some((*id, slot.name.clone(), exec))
                })
                .collect()
        };

        if started.is_empty() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(u32, Result<()>)>();
        let count = started.len();
        for (id, name, exec) in started {
            info!(id, %name, "Starting actor");
            let tx = tx.clone();
            tokio::spawn(async move {
                let res = AssertUnwindSafe(async move { exec().await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(GatewayError::ActorPanicked(id, panic_message(panic.as_ref())))
                    });
                let _ = tx.send((id, res));
            });
        }
        drop(tx);

        let mut first_err = None;
        for _ in 0..count {
            let (id, res) = rx
                .recv()
                .await
                .ok_or(GatewayError::RuntimeError(ERR_ACTOR_CHANNEL))?;

            let (name, interrupt) = {
                let mut actors = self.lock();
                match actors.get_mut(&id) {
                    Some(slot) => {
                        slot.state = ActorState::Stopped;
                        (slot.name.clone(), slot.interrupt.take())
                    }
                    None => (String::new(), None),
                }
            };

            match &res {
                Ok(()) => info!(id, %name, "Actor finished"),
                Err(e) => error!(id, %name, error = %e, "Actor failed"),
            }
            if let Some(interrupt) = interrupt {
                interrupt(res.as_ref().err());
            }

            if let Err(e) = res {
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Close every running actor, most recently registered first.
    pub fn stop(&self) {
        let closers: Vec<(u32, String, CloseFn)> = {
            let mut actors = self.lock();
            actors
                .iter_mut()
                .rev()
                .filter(|(_, slot)| slot.state == ActorState::Running)
                .filter_map(|(id, slot)| Some((*id, slot.name.clone(), slot.close.take()?)))
                .collect()
        };

        for (id, name, close) in closers {
            debug!(id, %name, "Closing actor");
            close();
        }
    }
}
