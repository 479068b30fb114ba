//! The OS-level readiness multiplexer: a dedicated thread driving one
//! `mio::Poll`, fed by a task queue so every registration mutation is
//! serialized through one place.
//!
//! No teacher module owns a raw selector directly (`compio` hides its
//! io_uring submission queue inside the runtime), so this is grounded
//! instead on the teacher's own `flume`-everywhere idiom for the task queue
//! (`monitor.rs`'s sender/receiver pair) plus `mio`, the crate the wider
//! example pack reaches for to do exactly this job.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::channel::Channel;
use crate::interest::Interest;
use crate::listener::Listener;

/// Reserved for the internal wakeup registration; real channel tokens are
/// handed out starting at 0 and never reach this value in practice.
const WAKE_TOKEN: mio::Token = mio::Token(usize::MAX);

enum Task {
    Register {
        channel: Channel,
        listener: Weak<dyn Listener>,
    },
    Update {
        token: mio::Token,
        ops: Interest,
        add: bool,
    },
    Unregister(mio::Token),
    Close,
}

struct Registration {
    channel: Channel,
    listener: Weak<dyn Listener>,
    interest: Interest,
    /// Whether this registration currently holds a live `mio` registration.
    /// `mio::Interest` cannot represent the empty set, so a channel with no
    /// current interest is tracked here but not actually registered with
    /// the OS poller until it asks for READ or WRITE again.
    mio_registered: bool,
}

/// Registrations, owned conceptually by the selector thread: in practice
/// the only other path that touches this mutex is the inline-update
/// fast path below, which only ever runs while already executing on the
/// selector thread, so the lock is never contended.
struct SelectorState {
    registrations: HashMap<mio::Token, Registration>,
}

struct SelectorShared {
    tx: Sender<Task>,
    waker: mio::Waker,
    registry: mio::Registry,
    state: Mutex<SelectorState>,
    next_token: AtomicUsize,
    thread_id: OnceLock<std::thread::ThreadId>,
    closed: AtomicBool,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

/// A handle to the selector thread. Cheap to clone; every [`crate::channel::Channel`]
/// holds one.
#[derive(Clone)]
pub struct Selector {
    inner: Arc<SelectorShared>,
}

impl Selector {
    /// Start the selector thread.
    pub fn start() -> io::Result<Self> {
        let poll = mio::Poll::new()?;
        let waker = mio::Waker::new(poll.registry(), WAKE_TOKEN)?;
        let registry = poll.registry().try_clone()?;
        let (tx, rx) = flume::unbounded();

        let shared = Arc::new(SelectorShared {
            tx,
            waker,
            registry,
            state: Mutex::new(SelectorState {
                registrations: HashMap::new(),
            }),
            next_token: AtomicUsize::new(0),
            thread_id: OnceLock::new(),
            closed: AtomicBool::new(false),
            join_handle: Mutex::new(None),
        });

        let loop_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("reactor-selector".to_string())
            .spawn(move || run_loop(poll, rx, loop_shared))?;
        // Set before publishing `shared` to any caller, so `is_selector_thread`
        // is always correct once `Selector::start` returns.
        let _ = shared.thread_id.set(handle.thread().id());
        *shared.join_handle.lock() = Some(handle);

        Ok(Self { inner: shared })
    }

    /// Allocate the next channel token. Channels need their token before
    /// they can be registered, since `update` is addressed by token.
    pub(crate) fn next_token(&self) -> mio::Token {
        mio::Token(self.inner.next_token.fetch_add(1, Ordering::Relaxed))
    }

    fn is_selector_thread(&self) -> bool {
        self.inner.thread_id.get() == Some(&std::thread::current().id())
    }

    fn post(&self, task: Task) {
        if self.inner.tx.send(task).is_ok() {
            let _ = self.inner.waker.wake();
        }
    }

    /// Register `channel` with the selector, using `listener` for readiness
    /// callbacks. If `channel` is already closed the registration is
    /// dropped and logged rather than failing the caller synchronously
    /// (registration is asynchronous by nature).
    pub fn register(&self, channel: Channel, listener: Weak<dyn Listener>) {
        self.post(Task::Register { channel, listener });
    }

    /// Add or remove interest bits for `token`. Applied inline, with no
    /// queueing, when called from the selector thread itself — e.g. from
    /// within a `Listener::open` callback.
    pub fn update(&self, token: mio::Token, ops: Interest, add: bool) {
        if self.is_selector_thread() {
            let mut state = self.inner.state.lock();
            apply_update(&self.inner.registry, &mut state, token, ops, add);
        } else {
            self.post(Task::Update { token, ops, add });
        }
    }

    /// Drop `token`'s registration. Posted unconditionally; a token that is
    /// no longer registered is simply ignored when the task runs.
    pub(crate) fn unregister(&self, token: mio::Token) {
        self.post(Task::Unregister(token));
    }

    /// Wake the selector thread out of a blocking `poll` with no other
    /// task pending. Idempotent.
    pub fn wakeup(&self) {
        let _ = self.inner.waker.wake();
    }

    /// Shut the selector down: every live registration's listener gets one
    /// final `close()`, then the thread exits. Does not block; call
    /// [`Selector::join`] to wait for the thread to actually stop.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.post(Task::Close);
        }
    }

    /// Block until the selector thread exits, or `timeout` elapses.
    /// Returns `true` if the thread exited.
    pub fn join(&self, timeout: Duration) -> bool {
        let Some(handle) = self.inner.join_handle.lock().take() else {
            return true;
        };
        // `JoinHandle::join` has no timed variant; poll `is_finished`
        // instead, since selector shutdown is expected to be fast and we'd
        // rather not block test teardown indefinitely on a stuck thread.
        let deadline = std::time::Instant::now() + timeout;
        while !handle.is_finished() {
            if std::time::Instant::now() >= deadline {
                *self.inner.join_handle.lock() = Some(handle);
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        let _ = handle.join();
        true
    }
}

fn apply_update(
    registry: &mio::Registry,
    state: &mut SelectorState,
    token: mio::Token,
    ops: Interest,
    add: bool,
) {
    let Some(reg) = state.registrations.get_mut(&token) else {
        return;
    };
    let new_interest = reg.interest.apply(ops, add);
    reg.interest = new_interest;

    match (new_interest.to_mio(), reg.mio_registered) {
        (Some(mio_interest), true) => {
            if let Err(e) = reg.channel.mio_reregister(registry, mio_interest) {
                warn!(?token, error = %e, "reregister failed");
            }
        }
        (Some(mio_interest), false) => {
            if let Err(e) = reg.channel.mio_register(registry, mio_interest) {
                warn!(?token, error = %e, "register failed");
            } else {
                reg.mio_registered = true;
            }
        }
        (None, true) => {
            if let Err(e) = reg.channel.mio_deregister(registry) {
                warn!(?token, error = %e, "deregister failed");
            }
            reg.mio_registered = false;
        }
        (None, false) => {}
    }
}

fn run_loop(mut poll: mio::Poll, rx: Receiver<Task>, shared: Arc<SelectorShared>) {
    let mut events = mio::Events::with_capacity(1024);
    debug!("selector thread started");

    'outer: loop {
        // Listener callbacks (`open`/`close`) can call back into `update`,
        // which takes this same `state` lock on the inline fast path since
        // we're on the selector thread. `parking_lot::Mutex` isn't
        // reentrant, so every listener call below is collected here and
        // invoked only after the lock is dropped.
        let mut opened: Vec<Weak<dyn Listener>> = Vec::new();
        let mut closing: Option<Vec<Weak<dyn Listener>>> = None;
        {
            let mut state = shared.state.lock();
            while let Ok(task) = rx.try_recv() {
                match task {
                    Task::Register { channel, listener } => {
                        if channel.is_closed() {
                            warn!(token = ?channel.token(), "register on already-closed channel, dropped");
                            continue;
                        }
                        let token = channel.token();
                        state.registrations.insert(
                            token,
                            Registration {
                                channel,
                                listener: listener.clone(),
                                interest: Interest::NONE,
                                mio_registered: false,
                            },
                        );
                        opened.push(listener);
                    }
                    Task::Update { token, ops, add } => {
                        apply_update(&shared.registry, &mut state, token, ops, add);
                    }
                    Task::Unregister(token) => {
                        if let Some(reg) = state.registrations.remove(&token) {
                            if reg.mio_registered {
                                let _ = reg.channel.mio_deregister(&shared.registry);
                            }
                        }
                    }
                    Task::Close => {
                        let listeners = state
                            .registrations
                            .drain()
                            .map(|(_, reg)| {
                                if reg.mio_registered {
                                    let _ = reg.channel.mio_deregister(&shared.registry);
                                }
                                reg.listener
                            })
                            .collect();
                        closing = Some(listeners);
                        break;
                    }
                }
            }
        }

        for listener in opened {
            if let Some(l) = listener.upgrade() {
                l.open();
            }
        }

        if let Some(listeners) = closing {
            for listener in listeners {
                if let Some(l) = listener.upgrade() {
                    l.close();
                }
            }
            debug!("selector thread stopping");
            break 'outer;
        }

        match poll.poll(&mut events, None) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!(error = %e, "selector poll failed, shutting down");
                let listeners: Vec<Weak<dyn Listener>> = {
                    let mut state = shared.state.lock();
                    state.registrations.drain().map(|(_, reg)| reg.listener).collect()
                };
                for listener in listeners {
                    if let Some(l) = listener.upgrade() {
                        l.close();
                    }
                }
                break;
            }
        }

        let dispatch: Vec<(Weak<dyn Listener>, bool, bool)> = {
            let state = shared.state.lock();
            events
                .iter()
                .filter(|event| event.token() != WAKE_TOKEN)
                .filter_map(|event| {
                    let reg = state.registrations.get(&event.token())?;
                    Some((reg.listener.clone(), event.is_readable(), event.is_writable()))
                })
                .collect()
        };
        for (listener, readable, writable) in dispatch {
            let Some(listener) = listener.upgrade() else {
                continue;
            };
            if readable {
                listener.read_ready();
            } else if writable {
                listener.write_ready();
            }
        }
    }
}
