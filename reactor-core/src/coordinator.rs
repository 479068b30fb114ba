//! Mediates between the selector's readiness callbacks and a channel's
//! application-visible [`Interpreter`](crate::interpreter::Interpreter).
//!
//! Grounded on `actor.rs`'s event/command translation — there, a
//! `SocketActor` turns compio completions into `SocketEvent`s for a
//! consumer task; here the coordinator turns `mio` readiness into direct
//! calls on a single interpreter, since the core dispatches synchronously
//! rather than through another queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::channel::Channel;
use crate::config::ChannelConfig;
use crate::interest::Interest;
use crate::interpreter::{Interpreter, InterpreterFactory};
use crate::listener::{ChannelEvents, Listener};
use crate::worker_pool::WorkerHandle;

/// Owns a [`Channel`] and the [`Interpreter`] bound to it, and implements
/// both trait surfaces that sit between them and the selector.
pub struct Coordinator {
    channel: Channel,
    interpreter: Box<dyn Interpreter>,
    workers: WorkerHandle,
    config: ChannelConfig,
    close_delivered: AtomicBool,
}

impl Coordinator {
    /// Build a coordinator for `channel`, asking `factory` for the
    /// interpreter to bind to it, and register it with the selector that
    /// owns `channel`. The channel is bound to this coordinator's event
    /// callbacks as part of construction.
    #[must_use]
    pub fn spawn(
        channel: Channel,
        factory: &dyn InterpreterFactory,
        workers: WorkerHandle,
        config: ChannelConfig,
    ) -> std::result::Result<Arc<Self>, crate::error::CoreError> {
        let interpreter = factory.new_interpreter(&channel);
        let coordinator = Arc::new(Self {
            channel: channel.clone(),
            interpreter,
            workers,
            config,
            close_delivered: AtomicBool::new(false),
        });
        channel.bind_events(Arc::downgrade(&coordinator) as Weak<dyn ChannelEvents>);
        channel.register(Arc::downgrade(&coordinator) as Weak<dyn Listener>)?;
        Ok(coordinator)
    }

    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    fn deliver_close_once(&self) {
        if !self.close_delivered.swap(true, Ordering::SeqCst) {
            self.interpreter.on_close();
        }
    }
}

impl Listener for Coordinator {
    fn open(&self) {
        trace!(token = ?self.channel.token(), "channel opened");
        let _ = self.channel.update(Interest::READ, true);
    }

    fn read_ready(&self) {
        // Clear READ before dispatching so readiness can't queue a second
        // concurrent read task for this channel before the first finishes.
        // Routed through `needs_read` (not a direct `channel.update`) so
        // every disable/re-arm of READ interest is observable the same way.
        self.needs_read(false);
        let channel = self.channel.clone();
        let buf_size = self.config.default_buffer_size();
        self.workers.submit(move || {
            let _ = channel.read(buf_size);
        });
    }

    fn write_ready(&self) {
        let _ = self.channel.update(Interest::WRITE, false);
        self.channel.writer_ready();
    }

    fn close(&self) {
        self.deliver_close_once();
    }
}

impl ChannelEvents for Coordinator {
    fn on_read(&self, data: &[u8]) {
        self.interpreter.on_read(data);
        // Resolved design decision: the coordinator re-arms READ right
        // after dispatch, rather than leaving re-arming to the interpreter.
        // Routed through `needs_read` for the same reason as `read_ready`.
        self.needs_read(true);
    }

    fn on_close(&self) {
        self.deliver_close_once();
    }

    fn needs_read(&self, want: bool) {
        let _ = self.channel.update(Interest::READ, want);
    }

    fn needs_write(&self, want: bool) {
        let _ = self.channel.update(Interest::WRITE, want);
    }
}
