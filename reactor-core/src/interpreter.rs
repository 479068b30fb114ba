//! The application-visible extension point.
//!
//! Shaped like the teacher's `SocketEvent` consumer in `actor.rs`, but as a
//! plain trait rather than a channel receiver: the core calls straight into
//! it from the worker thread that did the read, instead of publishing an
//! event for some other task to poll.

/// Receives data and end-of-stream notifications for a single channel.
///
/// One interpreter instance is bound to exactly one channel for that
/// channel's whole lifetime. `on_read` is never called concurrently with
/// itself or with `on_close` for the same channel (the coordinator's "at
/// most one outstanding read per channel" invariant guarantees this).
pub trait Interpreter: Send + Sync {
    /// Bytes became available. `data` borrows a buffer owned by the
    /// channel's read call and is valid only for the duration of this call —
    /// copy anything that needs to outlive it.
    fn on_read(&self, data: &[u8]);

    /// End-of-stream. Delivered at most once per channel, even if both a
    /// clean EOF and a selector shutdown race to close it.
    fn on_close(&self);
}

/// Creates one [`Interpreter`] per accepted or connected channel.
///
/// Invoked once per channel, on whichever thread performs the accept or
/// connect — never on the selector thread. Receives the channel itself
/// (rather than the coordinator, which doesn't exist yet at this point in
/// construction) so interpreters that need to write back, like an echo
/// handler, can hold onto a clone of it.
pub trait InterpreterFactory: Send + Sync {
    fn new_interpreter(&self, channel: &crate::channel::Channel) -> Box<dyn Interpreter>;
}

impl<F> InterpreterFactory for F
where
    F: Fn(&crate::channel::Channel) -> Box<dyn Interpreter> + Send + Sync,
{
    fn new_interpreter(&self, channel: &crate::channel::Channel) -> Box<dyn Interpreter> {
        self(channel)
    }
}
