//! The two small trait surfaces that sit between the selector, the channel
//! and the coordinator. Both are implemented by [`crate::coordinator::Coordinator`];
//! splitting them in two keeps the selector module from needing to know
//! anything about channel internals, and vice versa.

/// The selector-facing half: what a registration's owner is told about
/// readiness and lifecycle. Held by the selector only as a `Weak` reference
/// (the registration owns no strong reference to its listener), so the
/// owning coordinator's lifetime is controlled entirely by whoever holds it.
pub trait Listener: Send + Sync {
    /// The registration succeeded. Called once, before any `read_ready` or
    /// `write_ready` for this registration.
    fn open(&self);

    /// The channel became readable.
    fn read_ready(&self);

    /// The channel became writable.
    fn write_ready(&self);

    /// The registration was torn down (selector shutdown, or explicit
    /// unregister). Idempotent from the listener's point of view — it must
    /// tolerate being called even if the channel already closed itself via
    /// [`crate::channel::ChannelEvents::on_close`].
    fn close(&self);
}

/// The channel-facing half: what a channel tells its coordinator about I/O
/// outcomes and interest-set needs. Held by the channel only as a `Weak`
/// reference, mirroring [`Listener`]'s ownership rule.
pub trait ChannelEvents: Send + Sync {
    /// Bytes were read. Borrowed; valid only for the duration of the call.
    fn on_read(&self, data: &[u8]);

    /// End-of-stream was detected on the channel.
    fn on_close(&self);

    /// The channel wants (`true`) or no longer wants (`false`) READ
    /// readiness notifications.
    fn needs_read(&self, want: bool);

    /// The channel wants (`true`) or no longer wants (`false`) WRITE
    /// readiness notifications.
    fn needs_write(&self, want: bool);
}
