//! Reactor Core
//!
//! A non-blocking socket I/O reactor: a dedicated selector thread
//! multiplexing OS-level readiness, a worker pool that drives the actual
//! reads and writes, and a coordinator that mediates between the two and a
//! single per-channel application extension point.
//!
//! - `selector`: the OS-level readiness multiplexer (`mio::Poll` + thread)
//! - `channel`: a non-blocking socket, its aggressive read/write policy and
//!   its write-backpressure monitor
//! - `coordinator`: mediates selector readiness and channel events into
//!   calls on an [`interpreter::Interpreter`]
//! - `interpreter`: the application-visible extension point
//! - `listener`: the two trait surfaces the above three talk across
//! - `buffer`: pooled read buffers
//! - `worker_pool`: the fixed-size pool that runs channel reads off the
//!   selector thread
//! - `config`: tunables for channels and the selector
//! - `error`: error types

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod buffer;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod interest;
pub mod interpreter;
pub mod listener;
pub mod selector;
pub mod worker_pool;

pub mod prelude {
    pub use crate::buffer::{Buffer, BufferPool};
    pub use crate::channel::Channel;
    pub use crate::config::{ChannelConfig, SelectorConfig};
    pub use crate::coordinator::Coordinator;
    pub use crate::error::{CoreError, Result};
    pub use crate::interest::Interest;
    pub use crate::interpreter::{Interpreter, InterpreterFactory};
    pub use crate::listener::{ChannelEvents, Listener};
    pub use crate::selector::Selector;
    pub use crate::worker_pool::{WorkerHandle, WorkerPool};
}
