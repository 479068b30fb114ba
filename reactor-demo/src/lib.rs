//! Reactor Demo
//!
//! Demo binaries exercising `reactor-core`'s selector, channel and
//! coordinator against real loopback TCP sockets. See `src/bin/echo_server.rs`
//! for a minimal connector: it accepts connections, registers each with the
//! selector, and wires a line-echoing interpreter to it.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

/// Development helpers (benches/tests)
pub mod dev_tracing;
