//! A minimal TCP echo connector built on `reactor-core`.
//!
//! This is the out-of-scope "server scaffolding" `spec.md` §1 explicitly
//! leaves to connectors: a blocking accept loop handing each connection to
//! the reactor, and a trivial `Interpreter` that writes back whatever it
//! reads.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use mio::net::TcpStream as MioTcpStream;
use parking_lot::Mutex;
use reactor_core::buffer::BufferPool;
use reactor_core::channel::Channel;
use reactor_core::config::{ChannelConfig, SelectorConfig};
use reactor_core::coordinator::Coordinator;
use reactor_core::interpreter::{Interpreter, InterpreterFactory};
use reactor_core::selector::Selector;
use reactor_core::worker_pool::WorkerPool;
use tracing::info;

struct EchoInterpreter {
    channel: Channel,
}

impl Interpreter for EchoInterpreter {
    fn on_read(&self, data: &[u8]) {
        // Best-effort echo: a write failure just means the channel is on
        // its way down; the coordinator will deliver `on_close` separately.
        let _ = self.channel.write(data);
    }

    fn on_close(&self) {
        info!(peer = ?self.channel.peer_addr(), "connection closed");
    }
}

struct EchoFactory;

impl InterpreterFactory for EchoFactory {
    fn new_interpreter(&self, channel: &Channel) -> Box<dyn Interpreter> {
        Box::new(EchoInterpreter {
            channel: channel.clone(),
        })
    }
}

fn main() -> std::io::Result<()> {
    reactor_demo::dev_tracing::init_tracing();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7878".to_string());

    let listener = StdTcpListener::bind(&addr)?;
    info!(%addr, "echo server listening");

    let selector = Selector::start()?;
    let selector_config = SelectorConfig::default();
    let workers = Arc::new(WorkerPool::new(selector_config.worker_threads()));
    let worker_handle = workers.handle();
    let pool = BufferPool::default();
    let channel_config = ChannelConfig::default();
    let factory = EchoFactory;

    // Coordinators are held alive only through the `Weak` references the
    // channel and selector keep; something has to own the strong `Arc` for
    // as long as the connection is live. A demo connector is free to never
    // clean this up — connections simply accumulate until the process
    // exits.
    let connections: Arc<Mutex<Vec<Arc<Coordinator>>>> = Arc::new(Mutex::new(Vec::new()));

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        stream.set_nonblocking(true)?;
        let peer = stream.peer_addr().ok();
        let mio_stream = MioTcpStream::from_std(stream);

        let channel = Channel::new(selector.clone(), mio_stream, pool.clone(), channel_config);
        let _ = channel.set_nodelay(true);

        match Coordinator::spawn(channel, &factory, worker_handle.clone(), channel_config) {
            Ok(coordinator) => {
                info!(?peer, "accepted connection");
                connections.lock().push(coordinator);
            }
            Err(e) => tracing::warn!(?peer, error = %e, "failed to register channel"),
        }
    }

    Ok(())
}
