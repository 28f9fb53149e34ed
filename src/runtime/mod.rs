//! Connection-oriented runtime for the echo protocol.
//!
//! One dispatcher thread per worker, no locks: each worker owns its own
//! mio poll, connection slab, and session table, and SO_REUSEPORT pins a
//! connection to the worker that accepted it for the connection's whole
//! life. Within a worker the pieces are:
//! - `FrameReader`: per-connection accumulator turning stream bytes into
//!   complete frames
//! - `SessionTable`: connection id → authenticated credentials
//! - `process_frame`: frame dispatch (login, echo)
//! - `event_loop`: accept/read/write readiness handling

mod connection;
mod dispatch;
mod event_loop;
mod session;

pub(crate) use connection::Connection;
pub(crate) use dispatch::process_frame;
pub(crate) use session::SessionTable;

use crate::config::Config;
use std::io;
use std::net::SocketAddr;
use std::thread;
use tracing::{error, info};

/// Run the server until the process is terminated.
///
/// Spawns one worker thread per configured worker; `workers = 0` means one
/// per CPU core, absent means a single worker.
pub fn run(config: Config) -> io::Result<()> {
    let num_workers = match config.workers {
        None => 1,
        Some(0) => num_cpus(),
        Some(n) => n,
    };

    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    info!(workers = num_workers, addr = %addr, "Starting runtime");

    let mut handles = Vec::with_capacity(num_workers);

    for worker_id in 0..num_workers {
        let config = config.clone();

        let handle = thread::Builder::new()
            .name(format!("worker-{worker_id}"))
            .spawn(move || {
                if let Err(e) = event_loop::worker_loop(worker_id, addr, &config) {
                    error!(worker = worker_id, error = %e, "Worker failed");
                }
            })?;

        handles.push(handle);
    }

    // Wait for all workers
    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
