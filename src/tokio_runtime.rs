//! Global Tokio runtime
//!
//! Device sessions run on the blocking pool, so the runtime is small: two
//! workers for the async facade and a handful of blocking threads, enough for a
//! concurrent playback, recording and mixer call.

use std::future::Future;
use std::io;
use std::sync::OnceLock;

use tokio::runtime::Runtime;

const WORKER_THREADS: usize = 2;
const MAX_BLOCKING_THREADS: usize = 4;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialize the global Tokio runtime. Call this during startup.
pub fn init() -> io::Result<&'static Runtime> {
    if let Some(runtime) = TOKIO_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .max_blocking_threads(MAX_BLOCKING_THREADS)
        .thread_name("sound-device")
        .enable_all()
        .build()?;
    // a runtime built by a racing caller is dropped here
    let _ = TOKIO_RUNTIME.set(runtime);
    TOKIO_RUNTIME
        .get()
        .ok_or_else(|| io::Error::other("Tokio runtime unavailable"))
}

/// Run `future` to completion on the global runtime
pub fn block_on<F: Future>(future: F) -> io::Result<F::Output> {
    Ok(init()?.block_on(future))
}
