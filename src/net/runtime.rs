//! Dedicated I/O worker pool of the engine.
//!
//! Network I/O runs on its own multi-threaded tokio runtime so callers on any
//! runtime (or several) only ever await a completion signal and never lend
//! their own worker threads to the engine.
//!
//! The pool is process-scoped. [`IoRuntime::shutdown`] is the explicit teardown
//! hook: it cancels every in-flight request and releases the worker threads.
//! Dropping the last reference shuts down as well.

use std::future::Future;
use std::sync::Mutex;

use log::debug;
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::errors::FetchError;

pub struct IoRuntime {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    /// Parent of every per-request token; cancelled on shutdown
    shutdown: CancellationToken,
}

impl IoRuntime {
    pub fn new(worker_threads: usize) -> Result<Self, FetchError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("http-input-io")
            .enable_all()
            .build()
            .map_err(|e| FetchError::ClientConstruction(format!("cannot start I/O workers: {e}")))?;

        debug!("I/O runtime started with {worker_threads} worker thread(s)");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token for one request, cancelled together with the runtime.
    pub(crate) fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // A task spawned after the runtime went away is dropped unpolled. Its
        // callback is dropped with it, which the bridge reports as a cancellation.
        drop(self.handle.spawn(fut));
    }

    /// Cancels all in-flight requests and stops the worker threads.
    ///
    /// Safe to call from inside an async context and more than once.
    pub fn shutdown(&self) {
        self.shutdown.cancel();

        let runtime = match self.runtime.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(runtime) = runtime {
            debug!("shutting down I/O runtime");
            runtime.shutdown_background();
        }
    }
}

impl Drop for IoRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for IoRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoRuntime")
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
