//! Pooled async HTTP engine with a callback completion protocol.
//!
//! [`AsyncEngine::execute`] submits a [`RequestDescriptor`] and returns at once
//! with an [`InFlight`] handle. The outcome is delivered later, from an engine
//! worker thread, to exactly one of the [`FutureCallback`] methods:
//!
//! - `completed` with the buffered [`Response`],
//! - `failed` with the network, protocol, timeout or size error,
//! - `cancelled` when the request was cancelled through its handle, when the
//!   engine shut down, or when no pool slot became free within
//!   `connection_request_timeout`.
//!
//! Every callback method consumes the callback, so a request can never report
//! twice. If the engine is torn down before a queued task ever runs, the
//! callback is dropped without being called; [`crate::net::bridge`] treats that
//! as a cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Semaphore;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::EngineConfig;
use crate::errors::FetchError;
use crate::net::request::RequestDescriptor;
use crate::net::response::{read_response, Response};
use crate::net::runtime::IoRuntime;

/// Completion protocol of the engine.
pub trait FutureCallback<T>: Send + 'static {
    fn completed(self: Box<Self>, result: T);
    fn failed(self: Box<Self>, error: FetchError);
    fn cancelled(self: Box<Self>);
}

/// Handle to one submitted request.
#[derive(Debug, Clone)]
pub struct InFlight {
    token: CancellationToken,
}

impl InFlight {
    /// Aborts the request. The callback receives `cancelled` unless the request
    /// already finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the request when the returned guard is dropped, unless the guard is disarmed.
    pub fn cancel_on_drop(self) -> DropGuard {
        self.token.drop_guard()
    }
}

/// Shared, pooled HTTP engine. Cheap to clone and safe to use from any number
/// of concurrent tasks without external locking.
#[derive(Clone)]
pub struct AsyncEngine {
    inner: Arc<EngineInner>,
}

/// Builds a client whose connect and read timeouts are the given pair.
pub type ClientFactory = Arc<dyn Fn(Duration, Duration) -> Result<reqwest::Client, FetchError> + Send + Sync>;

struct EngineInner {
    clients: Clients,
    runtime: Arc<IoRuntime>,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    config: EngineConfig,
}

impl AsyncEngine {
    /// Builds the engine with plain clients configured from `config`.
    pub fn new(config: EngineConfig, runtime: Arc<IoRuntime>) -> Result<Self, FetchError> {
        let base = config.clone();
        let factory: ClientFactory = Arc::new(move |connect, socket| {
            client_builder(&base, connect, socket)
                .build()
                .map_err(|e| FetchError::ClientConstruction(e.to_string()))
        });
        Self::with_factory(factory, config, runtime)
    }

    /// Uses `factory` for every client, e.g. one applying custom TLS trust.
    ///
    /// The client for the default timeouts of `config` is built right away, so
    /// a factory that cannot produce a client fails here.
    pub fn with_factory(
        factory: ClientFactory,
        config: EngineConfig,
        runtime: Arc<IoRuntime>,
    ) -> Result<Self, FetchError> {
        config.validate()?;

        let clients = Clients::new(factory);
        clients.get(config.connect_timeout, config.socket_timeout)?;

        Ok(Self {
            inner: Arc::new(EngineInner {
                clients,
                permits: Arc::new(Semaphore::new(config.max_connections)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                runtime,
                config,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Number of requests currently being executed by the engine.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.runtime.is_shut_down()
    }

    /// Submits `descriptor` and reports the outcome to `callback`.
    pub fn execute(
        &self,
        descriptor: &RequestDescriptor,
        callback: Box<dyn FutureCallback<Response>>,
    ) -> InFlight {
        let token = self.inner.runtime.request_token();
        let handle = InFlight { token: token.clone() };

        if token.is_cancelled() {
            debug!("engine is shut down, refusing {}", descriptor.url);
            callback.cancelled();
            return handle;
        }

        let (connect, socket) = descriptor.effective_timeouts(&self.inner.config);
        let prepared = self
            .inner
            .clients
            .get(connect, socket)
            .and_then(|client| Ok((descriptor.to_request(&client)?, client)));
        let (request, client) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                callback.failed(e);
                return handle;
            }
        };

        let permits = self.inner.permits.clone();
        let acquire_timeout = self.inner.config.connection_request_timeout;
        let limit = self.inner.config.max_content_length;
        let counter = InFlightCounter::enter(self.inner.in_flight.clone());

        debug!("submitting {} {}", descriptor.method, descriptor.url);

        self.inner.runtime.spawn(async move {
            let url = request.url().clone();
            let finish = run(client, request, token, permits, acquire_timeout, limit).await;

            // Leave the in-flight count before anyone is resumed
            drop(counter);

            match finish {
                Finish::Completed(response) => callback.completed(response),
                Finish::Failed(e) => {
                    debug!("request to {url} failed: {e}");
                    callback.failed(e)
                }
                Finish::Cancelled => {
                    debug!("request to {url} cancelled");
                    callback.cancelled()
                }
            }
        });

        handle
    }
}

impl std::fmt::Debug for AsyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncEngine")
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Client settings shared by the primary engine and the secure client.
///
/// `socket` is a read timeout: it bounds the wait for the response head and
/// every later read, and resets whenever data arrives.
pub(crate) fn client_builder(config: &EngineConfig, connect: Duration, socket: Duration) -> reqwest::ClientBuilder {
    let builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(connect)
        .read_timeout(socket)
        .pool_max_idle_per_host(config.max_idle_per_host);

    if config.use_system_proxy {
        builder
    } else {
        builder.no_proxy()
    }
}

enum Finish {
    Completed(Response),
    Failed(FetchError),
    Cancelled,
}

async fn run(
    client: reqwest::Client,
    request: reqwest::Request,
    token: CancellationToken,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    limit: u64,
) -> Finish {
    let _permit = tokio::select! {
        biased;
        _ = token.cancelled() => return Finish::Cancelled,
        res = tokio::time::timeout(acquire_timeout, permits.acquire_owned()) => match res {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Finish::Cancelled,
            Err(_elapsed) => {
                warn!("no pool slot within {acquire_timeout:?} for {}, cancelling", request.url());
                return Finish::Cancelled;
            }
        },
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Finish::Cancelled,
        res = send(&client, request, limit) => match res {
            Ok(response) => Finish::Completed(response),
            Err(e) => Finish::Failed(e),
        },
    }
}

async fn send(client: &reqwest::Client, request: reqwest::Request, limit: u64) -> Result<Response, FetchError> {
    let res = client.execute(request).await?;
    read_response(res, limit).await
}

/// One client per pair of connect and socket timeouts. reqwest only sets these
/// per client, and inputs share a handful of pairs at most.
struct Clients {
    factory: ClientFactory,
    by_timeouts: Mutex<HashMap<(Duration, Duration), reqwest::Client>>,
}

impl Clients {
    fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            by_timeouts: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, connect: Duration, socket: Duration) -> Result<reqwest::Client, FetchError> {
        let mut clients = match self.by_timeouts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(client) = clients.get(&(connect, socket)) {
            return Ok(client.clone());
        }

        debug!("building client for connect timeout {connect:?}, socket timeout {socket:?}");
        let client = (self.factory)(connect, socket)?;
        clients.insert((connect, socket), client.clone());
        Ok(client)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        match self.by_timeouts.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Keeps the in-flight count up while a spawned request task is alive.
struct InFlightCounter(Arc<AtomicUsize>);

impl InFlightCounter {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightCounter {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
