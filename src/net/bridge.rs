//! Awaitable front of the engine's callback protocol.
//!
//! [`execute`] parks the calling task (not a thread) until the engine reports
//! back through [`FutureCallback`]. The caller resumes exactly once, with:
//!
//! - the response, when the engine calls `completed`,
//! - the error, when it calls `failed`,
//! - [`FetchError::Cancelled`], when it calls `cancelled`, drops the callback
//!   unheard (engine torn down), or when the caller's token fires.
//!
//! On caller cancellation the in-flight request is cancelled first and the
//! bridge waits for the engine to acknowledge it, so no request keeps running
//! unobserved. Dropping the future returned by [`execute`] cancels the request too.

use log::debug;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::errors::FetchError;
use crate::net::engine::{AsyncEngine, FutureCallback};
use crate::net::request::RequestDescriptor;
use crate::net::response::Response;

type Outcome = Result<Response, FetchError>;

/// Resumes the suspended caller.
struct Resume {
    tx: oneshot::Sender<Outcome>,
}

impl FutureCallback<Response> for Resume {
    fn completed(self: Box<Self>, result: Response) {
        let _ = self.tx.send(Ok(result));
    }

    fn failed(self: Box<Self>, error: FetchError) {
        let _ = self.tx.send(Err(error));
    }

    fn cancelled(self: Box<Self>) {
        let _ = self.tx.send(Err(FetchError::Cancelled));
    }
}

/// Submits `descriptor` to `engine` and waits for its outcome or for `cancel`.
pub async fn execute(
    engine: &AsyncEngine,
    descriptor: &RequestDescriptor,
    cancel: &CancellationToken,
) -> Result<Response, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let (tx, mut rx) = oneshot::channel();
    let in_flight = engine.execute(descriptor, Box::new(Resume { tx }));
    let guard = in_flight.clone().cancel_on_drop();

    let outcome = tokio::select! {
        res = &mut rx => res.unwrap_or(Err(FetchError::Cancelled)),
        _ = cancel.cancelled() => {
            debug!("caller cancelled request to {}", descriptor.url);
            in_flight.cancel();
            // Wait until the engine has let go of the request
            let _ = rx.await;
            Err(FetchError::Cancelled)
        }
    };

    let _ = guard.disarm();
    outcome
}
