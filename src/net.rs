//! Network layer: URL and request construction, the pooled async engine, the
//! bridge that turns its callbacks into an awaitable call, the TLS-aware
//! secondary client and the response decoder.

pub mod bridge;
pub mod credentials;
pub mod engine;
pub mod request;
pub mod response;
pub mod runtime;
pub mod secure;
mod tls;
pub mod uri;

pub use bridge::execute;
pub use credentials::{CredentialsProvider, StaticCredentials};
pub use engine::{AsyncEngine, ClientFactory, FutureCallback, InFlight};
pub use request::RequestDescriptor;
pub use response::{decode, Response, ResponseMapping};
pub use secure::SecureClient;
pub use uri::build_url;
