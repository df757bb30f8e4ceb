pub mod error;
pub mod inspect;
pub mod tls;
pub mod transport;

pub use error::{EngineError, InspectError};
pub use inspect::{inspect_client_hello, ClientHelloSummary};
pub use tls::{engine_by_name, RustlsEngine, TlsEngine, TlsSession};
pub use transport::{CaptureTransport, NetworkTransport, TransportBuilder};
