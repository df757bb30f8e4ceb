use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tlsgen_net::{EngineError, InspectError};

/// Errors that stop a capture, plus the ones raised while reading it back.
///
/// A failed handshake is deliberately absent: it is the normal outcome and
/// lives in `CaptureReport` instead.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The domain cannot name both a server and an artifact file.
    #[error("Invalid domain name {domain:?}: {reason}")]
    InvalidDomain { domain: String, reason: &'static str },

    /// The artifact could not be created or read.
    #[error("Storage error on {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Inspection failed: {0}")]
    Inspect(#[from] InspectError),
}
