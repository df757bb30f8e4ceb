use thiserror::Error;

/// Failures surfaced by a TLS engine or its session.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The profile could not be expressed in the engine's configuration.
    #[error("Engine configuration rejected: {0}")]
    Config(String),

    /// The server name is not a valid DNS name or IP address.
    #[error("Invalid server name: {0}")]
    ServerName(String),

    /// The handshake stopped before completion.
    #[error("Handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// An engine-reported failure that is not an I/O error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// No usable session remains after a failed handshake.
    #[error("Session unusable after failed handshake")]
    SessionUnusable,

    /// Writing application data through the session failed.
    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Unknown TLS engine: {0}")]
    UnknownEngine(String),
}

/// Failures decoding a captured artifact.
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Parse error: {0}")]
    Parse(String),

    /// The leading record is valid TLS but carries something other than a ClientHello.
    #[error("No ClientHello in leading record (content type 0x{0:02x})")]
    NotClientHello(u8),
}
