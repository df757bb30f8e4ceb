use crate::config::CaptureConfig;
use crate::error::CaptureError;
use std::path::PathBuf;
use tlsgen_net::{
    engine_by_name, inspect_client_hello, ClientHelloSummary, EngineError, TlsEngine,
    TransportBuilder,
};
use tlsgen_traits::{ClientProfile, DuplexChannel};
use tracing::{debug, info, warn};

/// Lifecycle of one capture. `Idle` is also where a rejected invocation ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    ConfigBuilt,
    TransportOpen,
    HandshakeAttempted,
    Closed,
}

/// Outcome of a capture that got as far as opening its artifact.
#[derive(Debug)]
pub struct CaptureReport {
    pub server_name: String,
    pub artifact: PathBuf,
    pub bytes_recorded: u64,
    /// `Err` is the expected value: nothing ever answers the ClientHello.
    pub handshake: Result<(), EngineError>,
    /// `None` when the trailing request is disabled or no session was built.
    pub trailing_write: Option<Result<usize, EngineError>>,
    pub state: CaptureState,
}

impl CaptureReport {
    /// Decodes the leading record of the artifact on disk.
    pub fn inspect(&self) -> Result<ClientHelloSummary, CaptureError> {
        let bytes = std::fs::read(&self.artifact).map_err(|source| CaptureError::Storage {
            path: self.artifact.clone(),
            source,
        })?;
        Ok(inspect_client_hello(&bytes)?)
    }
}

/// Rejects names that cannot double as a single file name component.
pub fn validate_domain(domain: &str) -> Result<(), CaptureError> {
    let reason = if domain.is_empty() {
        Some("empty")
    } else if domain == "." || domain == ".." {
        Some("not a host name")
    } else if domain.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        Some("contains a path separator or NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CaptureError::InvalidDomain {
            domain: domain.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// The request line written after the handshake call, as a browser would.
pub fn trailing_request(domain: &str) -> Vec<u8> {
    format!("GET / HTTP/1.1\r\nHost: {}\r\n\r\n", domain).into_bytes()
}

/// Drives a single capture attempt: profile, artifact, transport, handshake, close.
pub struct CaptureDriver<'a> {
    config: &'a CaptureConfig,
    engine: &'a dyn TlsEngine,
    state: CaptureState,
}

impl<'a> CaptureDriver<'a> {
    pub fn new(config: &'a CaptureConfig, engine: &'a dyn TlsEngine) -> Self {
        Self {
            config,
            engine,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    fn advance(&mut self, next: CaptureState) {
        debug!("capture state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Only a domain that cannot be used or an artifact that cannot be
    /// created is an error here; everything after that is reported.
    pub fn run(mut self, domain: &str) -> Result<CaptureReport, CaptureError> {
        validate_domain(domain)?;
        let profile = ClientProfile::for_server(domain);
        self.advance(CaptureState::ConfigBuilt);

        let artifact = self.config.artifact_path(domain);
        let mut transport =
            TransportBuilder::capture_file(&artifact).map_err(|source| CaptureError::Storage {
                path: artifact.clone(),
                source,
            })?;
        self.advance(CaptureState::TransportOpen);

        let (handshake, trailing_write) = self.attempt(&profile, &mut transport);
        self.advance(CaptureState::HandshakeAttempted);

        let bytes_recorded = transport.bytes_recorded();
        if let Err(e) = transport.close() {
            warn!("closing {} failed: {}", artifact.display(), e);
        }
        self.advance(CaptureState::Closed);

        Ok(CaptureReport {
            server_name: profile.server_name().to_string(),
            artifact,
            bytes_recorded,
            handshake,
            trailing_write,
            state: self.state,
        })
    }

    fn attempt(
        &self,
        profile: &ClientProfile,
        channel: &mut dyn DuplexChannel,
    ) -> (Result<(), EngineError>, Option<Result<usize, EngineError>>) {
        let mut session = match self.engine.open(profile, channel) {
            Ok(session) => session,
            Err(e) => {
                warn!("{} could not build a session: {}", self.engine.name(), e);
                return (Err(e), None);
            }
        };

        // The ClientHello is already on the channel by the time this fails.
        let handshake = session.handshake();
        match &handshake {
            Err(e) => info!("handshake stopped without a server reply (expected): {}", e),
            Ok(()) => warn!("handshake completed over a capture channel"),
        }

        let trailing_write = if self.config.send_trailing_request {
            let outcome = session.write_payload(&trailing_request(profile.server_name()));
            if let Err(e) = &outcome {
                debug!("trailing request not sent: {}", e);
            }
            Some(outcome)
        } else {
            None
        };

        (handshake, trailing_write)
    }
}

/// Runs one capture with the engine named in `config`.
pub fn run_capture(config: &CaptureConfig, domain: &str) -> Result<CaptureReport, CaptureError> {
    let engine = engine_by_name(&config.engine)?;
    CaptureDriver::new(config, engine.as_ref()).run(domain)
}
