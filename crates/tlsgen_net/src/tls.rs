use crate::error::EngineError;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ClientConnection, ServerName, SupportedCipherSuite};
use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;
use tlsgen_traits::{CipherSuite, ClientProfile, DuplexChannel, NamedGroup, TlsVersion};
use tracing::debug;

#[cfg(feature = "openssl")]
pub use self::legacy::OpensslEngine;

/// A TLS client stack that can be bound to any duplex channel.
///
/// Engines own no connection state; every `open` yields a fresh session.
pub trait TlsEngine {
    fn name(&self) -> &'static str;

    /// Builds a client session for `profile` that talks over `channel`.
    /// Nothing is written until the session's handshake is driven.
    fn open<'a>(
        &self,
        profile: &ClientProfile,
        channel: &'a mut dyn DuplexChannel,
    ) -> Result<Box<dyn TlsSession + 'a>, EngineError>;
}

/// One client-side TLS session bound to a channel.
pub trait TlsSession {
    /// Runs the handshake as far as the channel allows.
    ///
    /// Over a capture channel this always fails once the ClientHello is out,
    /// because the server flight never arrives.
    fn handshake(&mut self) -> Result<(), EngineError>;

    /// Sends application data through the session.
    fn write_payload(&mut self, data: &[u8]) -> Result<usize, EngineError>;
}

/// Resolves an engine by its CLI/config name.
pub fn engine_by_name(name: &str) -> Result<Box<dyn TlsEngine>, EngineError> {
    match name {
        "rustls" => Ok(Box::new(RustlsEngine)),
        #[cfg(feature = "openssl")]
        "openssl" => Ok(Box::new(OpensslEngine)),
        other => Err(EngineError::UnknownEngine(other.to_string())),
    }
}

/// Default engine: rustls driven synchronously.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustlsEngine;

impl RustlsEngine {
    pub fn client_config(profile: &ClientProfile) -> Result<ClientConfig, EngineError> {
        if profile.verify_peer() {
            return Err(EngineError::Config(
                "peer verification is not available without a trust store".to_string(),
            ));
        }

        let suites: Vec<SupportedCipherSuite> =
            profile.cipher_suites().iter().map(|s| rustls_suite(*s)).collect();
        let groups: Vec<&'static rustls::SupportedKxGroup> =
            profile.groups().iter().map(|g| rustls_group(*g)).collect();
        let versions: Vec<&'static rustls::SupportedProtocolVersion> =
            profile.versions().into_iter().map(rustls_version).collect();

        let mut config = ClientConfig::builder()
            .with_cipher_suites(&suites)
            .with_kx_groups(&groups)
            .with_protocol_versions(&versions)
            .map_err(|e| EngineError::Config(e.to_string()))?
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
            .with_no_client_auth();
        config.alpn_protocols = profile
            .alpn_protocols()
            .iter()
            .map(|p| p.as_bytes().to_vec())
            .collect();

        Ok(config)
    }
}

impl TlsEngine for RustlsEngine {
    fn name(&self) -> &'static str {
        "rustls"
    }

    fn open<'a>(
        &self,
        profile: &ClientProfile,
        channel: &'a mut dyn DuplexChannel,
    ) -> Result<Box<dyn TlsSession + 'a>, EngineError> {
        let config = Self::client_config(profile)?;
        let server_name = ServerName::try_from(profile.server_name())
            .map_err(|e| EngineError::ServerName(format!("{}: {}", profile.server_name(), e)))?;
        let conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| EngineError::Tls(e.to_string()))?;

        debug!("rustls session ready for {}", profile.server_name());
        Ok(Box::new(RustlsSession { conn, channel }))
    }
}

struct RustlsSession<'a> {
    conn: ClientConnection,
    channel: &'a mut dyn DuplexChannel,
}

impl TlsSession for RustlsSession<'_> {
    fn handshake(&mut self) -> Result<(), EngineError> {
        let (read, written) = self
            .conn
            .complete_io(&mut self.channel)
            .map_err(EngineError::Handshake)?;
        debug!("handshake completed: {} bytes in, {} bytes out", read, written);
        Ok(())
    }

    fn write_payload(&mut self, data: &[u8]) -> Result<usize, EngineError> {
        // Stream finishes any pending handshake first, so a dead session errors here.
        let mut stream = rustls::Stream::new(&mut self.conn, &mut self.channel);
        stream.write(data).map_err(EngineError::Write)
    }
}

/// Capture mode never meets a real server, so any certificate is accepted.
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

fn rustls_suite(suite: CipherSuite) -> SupportedCipherSuite {
    use rustls::cipher_suite as cs;
    match suite {
        CipherSuite::Tls13Aes128GcmSha256 => cs::TLS13_AES_128_GCM_SHA256,
        CipherSuite::Tls13Aes256GcmSha384 => cs::TLS13_AES_256_GCM_SHA384,
        CipherSuite::Tls13Chacha20Poly1305Sha256 => cs::TLS13_CHACHA20_POLY1305_SHA256,
        CipherSuite::EcdheEcdsaAes128GcmSha256 => cs::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::EcdheRsaAes128GcmSha256 => cs::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::EcdheEcdsaAes256GcmSha384 => cs::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        CipherSuite::EcdheRsaAes256GcmSha384 => cs::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        CipherSuite::EcdheEcdsaChacha20Poly1305 => {
            cs::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
        }
        CipherSuite::EcdheRsaChacha20Poly1305 => cs::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    }
}

fn rustls_group(group: NamedGroup) -> &'static rustls::SupportedKxGroup {
    match group {
        NamedGroup::X25519 => &rustls::kx_group::X25519,
        NamedGroup::Secp256r1 => &rustls::kx_group::SECP256R1,
        NamedGroup::Secp384r1 => &rustls::kx_group::SECP384R1,
    }
}

fn rustls_version(version: TlsVersion) -> &'static rustls::SupportedProtocolVersion {
    match version {
        TlsVersion::Tls12 => &rustls::version::TLS12,
        TlsVersion::Tls13 => &rustls::version::TLS13,
    }
}

#[cfg(feature = "openssl")]
mod legacy {
    use super::{TlsEngine, TlsSession};
    use crate::error::EngineError;
    use openssl::ssl::{
        HandshakeError, Ssl, SslConnector, SslMethod, SslStream, SslVerifyMode, SslVersion,
    };
    use std::io::Write;
    use tlsgen_traits::{ClientProfile, DuplexChannel, TlsVersion};
    use tracing::debug;

    /// OpenSSL-backed engine, for comparing fingerprints across stacks.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct OpensslEngine;

    fn config_err(e: openssl::error::ErrorStack) -> EngineError {
        EngineError::Config(e.to_string())
    }

    fn openssl_version(version: TlsVersion) -> SslVersion {
        match version {
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    impl TlsEngine for OpensslEngine {
        fn name(&self) -> &'static str {
            "openssl"
        }

        fn open<'a>(
            &self,
            profile: &ClientProfile,
            channel: &'a mut dyn DuplexChannel,
        ) -> Result<Box<dyn TlsSession + 'a>, EngineError> {
            let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(config_err)?;
            builder
                .set_min_proto_version(Some(openssl_version(profile.min_version())))
                .map_err(config_err)?;
            builder
                .set_max_proto_version(Some(openssl_version(profile.max_version())))
                .map_err(config_err)?;

            // OpenSSL keeps TLS 1.3 suites apart from the classic cipher list.
            let (tls13, tls12): (Vec<_>, Vec<_>) =
                profile.cipher_suites().iter().partition(|s| s.is_tls13());
            let tls13 = tls13.iter().map(|s| s.openssl_name()).collect::<Vec<_>>();
            let tls12 = tls12.iter().map(|s| s.openssl_name()).collect::<Vec<_>>();
            builder.set_ciphersuites(&tls13.join(":")).map_err(config_err)?;
            builder.set_cipher_list(&tls12.join(":")).map_err(config_err)?;

            let groups = profile.groups().iter().map(|g| g.openssl_name()).collect::<Vec<_>>();
            builder.set_groups_list(&groups.join(":")).map_err(config_err)?;
            builder.set_alpn_protos(&profile.alpn_wire()).map_err(config_err)?;

            if !profile.verify_peer() {
                builder.set_verify(SslVerifyMode::NONE);
            }

            let ssl = builder
                .build()
                .configure()
                .map_err(config_err)?
                .verify_hostname(profile.verify_peer())
                .into_ssl(profile.server_name())
                .map_err(config_err)?;

            debug!("openssl session ready for {}", profile.server_name());
            Ok(Box::new(OpensslSession {
                pending: Some((ssl, channel)),
                stream: None,
            }))
        }
    }

    struct OpensslSession<'a> {
        pending: Option<(Ssl, &'a mut dyn DuplexChannel)>,
        stream: Option<SslStream<&'a mut dyn DuplexChannel>>,
    }

    impl TlsSession for OpensslSession<'_> {
        fn handshake(&mut self) -> Result<(), EngineError> {
            let (ssl, channel) = self.pending.take().ok_or(EngineError::SessionUnusable)?;
            match ssl.connect(channel) {
                Ok(stream) => {
                    self.stream = Some(stream);
                    Ok(())
                }
                Err(HandshakeError::SetupFailure(e)) => Err(EngineError::Tls(e.to_string())),
                Err(HandshakeError::Failure(mid)) | Err(HandshakeError::WouldBlock(mid)) => {
                    Err(EngineError::Tls(mid.error().to_string()))
                }
            }
        }

        fn write_payload(&mut self, data: &[u8]) -> Result<usize, EngineError> {
            match self.stream.as_mut() {
                Some(stream) => stream.write(data).map_err(EngineError::Write),
                None => Err(EngineError::SessionUnusable),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CaptureTransport;

    fn capture_with(engine: &dyn TlsEngine, domain: &str) -> (Result<(), EngineError>, Vec<u8>) {
        let profile = ClientProfile::for_server(domain);
        let mut transport = CaptureTransport::new(Vec::new());
        let outcome = {
            let mut session = engine.open(&profile, &mut transport).unwrap();
            session.handshake()
        };
        (outcome, transport.into_inner().unwrap())
    }

    #[test]
    fn rustls_handshake_fails_after_emitting_client_hello() {
        let (outcome, bytes) = capture_with(&RustlsEngine, "example.com");

        match outcome {
            Err(EngineError::Handshake(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("expected handshake EOF, got {:?}", other),
        }
        assert!(bytes.len() > 5);
        assert_eq!(bytes[0], 0x16);
        assert_eq!(bytes[5], 0x01);
    }

    #[test]
    fn rustls_payload_after_failed_handshake_is_rejected() {
        let (_, hello_only) = capture_with(&RustlsEngine, "example.com");

        let profile = ClientProfile::for_server("example.com");
        let mut transport = CaptureTransport::new(Vec::new());
        {
            let mut session = RustlsEngine.open(&profile, &mut transport).unwrap();
            assert!(session.handshake().is_err());
            assert!(session.write_payload(b"GET / HTTP/1.1\r\n\r\n").is_err());
        }
        assert_eq!(transport.bytes_recorded(), hello_only.len() as u64);
    }

    #[test]
    fn rustls_rejects_invalid_server_name() {
        let profile = ClientProfile::for_server("not a hostname");
        let mut transport = CaptureTransport::new(Vec::new());
        let err = RustlsEngine.open(&profile, &mut transport).err().unwrap();
        assert!(matches!(err, EngineError::ServerName(_)));
        assert_eq!(transport.bytes_recorded(), 0);
    }

    #[test]
    fn rustls_config_mirrors_profile() {
        let profile = ClientProfile::for_server("example.com");
        let config = RustlsEngine::client_config(&profile).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn engines_resolve_by_name() {
        assert_eq!(engine_by_name("rustls").unwrap().name(), "rustls");
        assert!(matches!(
            engine_by_name("schannel").err(),
            Some(EngineError::UnknownEngine(name)) if name == "schannel"
        ));
    }

    #[cfg(feature = "openssl")]
    #[test]
    fn openssl_handshake_fails_after_emitting_client_hello() {
        let (outcome, bytes) = capture_with(&OpensslEngine, "example.com");
        assert!(matches!(outcome, Err(EngineError::Tls(_))));
        assert_eq!(bytes[0], 0x16);
        assert_eq!(bytes[5], 0x01);
    }
}
