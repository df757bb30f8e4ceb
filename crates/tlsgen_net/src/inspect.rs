use crate::error::InspectError;
use tls_parser::{
    parse_tls_extensions, parse_tls_plaintext, TlsClientHelloContents, TlsExtension,
    TlsExtensionType, TlsMessage, TlsMessageHandshake,
};
use tracing::debug;

const HANDSHAKE_CONTENT_TYPE: u8 = 0x16;

/// What a captured ClientHello advertises, decoded from its leading record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloSummary {
    pub record_version: u16,
    pub client_version: u16,
    pub cipher_suites: Vec<u16>,
    pub extensions: Vec<u16>,
    pub server_name: Option<String>,
    pub alpn: Vec<String>,
    pub groups: Vec<u16>,
    pub supported_versions: Vec<u16>,
}

/// Decodes the first TLS record of `data` and summarizes its ClientHello.
///
/// Bytes after the first record (a second flight, say) are ignored.
pub fn inspect_client_hello(data: &[u8]) -> Result<ClientHelloSummary, InspectError> {
    if data.len() < 5 {
        return Err(InspectError::Parse(
            "Not enough data for TLS record header".to_string(),
        ));
    }
    if data[0] != HANDSHAKE_CONTENT_TYPE {
        return Err(InspectError::NotClientHello(data[0]));
    }

    let record_len = u16::from_be_bytes([data[3], data[4]]) as usize;
    let end = record_len.saturating_add(5).min(data.len());
    debug!("inspecting record of {} bytes ({} available)", record_len, data.len());

    let (_, record) = parse_tls_plaintext(&data[..end])
        .map_err(|e| InspectError::Parse(format!("TLS parsing failed: {e:?}")))?;

    record
        .msg
        .iter()
        .find_map(|message| match message {
            TlsMessage::Handshake(TlsMessageHandshake::ClientHello(hello)) => Some(hello),
            _ => None,
        })
        .map(|hello| summarize(record.hdr.version.0, hello))
        .ok_or(InspectError::NotClientHello(data[0]))
}

fn summarize(record_version: u16, hello: &TlsClientHelloContents) -> ClientHelloSummary {
    let mut summary = ClientHelloSummary {
        record_version,
        client_version: hello.version.0,
        cipher_suites: hello.ciphers.iter().map(|c| c.0).collect(),
        extensions: Vec::new(),
        server_name: None,
        alpn: Vec::new(),
        groups: Vec::new(),
        supported_versions: Vec::new(),
    };

    let Some(ext_data) = hello.ext else {
        return summary;
    };

    match parse_tls_extensions(ext_data) {
        Ok((_, extensions)) => {
            for extension in &extensions {
                summary.extensions.push(TlsExtensionType::from(extension).into());
                match extension {
                    TlsExtension::SNI(names) => {
                        summary.server_name = names
                            .first()
                            .and_then(|(_, name)| std::str::from_utf8(name).ok())
                            .map(str::to_owned);
                    }
                    TlsExtension::ALPN(protocols) => {
                        summary.alpn = protocols
                            .iter()
                            .map(|p| String::from_utf8_lossy(p).into_owned())
                            .collect();
                    }
                    TlsExtension::EllipticCurves(groups) => {
                        summary.groups = groups.iter().map(|g| g.0).collect();
                    }
                    TlsExtension::SupportedVersions(versions) => {
                        summary.supported_versions = versions.iter().map(|v| v.0).collect();
                    }
                    _ => {}
                }
            }
        }
        Err(e) => debug!("Failed to parse TLS extensions: {:?}", e),
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::{RustlsEngine, TlsEngine};
    use crate::transport::CaptureTransport;
    use tlsgen_traits::{ClientProfile, PREFERRED_CIPHER_SUITES};

    fn captured_hello(domain: &str) -> Vec<u8> {
        let profile = ClientProfile::for_server(domain);
        let mut transport = CaptureTransport::new(Vec::new());
        {
            let mut session = RustlsEngine.open(&profile, &mut transport).unwrap();
            assert!(session.handshake().is_err());
        }
        transport.into_inner().unwrap()
    }

    #[test]
    fn summary_reflects_profile() {
        let summary = inspect_client_hello(&captured_hello("example.com")).unwrap();

        assert_eq!(summary.server_name.as_deref(), Some("example.com"));
        assert_eq!(summary.alpn, vec!["h2".to_string(), "http/1.1".to_string()]);
        assert_eq!(summary.groups, vec![0x001d, 0x0017, 0x0018]);
        assert!(summary.supported_versions.contains(&0x0304));
        assert!(summary.supported_versions.contains(&0x0303));
        assert_eq!(summary.supported_versions.len(), 2);

        let expected: Vec<u16> = PREFERRED_CIPHER_SUITES.iter().map(|s| s.iana_id()).collect();
        assert!(summary.cipher_suites.starts_with(&expected));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = captured_hello("example.org");
        bytes.extend_from_slice(b"\x17\x03\x03\x00\x01\x00");
        let summary = inspect_client_hello(&bytes).unwrap();
        assert_eq!(summary.server_name.as_deref(), Some("example.org"));
    }

    #[test]
    fn short_input_is_a_parse_error() {
        assert!(matches!(
            inspect_client_hello(b"\x16\x03"),
            Err(InspectError::Parse(_))
        ));
    }

    #[test]
    fn non_handshake_record_is_rejected() {
        let err = inspect_client_hello(b"\x17\x03\x03\x00\x01\x00").unwrap_err();
        assert!(matches!(err, InspectError::NotClientHello(0x17)));
    }

    #[test]
    fn http_text_is_rejected() {
        assert!(inspect_client_hello(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").is_err());
    }
}
