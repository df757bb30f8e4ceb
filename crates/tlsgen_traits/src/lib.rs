use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// A connection-shaped byte channel handed to a TLS engine.
///
/// End-of-stream on the inbound side is `Read::read` returning `Ok(0)`.
pub trait DuplexChannel: io::Read + io::Write + Debug + Send {
    /// Releases the underlying handle. Later writes must fail.
    fn close(&mut self) -> io::Result<()>;

    /// Applies the same timeout to both directions. `None` means block forever.
    fn set_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_deadline(timeout)?;
        self.set_write_deadline(timeout)
    }

    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    fn set_write_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

/// TLS protocol versions a profile may span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    pub fn iana_id(self) -> u16 {
        match self {
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
        }
    }
}

/// Cipher suites the fixed preference table can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    Tls13Aes128GcmSha256,
    Tls13Aes256GcmSha384,
    Tls13Chacha20Poly1305Sha256,
    EcdheEcdsaAes128GcmSha256,
    EcdheRsaAes128GcmSha256,
    EcdheEcdsaAes256GcmSha384,
    EcdheRsaAes256GcmSha384,
    EcdheEcdsaChacha20Poly1305,
    EcdheRsaChacha20Poly1305,
}

impl CipherSuite {
    pub fn iana_id(self) -> u16 {
        match self {
            CipherSuite::Tls13Aes128GcmSha256 => 0x1301,
            CipherSuite::Tls13Aes256GcmSha384 => 0x1302,
            CipherSuite::Tls13Chacha20Poly1305Sha256 => 0x1303,
            CipherSuite::EcdheEcdsaAes128GcmSha256 => 0xc02b,
            CipherSuite::EcdheRsaAes128GcmSha256 => 0xc02f,
            CipherSuite::EcdheEcdsaAes256GcmSha384 => 0xc02c,
            CipherSuite::EcdheRsaAes256GcmSha384 => 0xc030,
            CipherSuite::EcdheEcdsaChacha20Poly1305 => 0xcca9,
            CipherSuite::EcdheRsaChacha20Poly1305 => 0xcca8,
        }
    }

    /// Name as understood by OpenSSL's cipher string syntax.
    pub fn openssl_name(self) -> &'static str {
        match self {
            CipherSuite::Tls13Aes128GcmSha256 => "TLS_AES_128_GCM_SHA256",
            CipherSuite::Tls13Aes256GcmSha384 => "TLS_AES_256_GCM_SHA384",
            CipherSuite::Tls13Chacha20Poly1305Sha256 => "TLS_CHACHA20_POLY1305_SHA256",
            CipherSuite::EcdheEcdsaAes128GcmSha256 => "ECDHE-ECDSA-AES128-GCM-SHA256",
            CipherSuite::EcdheRsaAes128GcmSha256 => "ECDHE-RSA-AES128-GCM-SHA256",
            CipherSuite::EcdheEcdsaAes256GcmSha384 => "ECDHE-ECDSA-AES256-GCM-SHA384",
            CipherSuite::EcdheRsaAes256GcmSha384 => "ECDHE-RSA-AES256-GCM-SHA384",
            CipherSuite::EcdheEcdsaChacha20Poly1305 => "ECDHE-ECDSA-CHACHA20-POLY1305",
            CipherSuite::EcdheRsaChacha20Poly1305 => "ECDHE-RSA-CHACHA20-POLY1305",
        }
    }

    /// TLS 1.3 suites are configured separately from the 1.2 list by OpenSSL.
    pub fn is_tls13(self) -> bool {
        matches!(
            self,
            CipherSuite::Tls13Aes128GcmSha256
                | CipherSuite::Tls13Aes256GcmSha384
                | CipherSuite::Tls13Chacha20Poly1305Sha256
        )
    }
}

/// Key exchange groups (the "curves" of the preference table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    X25519,
    Secp256r1,
    Secp384r1,
}

impl NamedGroup {
    pub fn iana_id(self) -> u16 {
        match self {
            NamedGroup::X25519 => 0x001d,
            NamedGroup::Secp256r1 => 0x0017,
            NamedGroup::Secp384r1 => 0x0018,
        }
    }

    pub fn openssl_name(self) -> &'static str {
        match self {
            NamedGroup::X25519 => "X25519",
            NamedGroup::Secp256r1 => "P-256",
            NamedGroup::Secp384r1 => "P-384",
        }
    }
}

/// Preference order is significant: engines advertise in this order.
pub const PREFERRED_CIPHER_SUITES: [CipherSuite; 9] = [
    // TLS 1.3
    CipherSuite::Tls13Aes128GcmSha256,
    CipherSuite::Tls13Aes256GcmSha384,
    CipherSuite::Tls13Chacha20Poly1305Sha256,
    // TLS 1.2
    CipherSuite::EcdheEcdsaAes128GcmSha256,
    CipherSuite::EcdheRsaAes128GcmSha256,
    CipherSuite::EcdheEcdsaAes256GcmSha384,
    CipherSuite::EcdheRsaAes256GcmSha384,
    CipherSuite::EcdheEcdsaChacha20Poly1305,
    CipherSuite::EcdheRsaChacha20Poly1305,
];

pub const PREFERRED_GROUPS: [NamedGroup; 3] =
    [NamedGroup::X25519, NamedGroup::Secp256r1, NamedGroup::Secp384r1];

pub const PREFERRED_ALPN: [&str; 2] = ["h2", "http/1.1"];

/// Everything a TLS engine needs to emit a ClientHello for one server.
///
/// Built once per capture and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    server_name: String,
    min_version: TlsVersion,
    max_version: TlsVersion,
    cipher_suites: Vec<CipherSuite>,
    groups: Vec<NamedGroup>,
    alpn_protocols: Vec<String>,
    verify_peer: bool,
}

impl ClientProfile {
    /// The fixed preference table bound to `server_name` as SNI.
    pub fn for_server(server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            min_version: TlsVersion::Tls12,
            max_version: TlsVersion::Tls13,
            cipher_suites: PREFERRED_CIPHER_SUITES.to_vec(),
            groups: PREFERRED_GROUPS.to_vec(),
            alpn_protocols: PREFERRED_ALPN.iter().map(|p| p.to_string()).collect(),
            // Nothing answers in capture mode, so there is never a peer to validate.
            verify_peer: false,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn min_version(&self) -> TlsVersion {
        self.min_version
    }

    pub fn max_version(&self) -> TlsVersion {
        self.max_version
    }

    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    pub fn alpn_protocols(&self) -> &[String] {
        &self.alpn_protocols
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// Versions inside `[min_version, max_version]`, lowest first.
    pub fn versions(&self) -> Vec<TlsVersion> {
        [TlsVersion::Tls12, TlsVersion::Tls13]
            .into_iter()
            .filter(|v| *v >= self.min_version && *v <= self.max_version)
            .collect()
    }

    /// ALPN list in wire format: each protocol prefixed by its length byte.
    pub fn alpn_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        for proto in &self.alpn_protocols {
            wire.push(proto.len() as u8);
            wire.extend_from_slice(proto.as_bytes());
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_carries_fixed_preferences() {
        let profile = ClientProfile::for_server("example.com");
        assert_eq!(profile.server_name(), "example.com");
        assert_eq!(profile.versions(), vec![TlsVersion::Tls12, TlsVersion::Tls13]);
        assert_eq!(profile.cipher_suites().len(), 9);
        assert_eq!(profile.cipher_suites()[0].iana_id(), 0x1301);
        assert_eq!(
            profile.groups().iter().map(|g| g.iana_id()).collect::<Vec<_>>(),
            vec![0x001d, 0x0017, 0x0018]
        );
        assert_eq!(profile.alpn_protocols(), &["h2".to_string(), "http/1.1".to_string()]);
        assert!(!profile.verify_peer());
    }

    #[test]
    fn tls13_suites_lead_the_table() {
        let split = PREFERRED_CIPHER_SUITES.iter().position(|s| !s.is_tls13());
        assert_eq!(split, Some(3));
        assert!(PREFERRED_CIPHER_SUITES[3..].iter().all(|s| !s.is_tls13()));
    }

    #[test]
    fn alpn_wire_is_length_prefixed() {
        let profile = ClientProfile::for_server("example.com");
        assert_eq!(profile.alpn_wire(), b"\x02h2\x08http/1.1".to_vec());
    }
}
