use std::path::PathBuf;

/// Where and how a capture is written.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub output_dir: PathBuf,
    pub artifact_prefix: String,
    pub artifact_suffix: String,
    /// Attempt the plain HTTP request after the handshake call returns.
    pub send_trailing_request: bool,
    pub engine: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            artifact_prefix: "tls_clienthello_".to_string(),
            artifact_suffix: ".bin".to_string(),
            send_trailing_request: true,
            engine: "rustls".to_string(),
        }
    }
}

impl CaptureConfig {
    /// `<prefix><domain><suffix>`, with the domain taken literally.
    pub fn artifact_name(&self, domain: &str) -> String {
        format!("{}{}{}", self.artifact_prefix, domain, self.artifact_suffix)
    }

    pub fn artifact_path(&self, domain: &str) -> PathBuf {
        self.output_dir.join(self.artifact_name(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_wraps_domain() {
        let config = CaptureConfig::default();
        assert_eq!(config.artifact_name("example.com"), "tls_clienthello_example.com.bin");
        assert_eq!(
            config.artifact_path("example.com"),
            PathBuf::from("./tls_clienthello_example.com.bin")
        );
    }

    #[test]
    fn artifact_path_follows_output_dir() {
        let config = CaptureConfig {
            output_dir: PathBuf::from("/tmp/captures"),
            ..CaptureConfig::default()
        };
        assert_eq!(
            config.artifact_path("a.example"),
            PathBuf::from("/tmp/captures/tls_clienthello_a.example.bin")
        );
    }
}
