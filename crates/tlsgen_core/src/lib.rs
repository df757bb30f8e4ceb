pub mod capture;
pub mod cli;
pub mod config;
pub mod error;

pub use capture::{run_capture, CaptureDriver, CaptureReport, CaptureState};
pub use config::CaptureConfig;
pub use error::CaptureError;

/// Installs the stderr log subscriber; stdout stays free for the console lines.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();
}
