use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;

pub const USAGE: &str = "Use: tls_gen <Domain Name>";

#[derive(Parser, Debug)]
#[command(name = "tls_gen", version, about = "Capture the TLS ClientHello sent for a domain")]
pub struct Args {
    /// Target domain, used as SNI and in the artifact name
    pub domain: String,
}

#[derive(Debug)]
pub enum Invocation {
    Capture(Args),
    /// `--help` or `--version`; clap renders these itself.
    Info(clap::Error),
    Usage,
}

/// Anything other than exactly one domain collapses to the one-line usage.
pub fn parse_args<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(args) {
        Ok(args) => Invocation::Capture(args),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Invocation::Info(e)
        }
        Err(_) => Invocation::Usage,
    }
}
