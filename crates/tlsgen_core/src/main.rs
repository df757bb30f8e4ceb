use anyhow::Context;
use tlsgen_core::capture::validate_domain;
use tlsgen_core::cli::{parse_args, Invocation, USAGE};
use tlsgen_core::{init_logging, run_capture, CaptureConfig};

fn main() -> anyhow::Result<()> {
    let args = match parse_args(std::env::args_os()) {
        Invocation::Capture(args) => args,
        Invocation::Info(e) => e.exit(),
        Invocation::Usage => {
            println!("{}", USAGE);
            std::process::exit(2);
        }
    };

    init_logging();

    if let Err(e) = validate_domain(&args.domain) {
        tracing::error!("{}", e);
        println!("{}", USAGE);
        std::process::exit(2);
    }

    let config = CaptureConfig::default();
    println!("Used ServerName: {}", args.domain);

    let report = run_capture(&config, &args.domain)
        .with_context(|| format!("capture for {} aborted", args.domain))?;

    match report.inspect() {
        Ok(hello) => tracing::info!(
            "captured ClientHello: sni={:?} alpn={:?} groups={:04x?} versions={:04x?}",
            hello.server_name,
            hello.alpn,
            hello.groups,
            hello.supported_versions
        ),
        Err(e) => tracing::warn!("captured bytes do not start with a ClientHello: {}", e),
    }

    println!(
        "TLS written to {} ({} bytes)",
        config.artifact_name(&args.domain),
        report.bytes_recorded
    );
    Ok(())
}
