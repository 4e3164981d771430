//! Command-line SMTP connectivity and TLS checker.
//!
//! Connects to a mail server, walks greeting, EHLO and STARTTLS (or implicit
//! TLS on port 465) and prints what the server offered along with the full
//! session transcript.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use mailprobe_core::config::DEFAULT_EHLO_HOSTNAME;
use mailprobe_core::{ProbeConfig, ProbeRequest, probe_request};
use rustls::pki_types::CertificateDer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod report;

/// Check that a mail server is reachable and negotiates TLS
#[derive(Parser, Debug)]
#[command(name = "mailprobe")]
#[command(about = "Check that a mail server is reachable and negotiates TLS", long_about = None)]
#[command(version)]
struct Cli {
    /// Mail server hostname
    #[arg(required_unless_present = "ports")]
    hostname: Option<String>,

    /// Port to probe (465 uses implicit TLS, anything else STARTTLS)
    #[arg(short, long, default_value_t = 587)]
    port: u16,

    /// Hostname announced in EHLO
    #[arg(long, default_value = DEFAULT_EHLO_HOSTNAME)]
    ehlo: String,

    /// Seconds allowed for connecting and the implicit TLS handshake
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    connect_timeout: u64,

    /// Seconds allowed for each read, write and STARTTLS handshake
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    io_timeout: u64,

    /// Extra trusted CA certificates (PEM)
    #[arg(long, value_name = "PEM")]
    ca_file: Option<PathBuf>,

    /// Skip certificate verification
    #[arg(long)]
    insecure: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// List well-known mail ports and exit
    #[arg(long)]
    ports: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Diagnostics go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailprobe=info,mailprobe_core=info,mailprobe_smtp=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if cli.ports {
        print!("{}", report::render_ports());
        return Ok(ExitCode::SUCCESS);
    }

    let request = ProbeRequest::new(cli.hostname.as_deref().unwrap_or_default(), cli.port)?;
    let config = build_config(&cli)?;

    info!(
        hostname = request.hostname(),
        port = request.port(),
        protocol = %request.protocol(),
        "Probing"
    );
    let result = probe_request(&config, &request).await;

    if cli.json {
        println!("{}", result.to_json_pretty()?);
    } else {
        print!("{}", report::render(&result));
    }

    Ok(if result.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_config(cli: &Cli) -> anyhow::Result<ProbeConfig> {
    let mut builder = ProbeConfig::builder()
        .ehlo_hostname(cli.ehlo.as_str())
        .connect_timeout(Duration::from_secs(cli.connect_timeout))
        .io_timeout(Duration::from_secs(cli.io_timeout))
        .accept_invalid_certs(cli.insecure);

    if let Some(path) = &cli.ca_file {
        for cert in load_certs(path)? {
            builder = builder.add_root(cert);
        }
    }

    Ok(builder.build())
}

/// Loads every certificate from a PEM file.
fn load_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file =
        File::open(path).with_context(|| format!("cannot open CA file {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("cannot parse CA file {}", path.display()))?;
    if certs.is_empty() {
        bail!("no certificates found in {}", path.display());
    }

    info!(count = certs.len(), path = %path.display(), "Loaded extra trust anchors");
    Ok(certs)
}
