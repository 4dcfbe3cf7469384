// SPDX-License-Identifier: MIT

//! mrdd — the dispatcher binary, launched as a detached child by
//! `mrd-host`'s daemon launcher (spec.md §4.4).

use clap::Parser;
use mrd_core::TlsMaterial;
use mrd_dispatcher::{logging, run, DispatcherState};
use mrd_transport::{DialUrl, Listener};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mrdd")]
struct Args {
    /// Dial-in URL daemons connect to.
    #[arg(long)]
    daemon_url: String,
    /// Dial-in URL the host connects to for tasks and control frames.
    #[arg(long)]
    host_url: String,
    /// Retry tasks on daemon disconnect instead of synthesizing
    /// `connection_reset`.
    #[arg(long)]
    retry: bool,
    /// PEM certificate for tls+tcp:// daemon-facing sockets.
    #[arg(long)]
    tls_cert: Option<PathBuf>,
    /// PEM private key for tls+tcp:// daemon-facing sockets.
    #[arg(long)]
    tls_key: Option<PathBuf>,
    #[arg(long, default_value = "/tmp/mrd")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _guard = logging::init(&args.log_dir, "dispatcher.log")?;

    info!(daemon_url = %args.daemon_url, host_url = %args.host_url, "starting dispatcher");

    let daemon_url = DialUrl::parse(&args.daemon_url)?;
    let host_url = DialUrl::parse(&args.host_url)?;

    let tls_config = match (&args.tls_cert, &args.tls_key) {
        (Some(cert), Some(key)) => {
            let material = TlsMaterial {
                cert_pem: std::fs::read(cert)?,
                key_pem: std::fs::read(key)?,
                password: None,
            };
            Some(mrd_transport::build_server_config(&material)?)
        }
        _ => None,
    };

    let (daemon_listener, resolved_daemon_url) = Listener::bind(&daemon_url, tls_config).await?;
    let (host_listener, resolved_host_url) = Listener::bind(&host_url, None).await?;

    info!(daemon_url = %resolved_daemon_url, host_url = %resolved_host_url, "dispatcher listening");

    let state = DispatcherState::new(args.retry);
    run::run(state, daemon_listener, host_listener, resolved_daemon_url.to_string()).await;

    Ok(())
}
