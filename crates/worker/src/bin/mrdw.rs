// SPDX-License-Identifier: MIT

//! mrdw — the worker (daemon) binary, spawned by `mrd-host`'s launcher
//! (spec.md §4.4).

use clap::Parser;
use mrd_core::{DaemonOptions, RngSeed};
use mrd_transport::DialUrl;
use mrd_worker::handler::EchoHandler;
use mrd_worker::run::{run, RunConfig};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mrdw")]
struct Args {
    /// Dial-in URL to connect to: the profile's direct-mode socket, or
    /// the dispatcher's daemon-facing socket when a dispatcher is in use.
    /// A daemon always dials; it never binds.
    #[arg(long)]
    url: String,
    /// Comma-separated 6-word RNG seed vector (spec.md §4.4).
    #[arg(long)]
    seed: Option<String>,
    /// JSON-encoded forwarded option set (spec.md §6).
    #[arg(long)]
    options: Option<String>,
    #[arg(long)]
    tls_cert: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("MRD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    let url = DialUrl::parse(&args.url)?;

    let options: DaemonOptions = match args.options {
        Some(json) => serde_json::from_str(&json)?,
        None => DaemonOptions::default(),
    };

    let seed: Option<RngSeed> = args.seed.map(|s| {
        let mut words = [0u64; 6];
        for (slot, word) in words.iter_mut().zip(s.split(',')) {
            *slot = word.parse().unwrap_or(0);
        }
        RngSeed(words)
    });

    let tls_client_config = match args.tls_cert {
        Some(cert) => Some(mrd_transport::build_client_config(cert.as_bytes())?),
        None => None,
    };

    let config = RunConfig { url, tls_client_config, options, seed };
    run(config, Arc::new(EchoHandler)).await?;
    Ok(())
}
