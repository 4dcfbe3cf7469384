// SPDX-License-Identifier: MIT

//! The daemon's main loop: dial in, then alternately read a task frame
//! and write back its reply, honouring the forwarded option set
//! (spec.md §6).

use crate::handler::TaskHandler;
use mrd_core::{DaemonOptions, DaemonRng, RngSeed, TaskResult};
use mrd_transport::{dial, DialUrl, TlsClientConfig};
use mrd_wire::{is_exit_payload, read_message, write_frame, ReplyEnvelope, TaskEnvelope};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info};

pub struct RunConfig {
    pub url: DialUrl,
    pub tls_client_config: Option<TlsClientConfig>,
    pub options: DaemonOptions,
    /// This daemon's RNG seed vector (spec.md §4.4). Falls back to a
    /// process-derived seed when absent, so an ad-hoc `mrdw` invocation
    /// without `--seed` still runs.
    pub seed: Option<RngSeed>,
}

/// Run the daemon loop until an exit condition is reached. Returns
/// normally on a clean exit (sentinel, pipe-drop with `autoexit`,
/// `maxtasks`/`idletime`/`walltime` reached).
pub async fn run(config: RunConfig, handler: Arc<dyn TaskHandler>) -> Result<(), mrd_core::MrdError> {
    let deadline = config.options.walltime.map(|d| Instant::now() + d);
    let mut stream = dial(&config.url, config.tls_client_config.clone()).await?;
    info!(url = %config.url, "daemon dialed in");

    let mut rng = DaemonRng::from_seed(config.seed.unwrap_or_else(RngSeed::from_process_default));
    let mut tasks_handled: u64 = 0;

    loop {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                info!("walltime reached, exiting");
                return Ok(());
            }
        }
        if let Some(max) = config.options.maxtasks {
            if tasks_handled >= max {
                info!(tasks_handled, "maxtasks reached, exiting");
                return Ok(());
            }
        }

        let read = match config.options.idletime {
            Some(idle) => timeout(idle, read_message(&mut stream)).await,
            None => Ok(read_message(&mut stream).await),
        };

        let bytes = match read {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(_)) => {
                if config.options.autoexit {
                    info!("pipe dropped, autoexit is set, exiting");
                    return Ok(());
                }
                info!("pipe dropped, autoexit is unset, re-dialing");
                stream = dial(&config.url, config.tls_client_config.clone()).await?;
                continue;
            }
            Err(_) => {
                info!("idletime reached, exiting");
                return Ok(());
            }
        };

        if is_exit_payload(&bytes) {
            info!("exit sentinel received, exiting after current task");
            return Ok(());
        }

        let envelope: TaskEnvelope = mrd_wire::decode(&bytes)
            .map_err(|e| mrd_core::MrdError::Protocol(mrd_core::ProtocolViolation::Malformed(e.to_string())))?;

        let handler = Arc::clone(&handler);
        let task_id = envelope.task_id;
        let payload = envelope.payload;
        let mut task_rng = rng;
        let (result, returned_rng) = tokio::task::spawn_blocking(move || {
            let result = handler.handle(payload, &mut task_rng);
            (result, task_rng)
        })
        .await
        .unwrap_or_else(|_| (TaskResult::UserError(bytes::Bytes::from_static(b"handler panicked")), rng));
        rng = returned_rng;

        debug!(task_id = %task_id, ok = result.is_ok(), "task completed");
        write_frame(&mut stream, &ReplyEnvelope::from_result(task_id, result))
            .await
            .map_err(mrd_core::MrdError::Protocol)?;

        tasks_handled += 1;

        if config.options.cleanup {
            // Stateless handlers have nothing to free, but the flag is
            // honoured here so a stateful handler implementation has an
            // obvious place to hook per-task teardown.
        }
    }
}
