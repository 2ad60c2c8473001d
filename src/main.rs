// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use memvault::auth::{AuthError, AuthPhase};
use memvault::backend::{BackendError, HttpAccessBackend};
use memvault::config::{Config, ConfigError};
use memvault::logging::{init_tracing, LogFormat};
use memvault::state::VaultContext;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(LogFormat::from_env()) {
        eprintln!("failed to initialise logging: {e}");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "memvault exited with error");
            ExitCode::FAILURE
        }
    }
}

/// `record_id:display_name`
fn parse_record_arg(arg: &str) -> Option<(String, String)> {
    let (id, name) = arg.split_once(':')?;
    let (id, name) = (id.trim(), name.trim());
    (!id.is_empty() && !name.is_empty()).then(|| (id.to_string(), name.to_string()))
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let records: Vec<(String, String)> = std::env::args()
        .skip(1)
        .filter_map(|arg| {
            let parsed = parse_record_arg(&arg);
            if parsed.is_none() {
                warn!(argument = %arg, "Ignoring argument, expected record_id:display_name");
            }
            parsed
        })
        .collect();

    let ctx = VaultContext::from_config(config);
    let shutdown = CancellationToken::new();

    let sweeper = tokio::spawn(ctx.sweeper().run(shutdown.clone()));

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                ctrl_c.cancel();
            }
            Err(e) => warn!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });

    let mut phases = ctx.authenticator.subscribe();
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = phases.borrow_and_update().clone();
            if let AuthPhase::AwaitingCallback { callback_url, .. } = phase {
                println!("Open {callback_url} in a browser with your wallet extension to sign in.");
            }
        }
    });

    match ctx.sign_in(&shutdown).await {
        Ok(session) => {
            println!("Signed in as {}", session.address);
            unlock_records(&ctx, &records).await?;
            println!("Press Ctrl-C to lock everything and exit.");
            shutdown.cancelled().await;
        }
        Err(AuthError::Cancelled) => info!("Sign-in cancelled"),
        Err(e) => {
            shutdown.cancel();
            let _ = sweeper.await;
            return Err(e.into());
        }
    }

    shutdown.cancel();
    let cleared = ctx.sign_out();
    println!("Locked {cleared} record(s).");
    let _ = sweeper.await;
    Ok(())
}

async fn unlock_records(ctx: &VaultContext, records: &[(String, String)]) -> Result<(), AppError> {
    if records.is_empty() {
        return Ok(());
    }
    let Some(url) = ctx.config.backend_url.as_deref() else {
        warn!("MEMVAULT_BACKEND_URL is not set, skipping unlock");
        return Ok(());
    };

    let service = ctx.unlock_service(HttpAccessBackend::new(url)?);
    for (record_id, display_name) in records {
        match service.unlock(record_id, display_name).await {
            Ok(record) => println!("Unlocked {} until {}", record.uri, record.expires_at),
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Unlock failed");
                eprintln!("{display_name}: {}", e.user_message());
            }
        }
    }

    if let Ok(entries) = ctx.vfs.read_directory("memvault:/") {
        for entry in entries {
            info!(record = %entry.name, "Unlocked record available");
        }
    }
    Ok(())
}
