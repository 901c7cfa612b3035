/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use clap::Parser;
use pfcpiface::{Config, ConfigError, IfaceError, IpCommandHostNetwork, PfcpIface};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const COMPONENT: &str = "agent";

#[derive(Parser)]
#[command(version, about = "UPF control interface agent")]
struct AgentArgs {
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

#[derive(Debug, Error)]
enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Iface(#[from] IfaceError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

async fn run(args: AgentArgs) -> Result<(), AgentError> {
    let config = Config::load(&args.config)?;
    info!(
        component = COMPONENT,
        config = %args.config.display(),
        mode = ?config.mode,
        "configuration loaded"
    );

    let iface = PfcpIface::new(config, Arc::new(IpCommandHostNetwork::new())).await?;
    let shutdown = CancellationToken::new();

    let serving = iface.run(shutdown.clone());
    tokio::pin!(serving);

    tokio::select! {
        result = &mut serving => return result.map_err(AgentError::from),
        signal = shutdown_signal() => {
            signal?;
            info!(component = COMPONENT, "shutdown requested");
        }
    }

    shutdown.cancel();
    serving.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run(AgentArgs::parse()).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(component = COMPONENT, err = %err, "pfcpiface agent failed");
            std::process::ExitCode::FAILURE
        }
    }
}
