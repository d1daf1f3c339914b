// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use anyhow::{Context, Result};
use clap::Parser;
use ksops::{
    grpc::{self, KmsProvider},
    keyservice::{GrpcAddress, KeyServiceInvoker},
    listener::{BridgeListener, ListenAddress},
    BridgeConfig, Cli, KeyDescriptor,
};
use log::{debug, error, info};
use tokio::signal::unix::{signal, Signal, SignalKind};

async fn wait_for_signal(mut interrupt: Signal, mut terminate: Signal) {
    tokio::select! {
        _ = interrupt.recv() => info!("Caught signal: SIGINT. Shutting down."),
        _ = terminate.recv() => info!("Caught signal: SIGTERM. Shutting down."),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = BridgeConfig::try_from(cli).context("invalid configuration")?;
    debug!("ksops configuration: {config:?}");

    let key = KeyDescriptor::try_from(&config.credentials)?;
    info!("Use {} key for sops keyservice requests", key.kind());

    let keyservice: GrpcAddress = config.keyservice.parse()?;
    let listen: ListenAddress = config.listen.parse().context("Invalid server listen address")?;

    // handlers first, a bound unix socket must always reach start_service
    let interrupt = signal(SignalKind::interrupt()).context("install SIGINT handler")?;
    let terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;

    let listener = BridgeListener::bind(&listen).await?;
    info!("Listening on {listen}");

    let provider = KmsProvider::new(key, KeyServiceInvoker::new(keyservice));
    if let Err(e) = grpc::start_service(listener, provider, wait_for_signal(interrupt, terminate)).await {
        error!("failed to serve: {e:?}");
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are printed through the error path as well
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Err(e) = run(cli).await {
        error!("{e:?}");
        std::process::exit(1);
    }
}
