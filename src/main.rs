use std::{net::TcpListener, process::ExitCode, time::Duration};

use clap::Parser;
use thiserror::Error;

use expensedb::{
    api,
    config::{CliArgs, Config},
    service::ExpenseService,
    storage::{open_storage, StorageError},
    supervisor::{shutdown_signal, Supervisor, SupervisorError},
    telemetry,
};

#[derive(Debug, Error)]
enum StartupError {
    #[error("no database URL configured; set DATABASE_URL or [database] url")]
    MissingDatabaseUrl,
    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
    #[error("can't open storage: {0}")]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    telemetry::init_tracing(&config.logging);

    match run(&config) {
        Ok(()) => {
            tracing::info!("stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), StartupError> {
    if let Ok(port) = std::env::var("PORT") {
        tracing::info!(
            port = %port,
            listen_port = config.server.port,
            "PORT is informational only"
        );
    }

    let url = config
        .database
        .url
        .as_deref()
        .ok_or(StartupError::MissingDatabaseUrl)?;
    let scheme = url.split(':').next().unwrap_or_default();
    tracing::info!(scheme, "opening storage");

    // The postgres client owns a runtime of its own; it is created and dropped
    // outside of ours.
    let storage = open_storage(url)?;
    let listener = TcpListener::bind(config.listen_addr()?)?;
    let runtime = tokio::runtime::Runtime::new()?;

    let service = ExpenseService::new(storage.clone());
    let supervisor = Supervisor::new(config.drain_timeout());
    let result = runtime.block_on(async {
        let app = api::router(service, telemetry::init_metrics());
        supervisor.serve(listener, app, shutdown_signal()).await
    });

    runtime.shutdown_timeout(Duration::from_secs(1));
    drop(storage);
    Ok(result?)
}
