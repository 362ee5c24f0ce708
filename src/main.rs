//! pasv-ftp server - Entry Point
//!
//! Serves USER/PASS login, PORT/PASV data channels and LIST/RETR/STOR.

use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use pasv_ftp::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default filter
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Launching FTP server...");

    // Optional first argument: path to a config file
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => ServerConfig::load_from(Some(&path)),
        None => ServerConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::from_config(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    ExitCode::SUCCESS
}
