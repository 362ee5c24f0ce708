//! pasv-ftp client - Entry Point
//!
//! Usage: `pasv-ftp-client [HOST:PORT] [SCRIPT]`. Without a script,
//! commands are read from stdin.

use log::error;
use std::path::Path;
use std::process::ExitCode;

use pasv_ftp::client::{CommandSource, ScriptSource, Shell, StdinSource};
use pasv_ftp::{ClientConfig, FtpClient, FtpError};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut args = std::env::args().skip(1);
    if let Some(address) = args.next() {
        config.server_address = address;
    }
    let script = args.next();

    match run(config, script.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ClientConfig, script: Option<&str>) -> Result<(), FtpError> {
    let mut source: Box<dyn CommandSource> = match script {
        Some(path) => Box::new(ScriptSource::from_file(Path::new(path)).await?),
        None => Box::new(StdinSource::new()),
    };

    let (client, greeting) = FtpClient::connect(&config.server_address).await?;
    println!("{}", greeting);

    let mut client = client
        .with_data_timeout(config.data_timeout())
        .with_buffer_size(config.buffer_size);
    client.set_passive(config.passive);

    let mut shell = Shell::new(config.local_dir_path(), tokio::io::stdout());
    shell.run(client, source.as_mut()).await
}
