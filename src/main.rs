use clap::error::ErrorKind;
use dev_server::{ConfigError, HttpServer, ServerConfig, ServerError, logger, signal};
use log::{error, info, warn};
use std::process::ExitCode;

const LEGACY_USAGE: &str = "Usage: dev-server [PORT] [DIRECTORY] [HOST]\n       dev-server [--port <PORT>] [--directory <DIRECTORY>] [--host <HOST>]";

fn main() -> ExitCode {
    logger::init();

    let config = match ServerConfig::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Usage(err)) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!("{}", LEGACY_USAGE);
            return ExitCode::FAILURE;
        }
    };
    info!("Starting dev server with config: {:?}", config);

    let stop = match signal::install() {
        Ok(stop) => stop,
        Err(e) => {
            eprintln!("Error: cannot install signal handlers: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match HttpServer::bind(&config) {
        Ok(server) => server,
        Err(err @ ServerError::AddrInUse { .. }) => {
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
        Err(err) => {
            error!("Startup failed: {:?}", err);
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let port = match server.local_addr() {
        Ok(addr) => addr.port(),
        Err(e) => {
            warn!("Cannot read bound address, reporting configured port: {}", e);
            config.port
        }
    };
    let display_host = match config.host.as_str() {
        "0.0.0.0" | "::" | "" => "localhost",
        host => host,
    };
    println!(
        "Serving directory '{}' at http://{}:{}/",
        server.root().display(),
        display_host,
        port
    );
    println!("Press Ctrl+C to stop the server");

    server.run(stop);

    println!("\nServer stopped.");
    ExitCode::SUCCESS
}
