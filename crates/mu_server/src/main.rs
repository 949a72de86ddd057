//! Mu API server entry point.

use log::error;
use mu_core::{init_logging, Config};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("mu_server: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&config.log.clone().with_stderr_echo(true)) {
        eprintln!("mu_server: {err}");
        return ExitCode::FAILURE;
    }

    match mu_server::start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=http status=error error={err}");
            eprintln!("mu_server: {err}");
            ExitCode::FAILURE
        }
    }
}
