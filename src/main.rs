use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::Arc;

use dcabot::api::{run_server, AppState};
use dcabot::cli::Cli;
use dcabot::constants::api::TRIGGER_TOKEN_ENV;
use dcabot::events::{RunResponse, TriggerEvent};
use dcabot::services::runner::{self, connect_live};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Setup Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::parse_args(std::env::args()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let mut settings = cli.to_settings();
    if let Some(path) = &cli.event {
        match TriggerEvent::from_file(path) {
            Ok(event) => settings = settings.with_event(&event),
            Err(e) => return finish(Err(e)),
        }
    }

    if let Some(addr) = &cli.serve {
        info!("Starting DCA trigger server...");
        let token = std::env::var(TRIGGER_TOKEN_ENV).unwrap_or_default();
        let state = match AppState::new(settings, token) {
            Ok(state) => Arc::new(state),
            Err(e) => return finish(Err(e)),
        };
        return match run_server(state, addr).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("❌ Server error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut input = BufReader::new(io::stdin());
    let mut output = io::stdout();
    let result = runner::run(&settings, &mut input, &mut output, connect_live).await;
    finish(result)
}

fn finish(result: dcabot::error::RunResult<RunResponse>) -> ExitCode {
    match result {
        Ok(response) => {
            println!("{}", response.to_json());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ {}", e);
            println!("{}", RunResponse::failure(&e).to_json());
            ExitCode::from(e.exit_code())
        }
    }
}
