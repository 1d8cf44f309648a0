use std::process::ExitCode;

use log::{error, info};

use atmos::app_state;
use atmos_core::config::Config;

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Ok(path) = dotenv {
        info!("Loaded {}", path.display());
    }
    info!("Starting atmos {}", env!("CARGO_PKG_VERSION"));

    let result = Config::from_env()
        .map_err(app_state::AppError::from)
        .and_then(|config| app_state::run(&config));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
