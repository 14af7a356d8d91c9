use department_selection_backend::error::AppError;
use department_selection_backend::telemetry::setup_telemetry;
use department_selection_backend::{run_server, AppState};
use department_selection_config::get_config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    setup_telemetry();

    info!("starting up server...");
    let config = get_config()?;
    let listen_address = config.listen_address;
    let state = AppState::from_config(config).await?;

    run_server(listen_address, state).await?.await
}
