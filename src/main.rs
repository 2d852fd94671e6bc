use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use orthodoc::api::server;
use orthodoc::db;
use orthodoc::pipeline::llm::OpenAiClient;
use orthodoc::settings::{Settings, APP_NAME, APP_VERSION};
use orthodoc::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::from_env();
    tracing::info!(name = APP_NAME, version = APP_VERSION, "Starting");

    let conn = match db::open_database(Path::new(settings.database_path())) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open database");
            std::process::exit(1);
        }
    };
    if let Err(e) = db::seeds::seed_cdt_data(&conn) {
        tracing::error!(error = %e, "Failed to seed CDT data");
        std::process::exit(1);
    }

    let llm = Arc::new(OpenAiClient::from_settings(&settings));
    let state = Arc::new(AppState::new(settings, conn, llm));

    if let Err(e) = server::serve(state).await {
        tracing::error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}
