// SPDX-License-Identifier: MIT

use std::sync::Arc;
use stride_tracker::config::Config;
use stride_tracker::db::Db;
use stride_tracker::routes::create_router;
use stride_tracker::services::{ImportService, PlanService, StravaService, TokenCipher};
use stride_tracker::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env()?;
    let db = Db::connect(&config.database_url).await?;

    let cipher = TokenCipher::new(config.token_encryption_key);
    let strava_service = StravaService::new(&config, db.clone(), cipher);
    let import_service = ImportService::new(strava_service.clone(), db.clone());
    let plan_service = PlanService::new(db.clone());

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        db,
        strava_service,
        import_service,
        plan_service,
    });

    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "Stride-Tracker API listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,stride_tracker=debug".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
