use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use turps_api::auth::{AppState, AppStateInner};
use turps_api::config::Config;
use turps_api::oauth::GoogleOAuth;
use turps_api::router;
use turps_api::session::{self, SessionManager};
use turps_db::Database;

/// How often expired sessions and OAuth states are pruned.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turps=debug,turps_api=debug,turps_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let google = match &config.google {
        Some(google) => Some(GoogleOAuth::new(google)?),
        None => {
            warn!("Google sign-in disabled: GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set");
            None
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        sessions: SessionManager::new(
            &config.session_secret,
            config.session_ttl_hours,
            config.secure_cookies,
        )?,
        google,
    });

    tokio::spawn(session::run_sweep_loop(db, SWEEP_INTERVAL));

    let app = router::build(state, &config.static_dir);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Turps listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
