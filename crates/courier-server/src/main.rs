use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use courier_api::state::AppStateInner;
use courier_gateway::registry::GroupRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("COURIER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("COURIER_DB_PATH").unwrap_or_else(|_| "courier.db".into());
    let upload_dir = std::env::var("COURIER_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
    let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("COURIER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(courier_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let state = Arc::new(AppStateInner {
        db,
        registry: GroupRegistry::new(),
        jwt_secret,
        upload_dir: PathBuf::from(upload_dir),
    });

    let app = courier_server::app(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
