// src/bin/api_server.rs

use scent_data_core::app::{AuthService, DatabaseService, SessionService, UserService};
use scent_data_core::crypto::PasswordCipher;
use scent_data_core::infra::config::{self, CryptoConfig, SessionConfig};
use scent_data_core::transport;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    // --- Configuration ---
    let crypto = CryptoConfig::from_env()?;
    let cipher = PasswordCipher::new(&crypto)
        .map_err(|e| anyhow::anyhow!("CRYPTO_KEY rejected: {}", e))?;
    info!(?crypto, "crypto configuration loaded");
    let session = SessionConfig::from_env()?;
    let sessions = SessionService::new(&session)
        .map_err(|e| anyhow::anyhow!("SESSION_SECRET rejected: {}", e))?;
    info!(?session, "session configuration loaded");

    // --- Service Initialization ---
    info!("initializing DatabaseService");
    let db_service = DatabaseService::connect_from_env().await?;
    db_service.ensure_schema().await?;

    let users = UserService::new(db_service.repository(), cipher.clone());
    let auth = AuthService::new(
        db_service.repository(),
        db_service.repository(),
        cipher,
        config::forgot_password_code_duration_minutes(),
    );
    let app_state = transport::http::AppState {
        db_service,
        users,
        auth,
        sessions,
    };
    info!("services initialized");

    // --- API Server Initialization ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()),
        )
        .layer(cors);

    let bind_addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening (Swagger UI at /swagger-ui)");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "server stopped with an error");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
