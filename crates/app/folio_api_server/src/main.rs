//! Folio auth API server binary.

use std::sync::Arc;

use clap::Parser;
use folio_api::config::ApiConfig;
use folio_api::services::auth::build_session_service;
use folio_core::auth::memory::{MemoryCredentialStore, MemoryRefreshTokenStore};
use folio_core::auth::queries::{PgCredentialStore, PgRefreshTokenStore};
use folio_core::auth::store::{CredentialStore, RefreshTokenStore};
use folio_core::models::auth::Role;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "folio_api_server", about = "Folio auth API server")]
struct Args {
    /// Port to listen on. Overrides `BIND_ADDR` when set.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/folio"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users and sessions in memory instead of PostgreSQL (lost on exit).
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Email of an admin account to create at startup if missing.
    #[arg(long, env = "ADMIN_EMAIL")]
    admin_email: Option<String>,

    /// Password for the seeded admin account.
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
                tracing_subscriber::EnvFilter::try_new("info,folio_api=debug,folio_core=debug")
            })?,
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.pg_connection_url = args.database_url.clone();
    if let Some(port) = args.port {
        config.bind_addr = format!("127.0.0.1:{port}");
    }

    let (credentials, refresh_tokens): (Arc<dyn CredentialStore>, Arc<dyn RefreshTokenStore>) =
        if args.in_memory {
            warn!("using in-memory stores; all users and sessions are lost on exit");
            (
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(MemoryRefreshTokenStore::new()),
            )
        } else {
            info!(
                database_url = %args.database_url,
                max_connections = args.max_connections,
                "configuring connection pool"
            );
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(config.session.store_timeout)
                .connect(&args.database_url)
                .await?;

            info!("running database migrations");
            folio_api::migrate(&pool).await?;

            (
                Arc::new(PgCredentialStore::new(pool.clone())),
                Arc::new(PgRefreshTokenStore::new(pool)),
            )
        };

    if config.reset_webhook_url.is_none() {
        warn!("RESET_WEBHOOK_URL not set; password reset links will only be logged");
    }

    let session = Arc::new(build_session_service(&config, credentials, refresh_tokens));

    if let (Some(email), Some(password)) = (&args.admin_email, &args.admin_password) {
        let admin = session.ensure_user(email, password, None, Role::Admin).await?;
        if admin.role != Role::Admin {
            warn!(user_id = %admin.id, "seed admin email belongs to a non-admin account");
        }
    }

    let state = folio_api::AppState {
        session,
        config: config.clone(),
    };
    let app = folio_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
