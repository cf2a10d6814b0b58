//! SIWF Gateway Server

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use siwf_auth::{IdentityStore, MemoryIdentityStore, MemoryNonceLedger, NonceLedger, SignInVerifier};
use siwf_server::{
    routes,
    services::{self, PgIdentityStore, PgNonceLedger},
    AppState, Config,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    init_tracing(config.log_json);

    info!("Starting SIWF Gateway Server...");

    let siwf = config.load_siwf_config()?;
    info!(
        domains = ?siwf.policy.allowed_domains,
        chain_id = siwf.policy.chain_id,
        nonce_mode = %siwf.policy.nonce_mode,
        "Configuration loaded"
    );

    let (ledger, identities): (Arc<dyn NonceLedger>, Arc<dyn IdentityStore>) =
        match &config.database_url {
            Some(url) => {
                let db_pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(url)
                    .await
                    .context("Failed to connect to database")?;
                info!("Database connected");

                sqlx::migrate!("./migrations")
                    .run(&db_pool)
                    .await
                    .context("Failed to run database migrations")?;
                info!("Database migrations complete");

                (
                    Arc::new(PgNonceLedger::new(db_pool.clone())),
                    Arc::new(PgIdentityStore::new(db_pool)),
                )
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory ledger, valid for a single instance only");
                (
                    Arc::new(MemoryNonceLedger::new()),
                    Arc::new(MemoryIdentityStore::new()),
                )
            }
        };

    let verifier = SignInVerifier::from_config(&siwf, ledger.clone(), identities)?;
    let _sweeper = services::sweeper::spawn(ledger, config.sweep_interval());
    let app_state = AppState::new(verifier, siwf.session.cookie_name.clone());

    info!("Services initialized");

    let bind_addr = config.bind_addr();
    info!("Starting server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
