// src/config.rs

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{store::LedgerStore, PgLedgerStore},
    services::{
        auth::AuthService,
        notification_service::{LogMailer, OutboxDispatcher},
        DashboardService, LedgerService, NotificationService,
    },
};

const OUTBOX_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub reminder_interval: Duration,
    pub reminder_after: chrono::Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:3000")
            .parse()
            .context("BIND_ADDR inválido")?;
        let db_max_connections = env_or("DB_MAX_CONNECTIONS", "5")
            .parse()
            .context("DB_MAX_CONNECTIONS deve ser um número")?;
        let reminder_secs: u64 = env_or("REMINDER_INTERVAL_SECS", "3600")
            .parse()
            .context("REMINDER_INTERVAL_SECS deve ser um número")?;
        let reminder_days: i64 = env_or("REMINDER_AFTER_DAYS", "3")
            .parse()
            .context("REMINDER_AFTER_DAYS deve ser um número")?;

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            db_max_connections,
            reminder_interval: Duration::from_secs(reminder_secs),
            reminder_after: chrono::Duration::days(reminder_days),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub ledger_service: LedgerService,
    pub dashboard_service: DashboardService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(db_pool.clone()));

        let (outbox, _worker) = OutboxDispatcher::start(Arc::new(LogMailer), OUTBOX_BUFFER);
        let notification_service = NotificationService::new(store.clone(), Arc::new(outbox));

        Ok(Self {
            auth_service: AuthService::new(store.clone(), config.jwt_secret.clone()),
            ledger_service: LedgerService::new(store.clone(), notification_service.clone()),
            dashboard_service: DashboardService::new(store.clone()),
            notification_service,
            db_pool,
        })
    }
}
