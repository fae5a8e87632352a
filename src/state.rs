use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::auth::password::Passwords;
use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::orders::repo::{OrderRepo, PgOrderRepo};
use crate::products::repo::{PgProductRepo, ProductRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub passwords: Arc<Passwords>,
    pub users: Arc<dyn UserRepo>,
    pub products: Arc<dyn ProductRepo>,
    pub orders: Arc<dyn OrderRepo>,
}

impl AppState {
    /// Loads configuration, connects to Postgres and applies migrations.
    /// Any failure here is fatal for the process.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        info!("database ready");

        let cost = config.auth.hash_cost;
        let passwords = tokio::task::spawn_blocking(move || Passwords::new(&cost))
            .await
            .context("password hasher task failed")?
            .context("build password hasher")?;

        Ok(Self {
            config,
            passwords: Arc::new(passwords),
            users: Arc::new(PgUserRepo::new(db.clone())),
            products: Arc::new(PgProductRepo::new(db.clone())),
            orders: Arc::new(PgOrderRepo::new(db)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        use crate::auth::repo::memory::MemoryUserRepo;
        use crate::config::{AuthConfig, JwtConfig, ServerConfig};
        use crate::orders::repo::memory::MemoryOrderRepo;
        use crate::products::repo::memory::MemoryProductRepo;
        use crate::testing::TEST_HASH_COST;

        let config = Arc::new(AppConfig {
            database_url: "postgres://unused".into(),
            database_max_connections: 1,
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            auth: AuthConfig {
                login_role: crate::auth::Role::Admin,
                hash_cost: TEST_HASH_COST,
            },
        });

        Self {
            config,
            passwords: Arc::new(Passwords::new(&TEST_HASH_COST).expect("test cost is valid")),
            users: Arc::new(MemoryUserRepo::default()),
            products: Arc::new(MemoryProductRepo::default()),
            orders: Arc::new(MemoryOrderRepo::default()),
        }
    }
}
