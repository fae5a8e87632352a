use anyhow::Context;
use serde::Deserialize;

use crate::auth::Role;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Argon2id cost. Defaults: 19 MiB of memory, 2 passes, 1 lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Minimum role an account needs to log into the panel.
    pub login_role: Role,
    pub hash_cost: HashCost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);

        let server = ServerConfig {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("APP_PORT", 5001),
        };

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "storeadmin".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "storeadmin-panel".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
        };
        anyhow::ensure!(jwt.ttl_minutes > 0, "JWT_TTL_MINUTES must be positive");

        let login_role = match std::env::var("LOGIN_ROLE") {
            Ok(raw) => raw.parse::<Role>().context("LOGIN_ROLE")?,
            Err(_) => Role::Admin,
        };

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: parse_or("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: parse_or("ARGON2_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            server,
            jwt,
            auth: AuthConfig {
                login_role,
                hash_cost,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_missing_or_garbage() {
        assert_eq!(parse_or::<u16>("STOREADMIN_TEST_UNSET_PORT", 5001), 5001);
        std::env::set_var("STOREADMIN_TEST_BAD_TTL", "sixty");
        assert_eq!(parse_or::<i64>("STOREADMIN_TEST_BAD_TTL", 60), 60);
        std::env::set_var("STOREADMIN_TEST_GOOD_TTL", "15");
        assert_eq!(parse_or::<i64>("STOREADMIN_TEST_GOOD_TTL", 60), 15);
    }
}
