use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{debug, error};

use crate::config::HashCost;

const DUMMY_PASSWORD: &str = "storeadmin-dummy";

/// Argon2id hasher configured with the deployment's cost, plus a reference
/// hash that unknown-email logins are verified against so they cost the same
/// as a wrong password.
#[derive(Debug, Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl Passwords {
    /// Fails on parameters Argon2 rejects (for example memory below
    /// `8 * parallelism` KiB). Computes one hash, so call it off the runtime.
    pub fn new(cost: &HashCost) -> anyhow::Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 cost {cost:?}: {e}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;
        debug!(?cost, "password hasher ready");
        Ok(Self { argon2, dummy_hash })
    }

    /// Hashes `plain` with a fresh random salt. The PHC string records the
    /// salt and cost so later verification does not depend on current config.
    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        hash_with(&self.argon2, plain)
    }

    /// Compares in constant time using the cost stored in `hash`.
    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self.argon2.verify_password(plain.as_bytes(), &parsed).is_ok())
    }

    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })
}
