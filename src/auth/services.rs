use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::{
        password::Passwords,
        repo::UserRepo,
        repo_types::{Role, User, UserChanges},
    },
    error::{AppError, StoreError},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn check_password_len(plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

/// Result of checking a login attempt. Callers must report both failure
/// cases identically.
#[derive(Debug)]
pub enum Verification {
    Verified(User),
    UnknownEmail,
    WrongPassword(Uuid),
}

/// Credential store: registration, password verification and account updates.
#[derive(Clone)]
pub struct Credentials {
    users: Arc<dyn UserRepo>,
    passwords: Arc<Passwords>,
}

impl FromRef<AppState> for Credentials {
    fn from_ref(state: &AppState) -> Self {
        Credentials::new(state.users.clone(), state.passwords.clone())
    }
}

impl Credentials {
    pub fn new(users: Arc<dyn UserRepo>, passwords: Arc<Passwords>) -> Self {
        Self { users, passwords }
    }

    pub async fn register(&self, email: &str, plain: &str, role: Role) -> Result<User, AppError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::Validation("Please fill a valid email address".into()));
        }
        check_password_len(plain)?;

        let password_hash = self.hash_blocking(plain.to_owned()).await?;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        };

        match self.users.insert(&user).await {
            Ok(()) => {}
            Err(StoreError::DuplicateKey(_)) => {
                return Err(AppError::DuplicateKey("Email already in use.".into()))
            }
            Err(e) => return Err(e.into()),
        }
        info!(user_id = %user.id, %role, "user created");
        Ok(user)
    }

    /// Looks the account up and checks the password. Performs no writes.
    pub async fn check(&self, email: &str, plain: &str) -> Result<Verification, AppError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            // Same cost as a wrong password.
            let dummy = self.passwords.dummy_hash().to_owned();
            self.verify_blocking(plain.to_owned(), dummy).await?;
            return Ok(Verification::UnknownEmail);
        };
        if self
            .verify_blocking(plain.to_owned(), user.password_hash.clone())
            .await?
        {
            Ok(Verification::Verified(user))
        } else {
            Ok(Verification::WrongPassword(user.id))
        }
    }

    pub async fn verify(&self, email: &str, plain: &str) -> Result<Option<User>, AppError> {
        Ok(match self.check(email, plain).await? {
            Verification::Verified(user) => Some(user),
            Verification::UnknownEmail | Verification::WrongPassword(_) => None,
        })
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.find_by_id(id).await?)
    }

    /// Replaces the password and/or role. The hash is recomputed only when a
    /// new password is supplied.
    pub async fn update(
        &self,
        id: Uuid,
        new_password: Option<&str>,
        role: Option<Role>,
    ) -> Result<User, AppError> {
        let password_hash = match new_password {
            Some(plain) => {
                check_password_len(plain)?;
                Some(self.hash_blocking(plain.to_owned()).await?)
            }
            None => None,
        };
        let changes = UserChanges {
            password_hash,
            role,
        };
        let user = self
            .users
            .update(id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        debug!(user_id = %id, password_changed = changes.password_hash.is_some(), "user updated");
        Ok(user)
    }

    async fn hash_blocking(&self, plain: String) -> anyhow::Result<String> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.hash(&plain))
            .await
            .context("hash task failed")?
    }

    async fn verify_blocking(&self, plain: String, hash: String) -> anyhow::Result<bool> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.verify(&plain, &hash))
            .await
            .context("verify task failed")?
    }
}
