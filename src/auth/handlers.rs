use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, FromRef, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, CredentialsRequest, PublicUser, UpdateUserRequest},
        guard::{protect, Identity},
        jwt::JwtKeys,
        repo_types::Role,
        services::{Credentials, Verification},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn account_routes(state: &AppState) -> Router<AppState> {
    let me = protect(state, Router::new().route("/auth/me", get(get_me)), Role::Viewer);
    let users = protect(
        state,
        Router::new().route("/users/:id", patch(update_user)),
        Role::Admin,
    );
    me.merge(users)
}

fn missing_credentials() -> AppError {
    AppError::Validation("Please provide email and password".into())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    let (email, password) = payload.into_parts().ok_or_else(missing_credentials)?;

    let creds = Credentials::from_ref(&state);
    let user = match creds.register(&email, &password, Role::Admin).await {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "registration rejected");
            return Err(e);
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.issue(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: Some("Admin registered successfully".into()),
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let (email, password) = payload.into_parts().ok_or_else(missing_credentials)?;

    let creds = Credentials::from_ref(&state);
    let user = match creds.check(&email, &password).await? {
        Verification::Verified(u) => u,
        Verification::UnknownEmail => {
            warn!(email = %email.trim(), "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
        Verification::WrongPassword(user_id) => {
            warn!(%user_id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }
    };

    let required = state.config.auth.login_role;
    if !user.role.grants(required) {
        warn!(user_id = %user.id, role = %user.role, "login below panel role");
        return Err(AppError::Forbidden("Not authorized as an admin".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.issue(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        message: None,
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<PublicUser>, AppError> {
    let user = Credentials::from_ref(&state)
        .find(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    identity: Identity,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let Path(id) = id.map_err(|_| AppError::NotFound("User not found (invalid ID format)".into()))?;
    let Json(payload) = payload?;
    if payload.password.is_none() && payload.role.is_none() {
        return Err(AppError::Validation("Provide a password or a role to update".into()));
    }

    let user = Credentials::from_ref(&state)
        .update(id, payload.password.as_deref(), payload.role)
        .await?;

    info!(actor = %identity.user_id, user_id = %user.id, role = %user.role, "user updated");
    Ok(Json(PublicUser::from(&user)))
}
