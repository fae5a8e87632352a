use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::{self, Next},
    response::Response,
    Router,
};
use jsonwebtoken::errors::ErrorKind;
use tracing::warn;
use uuid::Uuid;

use super::{claims::Claims, jwt::JwtKeys, repo_types::Role};
use crate::{error::AppError, state::AppState};

/// Identity the guard attaches to an authorized request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub is_admin: bool,
}

impl From<&Claims> for Identity {
    fn from(c: &Claims) -> Self {
        Self {
            user_id: c.sub,
            role: c.role,
            is_admin: c.is_admin,
        }
    }
}

fn unauthorized(msg: &str) -> AppError {
    AppError::Unauthorized(msg.to_string())
}

/// Pulls the token out of `Bearer <token>`; the scheme is matched case-insensitively.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects the request with 401 unless it carries a valid, unexpired token.
pub async fn access_guard(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Not authorized, no token"))?
        .to_str()
        .map_err(|_| unauthorized("Not authorized, malformed Authorization header"))?;

    let token = bearer_token(header)
        .ok_or_else(|| unauthorized("Not authorized, expected Bearer token"))?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        match e.kind() {
            ErrorKind::ExpiredSignature => unauthorized("Not authorized, token expired"),
            _ => unauthorized("Not authorized, token failed"),
        }
    })?;

    req.extensions_mut().insert(Identity::from(&claims));
    Ok(next.run(req).await)
}

/// Rejects with 403 when the guarded identity's role does not grant `required`.
pub async fn require_role(required: Role, req: Request, next: Next) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .copied()
        .ok_or_else(|| unauthorized("Not authorized, no token"))?;

    if !identity.role.grants(required) {
        warn!(user_id = %identity.user_id, role = %identity.role, %required, "role check failed");
        return Err(AppError::Forbidden(format!("Requires {required} role")));
    }
    Ok(next.run(req).await)
}

/// Puts every route of `router` behind the token check and a `required` role check.
pub fn protect(state: &AppState, router: Router<AppState>, required: Role) -> Router<AppState> {
    router
        .route_layer(middleware::from_fn(move |req: Request, next: Next| {
            require_role(required, req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), access_guard))
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .ok_or_else(|| unauthorized("Not authorized, no token"))
    }
}
