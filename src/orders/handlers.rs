use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateOrderRequest, UpdateStatusRequest},
    repo_types::{Order, OrderStatus},
};
use crate::{
    auth::{guard::Identity, protect, Role},
    error::AppError,
    state::AppState,
};

pub fn read_routes(state: &AppState) -> Router<AppState> {
    protect(state, Router::new().route("/orders", get(list_orders)), Role::Viewer)
}

pub fn write_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id/status", put(update_order_status));
    protect(state, routes, Role::Staff)
}

fn parse_status(raw: Option<&str>) -> Result<OrderStatus, AppError> {
    raw.and_then(|s| s.parse().ok()).ok_or_else(|| {
        AppError::Validation("Valid status (Pending, Completed, Cancelled) is required.".into())
    })
}

#[instrument(skip(state))]
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list().await?))
}

#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(payload) = payload?;
    let customer_name = payload
        .customer_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let (Some(customer_name), Some(total_price)) = (customer_name, payload.total_price) else {
        return Err(AppError::Validation(
            "Customer name and total price are required.".into(),
        ));
    };
    if !total_price.is_finite() || total_price < 0.0 {
        return Err(AppError::Validation("Total price must be a non-negative number".into()));
    }
    let status = match payload.status.as_deref() {
        None | Some("") => OrderStatus::default(),
        raw => parse_status(raw)?,
    };

    let now = OffsetDateTime::now_utc();
    let order = Order {
        id: Uuid::new_v4(),
        customer_name,
        total_price,
        status,
        created_at: now,
        updated_at: now,
    };
    state.orders.insert(&order).await?;
    info!(order_id = %order.id, actor = %identity.user_id, "order created");
    Ok((StatusCode::CREATED, Json(order)))
}

#[instrument(skip(state, payload))]
pub async fn update_order_status(
    State(state): State<AppState>,
    identity: Identity,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let Path(id) =
        id.map_err(|_| AppError::NotFound("Order not found (invalid ID format)".into()))?;
    let Json(payload) = payload?;
    let status = parse_status(payload.status.as_deref())?;

    let order = state
        .orders
        .set_status(id, status)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    info!(order_id = %order.id, %status, actor = %identity.user_id, "order status updated");
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use uuid::Uuid;

    use crate::testing::{send, token_for};
    use crate::{app::build_app, auth::Role, state::AppState};

    #[tokio::test]
    async fn orders_list_newest_first() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Staff);

        for name in ["Ada", "Grace"] {
            let (status, order) = send(
                &app,
                Method::POST,
                "/api/orders",
                Some(&token),
                Some(json!({ "customerName": name, "totalPrice": 20.0 })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(order["status"], "Pending");
        }

        let (status, list) = send(&app, Method::GET, "/api/orders", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["customerName"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Grace", "Ada"]);
    }

    #[tokio::test]
    async fn status_update_validates_and_applies() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Admin);

        let (_, order) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(json!({ "customerName": "Ada", "totalPrice": 5 })),
        )
        .await;
        let uri = format!("/api/orders/{}/status", order["id"].as_str().unwrap());

        let shipped = json!({ "status": "Shipped" });
        let (status, _) = send(&app, Method::PUT, &uri, Some(&token), Some(shipped)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let completed = json!({ "status": "Completed" });
        let (status, body) = send(&app, Method::PUT, &uri, Some(&token), Some(completed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Completed");

        let missing = format!("/api/orders/{}/status", Uuid::new_v4());
        let cancelled = json!({ "status": "Cancelled" });
        let (status, _) = send(&app, Method::PUT, &missing, Some(&token), Some(cancelled)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_requires_name_and_price() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Staff);
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(json!({ "customerName": "  " , "totalPrice": 3.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Customer name and total price are required.");
    }

    #[tokio::test]
    async fn viewer_cannot_seed_orders() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Viewer);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(json!({ "customerName": "Ada", "totalPrice": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
