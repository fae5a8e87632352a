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
    dto::{CreateProductRequest, MessageResponse, UpdateProductRequest},
    repo_types::Product,
};
use crate::{
    auth::{guard::Identity, protect, Role},
    error::AppError,
    state::AppState,
};

pub fn read_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product));
    protect(state, routes, Role::Viewer)
}

pub fn write_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product));
    protect(state, routes, Role::Staff)
}

fn not_found() -> AppError {
    AppError::NotFound("Product not found".into())
}

fn product_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    id.map(|Path(id)| id)
        .map_err(|_| AppError::NotFound("Product not found (invalid ID format)".into()))
}

fn check_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation("Price must be a non-negative number".into()));
    }
    Ok(price)
}

fn check_quantity(quantity: i64) -> Result<i64, AppError> {
    if quantity < 0 {
        return Err(AppError::Validation("Quantity must not be negative".into()));
    }
    Ok(quantity)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CreateProductRequest {
    fn into_product(self) -> Result<Product, AppError> {
        let (Some(name), Some(price), Some(quantity)) =
            (non_blank(self.name), self.price, self.quantity)
        else {
            return Err(AppError::Validation(
                "Name, price, and quantity are required".into(),
            ));
        };
        let now = OffsetDateTime::now_utc();
        Ok(Product {
            id: Uuid::new_v4(),
            name,
            description: self.description.map(|d| d.trim().to_string()),
            price: check_price(price)?,
            quantity: check_quantity(quantity)?,
            image_url: non_blank(self.image_url),
            created_at: now,
            updated_at: now,
        })
    }
}

impl UpdateProductRequest {
    fn apply(self, mut product: Product) -> Result<Product, AppError> {
        if let Some(name) = non_blank(self.name) {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = Some(description.trim().to_string());
        }
        if let Some(price) = self.price {
            product.price = check_price(price)?;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = check_quantity(quantity)?;
        }
        if let Some(image_url) = self.image_url {
            product.image_url = non_blank(Some(image_url));
        }
        Ok(product)
    }
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let Json(payload) = payload?;
    let product = payload.into_product()?;
    state.products.insert(&product).await?;
    info!(product_id = %product.id, actor = %identity.user_id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list().await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Product>, AppError> {
    let id = product_id(id)?;
    let product = state.products.find(id).await?.ok_or_else(not_found)?;
    Ok(Json(product))
}

#[instrument(skip(state, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    identity: Identity,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<Product>, AppError> {
    let id = product_id(id)?;
    let Json(payload) = payload?;
    let current = state.products.find(id).await?.ok_or_else(not_found)?;
    let changed = payload.apply(current)?;
    let saved = state.products.update(&changed).await?.ok_or_else(not_found)?;
    info!(product_id = %saved.id, actor = %identity.user_id, "product updated");
    Ok(Json(saved))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    identity: Identity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = product_id(id)?;
    let removed = state.products.delete(id).await?.ok_or_else(not_found)?;
    info!(product_id = %removed.id, actor = %identity.user_id, "product removed");
    Ok(Json(MessageResponse {
        message: "Product removed".into(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::testing::{send, token_for};
    use crate::{app::build_app, auth::Role, state::AppState};

    #[tokio::test]
    async fn product_crud_flow() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Staff);

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "name": " Mug ", "price": 9.5, "quantity": 3, "description": "Ceramic" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Mug");
        assert_eq!(created["quantity"], 3);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, list) = send(&app, Method::GET, "/api/products", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/products/{id}"),
            Some(&token),
            Some(json!({ "price": 12.0, "name": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"], 12.0);
        assert_eq!(updated["name"], "Mug");
        assert_eq!(updated["description"], "Ceramic");

        let uri = format!("/api/products/{id}");
        let (status, body) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Product removed");

        let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Admin);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "name": "Mug", "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name, price, and quantity are required");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "name": "Mug", "price": -1.0, "quantity": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Viewer);
        let (status, body) =
            send(&app, Method::GET, "/api/products/not-a-uuid", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("invalid ID"));
    }

    #[tokio::test]
    async fn viewer_reads_but_cannot_write() {
        let state = AppState::in_memory();
        let app = build_app(state.clone());
        let token = token_for(&state, Role::Viewer);

        let (status, _) = send(&app, Method::GET, "/api/products", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "name": "Mug", "price": 1.0, "quantity": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn products_require_a_token() {
        let app = build_app(AppState::in_memory());
        let (status, _) = send(&app, Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/products",
            None,
            Some(json!({ "name": "Mug", "price": 1.0, "quantity": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
