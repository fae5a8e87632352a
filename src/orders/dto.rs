use serde::Deserialize;

/// Body of `POST /orders`, used to enter orders by hand.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_name: Option<String>,
    pub total_price: Option<f64>,
    pub status: Option<String>,
}

/// Body of `PUT /orders/:id/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}
