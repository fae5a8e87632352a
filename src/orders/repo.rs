use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Order, OrderRow, OrderStatus};
use crate::error::StoreError;

#[async_trait]
pub trait OrderRepo: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;
    /// All orders, newest first.
    async fn list(&self) -> Result<Vec<Order>, StoreError>;
    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Option<Order>, StoreError>;
}

#[derive(Clone)]
pub struct PgOrderRepo {
    db: PgPool,
}

impl PgOrderRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_order(row: OrderRow) -> Result<Order, StoreError> {
    Order::try_from(row).map_err(|e| StoreError::Backend(sqlx::Error::Decode(e.into())))
}

#[async_trait]
impl OrderRepo for PgOrderRepo {
    async fn insert(&self, o: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_name, total_price, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(o.id)
        .bind(&o.customer_name)
        .bind(o.total_price)
        .bind(o.status.as_str())
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| StoreError::on_insert(e, "id"))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_name, total_price, status, created_at, updated_at
            FROM orders
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(into_order).collect()
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE orders
               SET status = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, customer_name, total_price, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.db)
        .await?;
        row.map(into_order).transpose()
    }
}
