use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Product;
use crate::error::StoreError;

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn insert(&self, product: &Product) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<Product>, StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    /// Writes every field of `product`; `None` if it no longer exists.
    async fn update(&self, product: &Product) -> Result<Option<Product>, StoreError>;
    /// Returns the removed product, if there was one.
    async fn delete(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
}

#[derive(Clone)]
pub struct PgProductRepo {
    db: PgPool,
}

impl PgProductRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepo for PgProductRepo {
    async fn insert(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, quantity, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.quantity)
        .bind(&p.image_url)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| StoreError::on_insert(e, "id"))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, quantity, image_url, created_at, updated_at
            FROM products
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, quantity, image_url, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, p: &Product) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name = $2, description = $3, price = $4, quantity = $5,
                   image_url = $6, updated_at = now()
             WHERE id = $1
            RETURNING id, name, description, price, quantity, image_url, created_at, updated_at
            "#,
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.quantity)
        .bind(&p.image_url)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            DELETE FROM products
             WHERE id = $1
            RETURNING id, name, description, price, quantity, image_url, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
pub mod memory {
    use async_trait::async_trait;
    use time::OffsetDateTime;
    use tokio::sync::RwLock;
    use uuid::Uuid;

    use super::ProductRepo;
    use crate::error::StoreError;
    use crate::products::repo_types::Product;

    #[derive(Default)]
    pub struct MemoryProductRepo {
        rows: RwLock<Vec<Product>>,
    }

    #[async_trait]
    impl ProductRepo for MemoryProductRepo {
        async fn insert(&self, product: &Product) -> Result<(), StoreError> {
            let mut rows = self.rows.write().await;
            if rows.iter().any(|p| p.id == product.id) {
                return Err(StoreError::DuplicateKey("id"));
            }
            rows.push(product.clone());
            Ok(())
        }

        async fn list(&self) -> Result<Vec<Product>, StoreError> {
            Ok(self.rows.read().await.clone())
        }

        async fn find(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
            Ok(self.rows.read().await.iter().find(|p| p.id == id).cloned())
        }

        async fn update(&self, product: &Product) -> Result<Option<Product>, StoreError> {
            let mut rows = self.rows.write().await;
            let Some(slot) = rows.iter_mut().find(|p| p.id == product.id) else {
                return Ok(None);
            };
            *slot = Product {
                created_at: slot.created_at,
                updated_at: OffsetDateTime::now_utc(),
                ..product.clone()
            };
            Ok(Some(slot.clone()))
        }

        async fn delete(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
            let mut rows = self.rows.write().await;
            let idx = rows.iter().position(|p| p.id == id);
            Ok(idx.map(|i| rows.remove(i)))
        }
    }
}
