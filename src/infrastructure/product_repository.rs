//! Product store
//!
//! `product_link` carries a UNIQUE constraint, so concurrent site workers that
//! discover the same product are serialized by SQLite itself. The crawl path
//! goes through [`ProductRepository::ingest`] (insert or skip, first write
//! wins); everything else is the administrative surface.

#![allow(clippy::uninlined_format_args)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{NewProduct, ProductPatch, ProductRecord};
use crate::infrastructure::errors::{StoreError, StoreResult};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, sizes, colors, image_urls, product_link, scraped_at";

/// Result of one crawl-path ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted { id: i64 },
    /// The link was already stored, nothing was written
    SkippedDuplicate,
    /// Rejected by the database for a reason other than connectivity
    Failed { reason: String },
}

#[derive(Clone)]
pub struct ProductRepository {
    pool: Arc<SqlitePool>,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub const fn from_shared(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    // ===============================
    // CRAWL PATH
    // ===============================

    /// Insert the product unless its link is already stored.
    ///
    /// Connectivity failures come back as `Err(StoreError::Unavailable)` and
    /// must abort the job; any other database refusal is reported as
    /// [`IngestOutcome::Failed`].
    pub async fn ingest(&self, product: &NewProduct) -> StoreResult<IngestOutcome> {
        let encoded = EncodedLists::encode(product.sizes.as_slice(), &product.colors, &product.image_urls)?;

        let result = sqlx::query(
            r#"
            INSERT INTO products
            (name, description, price, sizes, colors, image_urls, product_link, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (product_link) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.map(|p| p.to_string()))
        .bind(encoded.sizes)
        .bind(encoded.colors)
        .bind(encoded.image_urls)
        .bind(&product.product_link)
        .bind(Utc::now())
        .fetch_optional(&*self.pool)
        .await;

        match result {
            Ok(Some(row)) => {
                let id: i64 = row.try_get("id")?;
                debug!("Inserted product {} ({})", id, product.product_link);
                Ok(IngestOutcome::Inserted { id })
            }
            Ok(None) => {
                debug!("Skipped duplicate product {}", product.product_link);
                Ok(IngestOutcome::SkippedDuplicate)
            }
            Err(e) => match StoreError::from(e) {
                err @ StoreError::Unavailable(_) => Err(err),
                err => Ok(IngestOutcome::Failed { reason: err.to_string() }),
            },
        }
    }

    // ===============================
    // ADMINISTRATIVE SURFACE
    // ===============================

    /// Explicit create. A taken `product_link` surfaces as [`StoreError::Conflict`].
    pub async fn create(&self, product: &NewProduct) -> StoreResult<ProductRecord> {
        let encoded = EncodedLists::encode(&product.sizes, &product.colors, &product.image_urls)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products
            (name, description, price, sizes, colors, image_urls, product_link, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.map(|p| p.to_string()))
        .bind(encoded.sizes)
        .bind(encoded.colors)
        .bind(encoded.image_urls)
        .bind(&product.product_link)
        .bind(Utc::now())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| conflict_or(e, &product.product_link))?;

        row_to_record(&row)
    }

    pub async fn get(&self, id: i64) -> StoreResult<ProductRecord> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?
            .ok_or(StoreError::NotFound { id })?;

        row_to_record(&row)
    }

    pub async fn find_by_link(&self, product_link: &str) -> StoreResult<Option<ProductRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE product_link = ?", PRODUCT_COLUMNS))
            .bind(product_link)
            .fetch_optional(&*self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Products ordered by id, `skip` rows skipped, at most `limit` returned
    pub async fn list(&self, skip: i64, limit: i64) -> StoreResult<Vec<ProductRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products ORDER BY id ASC LIMIT ? OFFSET ?",
            PRODUCT_COLUMNS
        ))
        .bind(limit.max(0))
        .bind(skip.max(0))
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Write only the fields present in `patch`
    pub async fn update(&self, id: i64, patch: &ProductPatch) -> StoreResult<ProductRecord> {
        if patch.is_empty() {
            return self.get(id).await;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE products SET ");
        {
            let mut fields = builder.separated(", ");
            if let Some(name) = &patch.name {
                fields.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(description) = &patch.description {
                fields.push("description = ").push_bind_unseparated(description.clone());
            }
            if let Some(price) = patch.price {
                fields.push("price = ").push_bind_unseparated(price.to_string());
            }
            if let Some(sizes) = &patch.sizes {
                fields.push("sizes = ").push_bind_unseparated(serde_json::to_string(sizes)?);
            }
            if let Some(colors) = &patch.colors {
                fields.push("colors = ").push_bind_unseparated(serde_json::to_string(colors)?);
            }
            if let Some(image_urls) = &patch.image_urls {
                fields.push("image_urls = ").push_bind_unseparated(serde_json::to_string(image_urls)?);
            }
            if let Some(link) = &patch.product_link {
                fields.push("product_link = ").push_bind_unseparated(link.clone());
            }
        }
        builder.push(" WHERE id = ").push_bind(id);
        builder.push(" RETURNING ").push(PRODUCT_COLUMNS);

        let link = patch.product_link.clone().unwrap_or_default();
        let row = builder
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| conflict_or(e, &link))?
            .ok_or(StoreError::NotFound { id })?;

        row_to_record(&row)
    }

    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    /// Wipe the table, returns the number of deleted rows
    pub async fn delete_all(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM products").execute(&*self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM products")
            .fetch_one(&*self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }
}

/// JSON text for the list columns
struct EncodedLists {
    sizes: String,
    colors: String,
    image_urls: String,
}

impl EncodedLists {
    fn encode(sizes: &[String], colors: &[String], image_urls: &[String]) -> StoreResult<Self> {
        Ok(Self {
            sizes: serde_json::to_string(sizes)?,
            colors: serde_json::to_string(colors)?,
            image_urls: serde_json::to_string(image_urls)?,
        })
    }
}

fn conflict_or(err: sqlx::Error, product_link: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict {
            product_link: product_link.to_string(),
        },
        _ => StoreError::from(err),
    }
}

fn decode_list(row: &SqliteRow, column: &str) -> StoreResult<Vec<String>> {
    let raw: Option<String> = row.try_get(column)?;
    match raw.as_deref() {
        None | Some("") => Ok(Vec::new()),
        Some(text) => Ok(serde_json::from_str(text)?),
    }
}

fn row_to_record(row: &SqliteRow) -> StoreResult<ProductRecord> {
    let price: Option<String> = row.try_get("price")?;
    let price = price
        .map(|text| {
            Decimal::from_str(&text)
                .map_err(|e| StoreError::Query(format!("invalid stored price '{}': {}", text, e)))
        })
        .transpose()?;
    let scraped_at: DateTime<Utc> = row.try_get("scraped_at")?;

    Ok(ProductRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price,
        sizes: decode_list(row, "sizes")?,
        colors: decode_list(row, "colors")?,
        image_urls: decode_list(row, "image_urls")?,
        product_link: row.try_get("product_link")?,
        scraped_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use tempfile::{TempDir, tempdir};

    async fn setup() -> anyhow::Result<(TempDir, ProductRepository)> {
        let dir = tempdir()?;
        let url = format!("sqlite:{}", dir.path().join("products.db").display());
        let db = DatabaseConnection::new(&url).await?;
        db.migrate().await?;
        Ok((dir, ProductRepository::new(db.into_pool())))
    }

    fn sample(link: &str) -> NewProduct {
        let mut product = NewProduct::new("Tee", link).with_price(Decimal::from_str("9.00").unwrap());
        product.colors = vec!["Noir".into(), "Blanc".into()];
        product.sizes = vec!["S".into(), "M".into()];
        product.image_urls = vec!["https://shop.example/img/a.jpg".into()];
        product
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        let product = sample("https://shop.example/p/1");

        let first = repo.ingest(&product).await?;
        assert!(matches!(first, IngestOutcome::Inserted { .. }));

        let second = repo.ingest(&product).await?;
        assert_eq!(second, IngestOutcome::SkippedDuplicate);
        assert_eq!(repo.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_ingest_first_write_wins() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        repo.ingest(&sample("https://shop.example/p/1")).await?;

        let mut rerun = NewProduct::new("Tee v2", "https://shop.example/p/1");
        rerun.price = None;
        repo.ingest(&rerun).await?;

        let stored = repo.find_by_link("https://shop.example/p/1").await?.unwrap();
        assert_eq!(stored.name, "Tee");
        assert_eq!(stored.price, Some(Decimal::from_str("9.00").unwrap()));
        assert_eq!(stored.colors, vec!["Noir", "Blanc"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        repo.pool.close().await;

        let err = repo.ingest(&sample("https://shop.example/p/9")).await.unwrap_err();
        assert!(err.is_unavailable());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_only_database_is_unavailable() -> anyhow::Result<()> {
        let (dir, _repo) = setup().await?;
        let url = format!("sqlite:{}?mode=ro", dir.path().join("products.db").display());
        let read_only = ProductRepository::new(SqlitePool::connect(&url).await?);

        let result = read_only.ingest(&sample("https://shop.example/p/1")).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))), "got {:?}", result);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_create_conflict() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        let created = repo.create(&sample("https://shop.example/p/1")).await?;
        assert_eq!(created.name, "Tee");

        let err = repo.create(&sample("https://shop.example/p/1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_only_supplied_fields() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        let created = repo.create(&sample("https://shop.example/p/1")).await?;

        let patch = ProductPatch { name: Some("Tee Oversize".into()), ..Default::default() };
        let updated = repo.update(created.id, &patch).await?;

        assert_eq!(updated.name, "Tee Oversize");
        assert_eq!(updated.price, created.price);
        assert_eq!(updated.sizes, created.sizes);
        assert_eq!(updated.product_link, created.product_link);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_link_onto_existing_conflicts() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        repo.create(&sample("https://shop.example/p/1")).await?;
        let second = repo.create(&sample("https://shop.example/p/2")).await?;

        let patch = ProductPatch {
            product_link: Some("https://shop.example/p/1".into()),
            ..Default::default()
        };
        let err = repo.update(second.id, &patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        assert!(matches!(repo.get(42).await, Err(StoreError::NotFound { id: 42 })));
        assert!(matches!(repo.delete(42).await, Err(StoreError::NotFound { id: 42 })));
        let patch = ProductPatch { name: Some("x".into()), ..Default::default() };
        assert!(matches!(repo.update(42, &patch).await, Err(StoreError::NotFound { id: 42 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_pagination_and_delete_all() -> anyhow::Result<()> {
        let (_dir, repo) = setup().await?;
        for i in 0..5 {
            repo.ingest(&sample(&format!("https://shop.example/p/{}", i))).await?;
        }

        let page = repo.list(1, 2).await?;
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].product_link, "https://shop.example/p/1");

        assert_eq!(repo.delete_all().await?, 5);
        assert_eq!(repo.count().await?, 0);
        Ok(())
    }
}
