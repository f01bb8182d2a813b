use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use uuid::Uuid;

use shared::{
    domain::{Cursor, ProductId},
    protocol::{
        RawRecord, FIELD_CREATED_AT, FIELD_DESCRIPTION, FIELD_IMAGE_URL, FIELD_NAME, FIELD_PRICE,
    },
};

const PRODUCT_COLUMNS: &str = "id, name, price, image_url, description, created_at_ms";

/// Query rejections callers can act on; carried inside the `anyhow` chain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("cursor document '{0}' no longer exists")]
    CursorNotFound(String),
    #[error("field '{0}' is not indexed for queries")]
    UnindexedField(String),
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One page of raw records plus the cursor of its last record.
#[derive(Debug, Clone)]
pub struct StoredPage {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<Cursor>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true);
        // every in-memory connection would otherwise see its own empty database
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id            TEXT PRIMARY KEY NOT NULL,
                name          TEXT,
                price         TEXT,
                image_url     TEXT,
                description   TEXT,
                created_at_ms INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure products table exists")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_products_created_at ON products (created_at_ms, id)",
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure created_at index exists")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_name ON products (name, id)")
            .execute(&self.pool)
            .await
            .context("failed to ensure name index exists")?;

        Ok(())
    }

    pub async fn insert_product(&self, product: &NewProduct) -> Result<ProductId> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO products (id, name, price, image_url, description, created_at_ms) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&product.name)
        .bind(product.price.to_string())
        .bind(&product.image_url)
        .bind(&product.description)
        .bind(product.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert product '{}'", product.name))?;
        Ok(ProductId(id))
    }

    pub async fn count_products(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Keyset pagination over `(sort column, id)`; the cursor is the id of the
    /// last record of the previous page.
    pub async fn list_products_page(
        &self,
        order_by: &str,
        descending: bool,
        limit: u32,
        after: Option<&Cursor>,
    ) -> Result<StoredPage> {
        let column = column_for_field(order_by)?;
        let (direction, comparison) = if descending {
            ("DESC", "<")
        } else {
            ("ASC", ">")
        };

        let rows = if let Some(cursor) = after {
            let anchor_exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?")
                    .bind(cursor.token())
                    .fetch_optional(&self.pool)
                    .await?;
            if anchor_exists.is_none() {
                bail!(QueryError::CursorNotFound(cursor.token().to_string()));
            }

            let sql = format!(
                "SELECT {PRODUCT_COLUMNS}
                 FROM products
                 WHERE ({column}, id) {comparison} (SELECT {column}, id FROM products WHERE id = ?)
                 ORDER BY {column} {direction}, id {direction}
                 LIMIT ?"
            );
            sqlx::query(&sql)
                .bind(cursor.token())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        } else {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS}
                 FROM products
                 ORDER BY {column} {direction}, id {direction}
                 LIMIT ?"
            );
            sqlx::query(&sql)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        };

        let records = rows
            .iter()
            .map(raw_record_from_row)
            .collect::<Result<Vec<_>>>()?;
        let next_cursor = records
            .last()
            .map(|record| Cursor::new(record.id.as_str()));
        Ok(StoredPage {
            records,
            next_cursor,
        })
    }

    /// Records whose `field` lies in `[lower, upper)`, ordered by that field.
    pub async fn list_products_in_range(
        &self,
        field: &str,
        lower: &str,
        upper: &str,
    ) -> Result<Vec<RawRecord>> {
        let column = column_for_field(field)?;
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products
             WHERE {column} >= ? AND {column} < ?
             ORDER BY {column} ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(lower)
            .bind(upper)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(raw_record_from_row).collect()
    }
}

fn column_for_field(field: &str) -> Result<&'static str> {
    match field {
        FIELD_CREATED_AT => Ok("created_at_ms"),
        FIELD_NAME => Ok("name"),
        other => bail!(QueryError::UnindexedField(other.to_string())),
    }
}

fn raw_record_from_row(row: &SqliteRow) -> Result<RawRecord> {
    let id: String = row.try_get("id")?;
    let mut fields = Map::new();
    fields.insert(FIELD_NAME.to_string(), optional_string(row.try_get("name")?));
    let price = match row.try_get::<Option<String>, _>("price")? {
        Some(raw) => Value::Number(
            Number::from_str(&raw)
                .with_context(|| format!("product {id} has a non-numeric price '{raw}'"))?,
        ),
        None => Value::Null,
    };
    fields.insert(FIELD_PRICE.to_string(), price);
    fields.insert(
        FIELD_IMAGE_URL.to_string(),
        optional_string(row.try_get("image_url")?),
    );
    fields.insert(
        FIELD_DESCRIPTION.to_string(),
        optional_string(row.try_get("description")?),
    );
    fields.insert(
        FIELD_CREATED_AT.to_string(),
        row.try_get::<Option<i64>, _>("created_at_ms")?
            .map_or(Value::Null, Value::from),
    );
    Ok(RawRecord {
        id: ProductId(id),
        fields,
    })
}

fn optional_string(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::String)
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
