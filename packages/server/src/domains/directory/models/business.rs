use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::BusinessId;

/// Business - aggregate root of the directory, one row per canonical website.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: BusinessId,
    /// Normalized website URL (no scheme, no `www.`, no trailing slash,
    /// no query/fragment). UNIQUE in the database; the reconciler also
    /// serializes writes per key, so the constraint is the backstop.
    pub website: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub business_type: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scalar fields accepted from an enrichment result. Applied under the
/// fill-gaps merge policy: an empty incoming value never erases stored data.
#[derive(Debug, Clone, Default)]
pub struct BusinessFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub business_type: Option<String>,
}

impl BusinessFields {
    /// Drop empty strings so the merge treats them like absent values.
    pub fn cleaned(mut self) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        self.name = non_empty(self.name);
        self.description = non_empty(self.description);
        self.business_type = non_empty(self.business_type);
        self
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Business {
    pub async fn find_by_id(id: BusinessId, pool: &PgPool) -> Result<Option<Self>> {
        let business = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(business)
    }

    /// Find by normalized website (the dedup key).
    pub async fn find_by_website(website: &str, pool: &PgPool) -> Result<Option<Self>> {
        let business =
            sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE website = $1")
                .bind(website)
                .fetch_optional(pool)
                .await?;
        Ok(business)
    }

    /// Create a business for a normalized website.
    pub async fn create(website: &str, fields: &BusinessFields, pool: &PgPool) -> Result<Self> {
        let business = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (id, website, name, description, business_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(BusinessId::new())
        .bind(website)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.business_type)
        .fetch_one(pool)
        .await?;
        Ok(business)
    }

    /// Merge scalar fields under the fill-gaps policy: `NULLIF` turns empty
    /// incoming strings into NULL, and `COALESCE` keeps the stored value
    /// when the incoming one is NULL.
    pub async fn merge_fields(
        id: BusinessId,
        fields: &BusinessFields,
        pool: &PgPool,
    ) -> Result<Self> {
        let business = sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET name = COALESCE(NULLIF($2, ''), name),
                description = COALESCE(NULLIF($3, ''), description),
                business_type = COALESCE(NULLIF($4, ''), business_type),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(fields.name.as_deref().unwrap_or(""))
        .bind(fields.description.as_deref().unwrap_or(""))
        .bind(fields.business_type.as_deref().unwrap_or(""))
        .fetch_one(pool)
        .await?;
        Ok(business)
    }

    /// Businesses with no industry links, used by the orphan-relink task.
    pub async fn find_without_industries(pool: &PgPool) -> Result<Vec<Self>> {
        let businesses = sqlx::query_as::<_, Business>(
            r#"
            SELECT b.* FROM businesses b
            WHERE NOT EXISTS (
                SELECT 1 FROM business_industries bi WHERE bi.business_id = b.id
            )
            ORDER BY b.created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(businesses)
    }
}
