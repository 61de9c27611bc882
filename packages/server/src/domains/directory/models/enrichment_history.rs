use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{BusinessId, EnrichmentId};

/// Append-only history of enrichment runs against a business. Rows are
/// written once and never updated; they serve audit/debugging and the
/// orphan-relink task, which re-derives industry links from the latest
/// stored payload.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessEnrichment {
    pub id: EnrichmentId,
    pub business_id: BusinessId,
    /// Where the payload came from, e.g. `enrichment-api`.
    pub source: String,
    /// `basic` | `enhanced`
    pub mode: String,
    pub raw_data: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl BusinessEnrichment {
    pub async fn append(
        business_id: BusinessId,
        source: &str,
        mode: &str,
        raw_data: &serde_json::Value,
        pool: &PgPool,
    ) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO business_enrichments (id, business_id, source, mode, raw_data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(EnrichmentId::new())
        .bind(business_id)
        .bind(source)
        .bind(mode)
        .bind(raw_data)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Most recent snapshot for a business, if any.
    pub async fn latest_for_business(
        business_id: BusinessId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM business_enrichments
            WHERE business_id = $1
            ORDER BY processed_at DESC
            LIMIT 1
            "#,
        )
        .bind(business_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn count_for_business(business_id: BusinessId, pool: &PgPool) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM business_enrichments WHERE business_id = $1")
                .bind(business_id)
                .fetch_one(pool)
                .await?;
        Ok(count.0)
    }
}
