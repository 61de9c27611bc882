use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{normalize_label, BusinessId, IndustryId};

/// Industry - shared lookup keyed by `normalized_label`. The stored `label`
/// keeps the casing of whoever created the row first.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Industry {
    pub id: IndustryId,
    pub label: String,
    pub normalized_label: String,
    /// Keyword list attached by keyword-generation jobs.
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Industry {
    /// Find or create by normalized label. First-seen casing wins: the
    /// conflict arm is a no-op update so `RETURNING *` yields the stored row.
    pub async fn find_or_create(label: &str, pool: &PgPool) -> Result<Self> {
        let industry = sqlx::query_as::<_, Industry>(
            r#"
            INSERT INTO industries (id, label, normalized_label)
            VALUES ($1, $2, $3)
            ON CONFLICT (normalized_label) DO UPDATE SET label = industries.label
            RETURNING *
            "#,
        )
        .bind(IndustryId::new())
        .bind(label.trim())
        .bind(normalize_label(label))
        .fetch_one(pool)
        .await?;
        Ok(industry)
    }

    /// Union `keywords` into the industry's list, preserving stored order.
    pub async fn add_keywords(id: IndustryId, keywords: &[String], pool: &PgPool) -> Result<Self> {
        let industry = sqlx::query_as::<_, Industry>(
            r#"
            UPDATE industries
            SET keywords = (
                    SELECT ARRAY(
                        SELECT DISTINCT ON (k) k
                        FROM unnest(keywords || $2::text[]) WITH ORDINALITY AS t(k, ord)
                        ORDER BY k, ord
                    )
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(keywords)
        .fetch_one(pool)
        .await?;
        Ok(industry)
    }

    /// Replace a business's industry links with the given set.
    pub async fn replace_links_for_business(
        business_id: BusinessId,
        industry_ids: &[IndustryId],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_industries WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for industry_id in industry_ids {
            sqlx::query(
                r#"
                INSERT INTO business_industries (business_id, industry_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(business_id)
            .bind(industry_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_business(business_id: BusinessId, pool: &PgPool) -> Result<Vec<Self>> {
        let industries = sqlx::query_as::<_, Industry>(
            r#"
            SELECT i.* FROM industries i
            JOIN business_industries bi ON bi.industry_id = i.id
            WHERE bi.business_id = $1
            ORDER BY i.label
            "#,
        )
        .bind(business_id)
        .fetch_all(pool)
        .await?;
        Ok(industries)
    }
}
