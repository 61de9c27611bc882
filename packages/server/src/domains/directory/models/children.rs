//! Child collections of the business aggregate.
//!
//! Every collection is replaced wholesale during reconciliation: delete the
//! business's current rows, insert the rows derived from this enrichment
//! snapshot, all inside one transaction per entity type. Re-processing the
//! identical payload therefore converges to the same child set instead of
//! accumulating duplicates.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::BusinessId;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessAddress {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub label: Option<String>,
}

/// Address input derived from one enrichment snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressInput {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessContact {
    pub id: Uuid,
    pub business_id: BusinessId,
    /// `email` | `phone` | `contact-page`
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactInput {
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessSocialProfile {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialProfileInput {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessTechnology {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechnologyInput {
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessStaffMember {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffInput {
    pub name: String,
    pub role: Option<String>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl BusinessAddress {
    pub async fn replace_for_business(
        business_id: BusinessId,
        addresses: &[AddressInput],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_addresses WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for address in addresses {
            sqlx::query(
                r#"
                INSERT INTO business_addresses
                    (business_id, street, city, state, postal_code, country, label)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(business_id)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.postal_code)
            .bind(&address.country)
            .bind(&address.label)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_business(business_id: BusinessId, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            "SELECT * FROM business_addresses WHERE business_id = $1",
        )
        .bind(business_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

impl BusinessContact {
    pub async fn replace_for_business(
        business_id: BusinessId,
        contacts: &[ContactInput],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_contacts WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for contact in contacts {
            sqlx::query(
                "INSERT INTO business_contacts (business_id, kind, value) VALUES ($1, $2, $3)",
            )
            .bind(business_id)
            .bind(&contact.kind)
            .bind(&contact.value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_business(business_id: BusinessId, pool: &PgPool) -> Result<Vec<Self>> {
        let rows =
            sqlx::query_as::<_, Self>("SELECT * FROM business_contacts WHERE business_id = $1")
                .bind(business_id)
                .fetch_all(pool)
                .await?;
        Ok(rows)
    }
}

impl BusinessSocialProfile {
    pub async fn replace_for_business(
        business_id: BusinessId,
        socials: &[SocialProfileInput],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_social_profiles WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for social in socials {
            sqlx::query(
                r#"
                INSERT INTO business_social_profiles (business_id, platform, url)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(business_id)
            .bind(&social.platform)
            .bind(&social.url)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl BusinessTechnology {
    pub async fn replace_for_business(
        business_id: BusinessId,
        technologies: &[TechnologyInput],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_technologies WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for tech in technologies {
            sqlx::query(
                r#"
                INSERT INTO business_technologies (business_id, name, category)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(business_id)
            .bind(&tech.name)
            .bind(&tech.category)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Services are bare names; no dedicated row struct beyond the name.
pub struct BusinessService;

impl BusinessService {
    pub async fn replace_for_business(
        business_id: BusinessId,
        services: &[String],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_services WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for service in services {
            sqlx::query("INSERT INTO business_services (business_id, name) VALUES ($1, $2)")
                .bind(business_id)
                .bind(service)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl BusinessStaffMember {
    pub async fn replace_for_business(
        business_id: BusinessId,
        staff: &[StaffInput],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_staff WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for member in staff {
            sqlx::query("INSERT INTO business_staff (business_id, name, role) VALUES ($1, $2, $3)")
                .bind(business_id)
                .bind(&member.name)
                .bind(&member.role)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// URLs the scraper discovered while crawling the site.
pub struct BusinessDiscoveredUrl;

impl BusinessDiscoveredUrl {
    pub async fn replace_for_business(
        business_id: BusinessId,
        urls: &[String],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM business_discovered_urls WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *tx)
            .await?;
        for url in urls {
            sqlx::query("INSERT INTO business_discovered_urls (business_id, url) VALUES ($1, $2)")
                .bind(business_id)
                .bind(url)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
