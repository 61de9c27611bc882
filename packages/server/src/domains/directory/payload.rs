//! Boundary validation for enrichment payloads.
//!
//! The external service delivers results as untyped JSON. Everything past
//! this module works with typed shapes: raw JSON either parses into one of
//! the known result variants or becomes a typed rejection here. Untyped
//! blobs never travel further inward.

use thiserror::Error;

use enrich_client::{EnrichmentResult, KeywordGenerationResult};

use super::models::{
    AddressInput, BusinessFields, ContactInput, SocialProfileInput, StaffInput, TechnologyInput,
};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload lacks the `{0}` section")]
    MissingSection(&'static str),

    #[error("payload does not match the expected shape: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse a raw job result into an enrichment result. Requires the `company`
/// and `analysis` sections so arbitrary JSON objects don't silently parse
/// into an all-defaults result.
pub fn parse_enrichment(value: &serde_json::Value) -> Result<EnrichmentResult, PayloadError> {
    let object = value.as_object().ok_or(PayloadError::NotAnObject)?;
    for section in ["company", "analysis"] {
        if !object.contains_key(section) {
            return Err(PayloadError::MissingSection(section));
        }
    }
    Ok(serde_json::from_value(value.clone())?)
}

/// Parse a raw job result into a keyword-generation result.
pub fn parse_keywords(value: &serde_json::Value) -> Result<KeywordGenerationResult, PayloadError> {
    if !value.is_object() {
        return Err(PayloadError::NotAnObject);
    }
    Ok(serde_json::from_value(value.clone())?)
}

/// One enrichment result flattened into the inputs the directory store
/// consumes: scalar fields plus each child collection.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentSnapshot {
    pub fields: BusinessFields,
    pub addresses: Vec<AddressInput>,
    pub contacts: Vec<ContactInput>,
    pub socials: Vec<SocialProfileInput>,
    pub technologies: Vec<TechnologyInput>,
    pub services: Vec<String>,
    pub staff: Vec<StaffInput>,
    /// Industry labels; linked via find-or-create during reconciliation.
    pub categories: Vec<String>,
    pub discovered_urls: Vec<String>,
}

impl EnrichmentSnapshot {
    pub fn from_result(result: &EnrichmentResult) -> Self {
        let fields = BusinessFields {
            name: result.company.name.clone(),
            description: result.company.description.clone(),
            business_type: result.analysis.business_type.clone(),
        }
        .cleaned();

        let mut contacts = Vec::new();
        for email in &result.contact.primary.emails {
            contacts.push(ContactInput {
                kind: "email".to_string(),
                value: email.clone(),
            });
        }
        for phone in &result.contact.primary.phones {
            contacts.push(ContactInput {
                kind: "phone".to_string(),
                value: phone.clone(),
            });
        }
        if let Some(page) = &result.contact.primary.contact_page {
            contacts.push(ContactInput {
                kind: "contact-page".to_string(),
                value: page.clone(),
            });
        }

        let addresses = result
            .contact
            .addresses
            .iter()
            .map(|a| AddressInput {
                street: a.street.clone(),
                city: a.city.clone(),
                state: a.state.clone(),
                postal_code: a.postal_code.clone(),
                country: a.country.clone(),
                label: a.label.clone(),
            })
            .collect();

        let socials = result
            .socials
            .iter()
            .map(|s| SocialProfileInput {
                platform: s.platform.clone(),
                url: s.url.clone(),
            })
            .collect();

        let technologies = result
            .technologies
            .iter()
            .map(|t| TechnologyInput {
                name: t.name.clone(),
                category: t.category.clone(),
            })
            .collect();

        let staff = result
            .staff
            .iter()
            .map(|s| StaffInput {
                name: s.name.clone(),
                role: s.role.clone(),
            })
            .collect();

        Self {
            fields,
            addresses,
            contacts,
            socials,
            technologies,
            services: result.company.services.clone(),
            staff,
            categories: result.company.categories.clone(),
            discovered_urls: result.discovered_urls.clone(),
        }
    }
}
