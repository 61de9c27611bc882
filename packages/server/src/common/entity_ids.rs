//! Typed ID definitions for all domain entities.
//!
//! This module defines type aliases for each domain entity, providing
//! compile-time type safety for ID usage throughout the application.
//!
//! # Example
//!
//! ```rust
//! use directory_core::common::{BusinessId, IndustryId};
//!
//! // These are incompatible types - compiler prevents mixing them up
//! let business_id: BusinessId = BusinessId::new();
//! let industry_id: IndustryId = IndustryId::new();
//!
//! // This would be a compile error:
//! // let wrong: IndustryId = business_id;
//! ```

// Re-export the core Id type
pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Business entities (directory aggregate roots).
pub struct Business;

/// Marker type for Industry entities (shared lookup, keyed by normalized label).
pub struct Industry;

/// Marker type for BusinessEnrichment entities (append-only history rows).
pub struct BusinessEnrichment;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Business entities.
pub type BusinessId = Id<Business>;

/// Typed ID for Industry entities.
pub type IndustryId = Id<Industry>;

/// Typed ID for BusinessEnrichment history rows.
pub type EnrichmentId = Id<BusinessEnrichment>;
