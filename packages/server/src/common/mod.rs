// Common types and utilities shared across the application

pub mod entity_ids;
pub mod id;
pub mod keyed_lock;
pub mod normalize;

pub use entity_ids::*;
pub use id::Id;
pub use keyed_lock::KeyedLock;
pub use normalize::{normalize_label, normalize_website_url};
