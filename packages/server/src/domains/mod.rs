// Business domains
pub mod directory;
pub mod enrichment;
