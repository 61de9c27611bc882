pub mod business;
pub mod children;
pub mod enrichment_history;
pub mod industry;

pub use business::{Business, BusinessFields};
pub use children::{
    AddressInput, BusinessAddress, BusinessContact, BusinessDiscoveredUrl, BusinessService,
    BusinessSocialProfile, BusinessStaffMember, BusinessTechnology, ContactInput,
    SocialProfileInput, StaffInput, TechnologyInput,
};
pub use enrichment_history::BusinessEnrichment;
pub use industry::Industry;
