pub mod cascade;
pub mod crm;

pub use cascade::{delete_contact_cascade, DeletionSummary};
pub use crm::{configure_contact_routes, contact_display_name};
