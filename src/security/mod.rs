pub mod auth;
pub mod cors;
pub mod jwt;
pub mod password;
pub mod policy;

pub use auth::Actor;
pub use policy::{ensure_admin, ensure_can_mutate, load_authorized, owner_scope};
