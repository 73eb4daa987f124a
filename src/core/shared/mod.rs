pub mod enums;
pub mod error;
pub mod extract;
pub mod models;
pub mod schema;
pub mod state;
pub mod utils;

pub use enums::*;
pub use error::{CrmError, CrmResult};
pub use extract::JsonBody;
