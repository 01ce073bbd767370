pub mod config;
pub mod error;
pub mod listing;
pub mod store;
pub mod types;

pub use config::TaskdeckConfig;
pub use error::{Result, TaskdeckError};
pub use listing::{list, ListParams, ListQuery, ListingPage, Pagination, Statistics};
pub use store::TodoStore;
pub use types::*;
