pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use config::{default_base_dir, load_config};
pub use error::{Result, StoreError};
pub use store::Store;
