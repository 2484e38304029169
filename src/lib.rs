pub mod articles;
pub mod comments;
pub mod config;
pub mod engagement;
pub mod error;
pub mod identity;
pub mod models;
pub mod portal;
pub mod repo;
pub mod seed;
pub mod storage;
pub mod views;

// Re-export commonly used items for tests / external users
pub use config::Settings;
pub use error::{PortalError, PortalResult};
pub use portal::{ArticleView, HomeFeed, Portal};
