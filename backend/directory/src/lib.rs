//! # Directory
//!
//! Persistent side of Rango: categories of pages, the users who curate
//! them and their browser sessions.
//!
//! The server crate never writes SQL itself; every statement lives here.
pub mod error;
pub mod models;
pub mod sessions;
pub mod slug;
pub mod store;
pub mod users;

pub use error::{DirectoryError, DirectoryResult};
pub use models::{Category, CategoryLink, Page, SessionRecord, User, UserProfile};
pub use sqlx::SqlitePool;
