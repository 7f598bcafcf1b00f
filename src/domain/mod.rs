pub mod error;
pub mod models;
pub mod permissions;
pub mod settings;
pub mod store;
