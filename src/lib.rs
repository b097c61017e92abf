pub mod config;
pub mod error;
pub mod i18n;
pub mod library;
pub mod logger;
pub mod model;
pub mod pdf;
pub mod remote;
pub mod store;
pub mod utils;
pub mod viewer;
