//! # cardgen Common Library
//!
//! Shared code for the cardgen crates:
//! - Error type
//! - Bootstrap (TOML) configuration loading
//! - SQLite initialization and the durable key/value settings surface

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
