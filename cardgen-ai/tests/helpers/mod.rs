//! Test Helper Utilities
//!
//! Shared utilities for testing cardgen-ai

#![allow(dead_code)]

pub mod db_utils;
pub mod fake_services;

// Re-export commonly used items
pub use db_utils::create_test_db;
pub use fake_services::{spawn_fake_chat, spawn_fake_store, FakeChat, FakeStore};
