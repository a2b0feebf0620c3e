//! # Tunesmith Common Library
//!
//! Shared code for the tunesmith workspace:
//! - Error type
//! - Configuration loading and root folder resolution
//! - Persistent key-value storage (credentials)
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod storage;
pub mod time;

pub use config::ApiProvider;
pub use error::{Error, Result};
pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
