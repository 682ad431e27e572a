//! Versioned offline cache for the application's assets.
//!
//! This module provides the offline-first core of the app:
//! - Persistent, versioned cache namespaces (static seed + dynamic runtime)
//! - Per-category fetch strategies (audio, navigation, script/style, default)
//! - Namespace lifecycle tied to the deployed cache version

mod controller;
mod snapshot;
mod storage;

pub use controller::CacheController;
pub use snapshot::ResponseSnapshot;
pub use storage::{CacheStorage, NamespaceSummary, SqliteStorage};
