//! Configuration types for reqtree.
//!
//! This module provides the [`SyncConfig`] struct which controls how the
//! synchronization engine talks to the backend. Configuration is persisted as
//! TOML (typically at `~/.config/reqtree/config.toml` on Unix systems).
//!
//! # Key Configuration Fields
//!
//! - `sync_collections`: Whether local edits are pushed to the backend at all
//! - `bulk_import`: Whether appended batches use the single bulk-import call
//! - `default_*_collection_name`: Name of the collection seeded into an empty forest
//!
//! # Example
//!
//! ```ignore
//! use reqtree_core::config::SyncConfig;
//!
//! let config = SyncConfig::load()?;
//! if config.sync_collections {
//!     // start syncing
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReqtreeError, Result};

/// `SyncConfig` holds the user-controllable parts of collection syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Push local structural edits to the backend.
    /// When false, edits only change the local store.
    pub sync_collections: bool,

    /// Submit appended collection batches through the bulk import call,
    /// falling back to per-node creation if it fails
    pub bulk_import: bool,

    /// Name of the collection an empty REST forest starts with
    pub default_rest_collection_name: String,

    /// Name of the collection an empty GraphQL forest starts with
    pub default_graphql_collection_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_collections: true,
            bulk_import: true,
            default_rest_collection_name: "My Collection".to_string(),
            default_graphql_collection_name: "My GraphQL Collection".to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a config with syncing switched off (local-only mode)
    pub fn local_only() -> Self {
        Self {
            sync_collections: false,
            ..Self::default()
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ReqtreeError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: SyncConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ReqtreeError::ConfigWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| ReqtreeError::ConfigWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Load config from a path, returning the default if it is missing or invalid.
    pub fn load_from_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default sync config ({})", e);
                Self::default()
            }
        }
    }
}

// ============================================================================
// Native-only implementation (not available in WASM)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl SyncConfig {
    /// Get the config file path (~/.config/reqtree/config.toml)
    /// Only available on native platforms
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reqtree").join("config.toml"))
    }

    /// Load config from default location, or return default if file doesn't exist
    /// Only available on native platforms
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }

        Ok(SyncConfig::default())
    }

    /// Save config to default location
    /// Only available on native platforms
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path().ok_or(ReqtreeError::NoConfigDir)?;
        self.save_to(&path)
    }
}
