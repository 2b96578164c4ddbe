//! Shared types, error model, and configuration for AssetForge.
//!
//! This crate is the foundation depended on by all other AssetForge crates.
//! It provides:
//! - [`AssetForgeError`] — the unified error type
//! - Domain types ([`RawAsset`], [`Task`], [`UnifiedAsset`], [`AssetsResponse`])
//! - Configuration ([`AppConfig`], [`EngineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsSection, EngineConfig, EngineSection, StorageSection, config_dir,
    config_file_path, database_path, init_config, load_config, load_config_from,
};
pub use error::{AssetForgeError, Result};
pub use types::{
    ActionableSection, AssetMetadata, AssetsResponse, ContentPayload, DataSource, Deliverable,
    EnhancementSource, RawAsset, RelatedTask, TASK_STATUS_COMPLETED, Task, UnifiedAsset,
    VersionHistoryEntry, Workspace, WorkspaceSnapshot,
};
