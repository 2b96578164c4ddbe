//! Asset consolidation engine for AssetForge.
//!
//! This crate turns the raw assets extracted from a workspace's completed
//! tasks into a catalog of unified, versioned assets: classification,
//! version inference, grouping, content enhancement, and assembly, tied
//! together by the pipeline operations (`get_assets`, `refresh_assets`).

pub mod aggregator;
pub mod assembler;
pub mod classifier;
pub mod enhancer;
pub mod fallback;
pub mod pipeline;
pub mod source;
pub mod versioning;

pub use pipeline::{
    Consolidation, EngineInput, FailureStage, GroupFailure, ProgressReporter, SilentProgress,
    consolidate, get_assets, get_assets_or_empty, refresh_assets,
};
pub use source::WorkspaceStore;
