//! Read seam between the engine and wherever workspace data lives.

use std::collections::BTreeMap;

use async_trait::async_trait;

use assetforge_shared::{Deliverable, RawAsset, Result, Task, Workspace};
use assetforge_storage::Storage;

/// Read-only access to the inputs of one consolidation.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>>;

    /// Tasks whose status is `completed`.
    async fn list_completed_tasks(&self, workspace_id: &str) -> Result<Vec<Task>>;

    /// Extractor output keyed by raw-asset id.
    async fn list_extracted_assets(&self, workspace_id: &str)
    -> Result<BTreeMap<String, RawAsset>>;

    async fn list_deliverables(&self, workspace_id: &str) -> Result<Vec<Deliverable>>;
}

#[async_trait]
impl WorkspaceStore for Storage {
    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>> {
        Storage::get_workspace(self, workspace_id).await
    }

    async fn list_completed_tasks(&self, workspace_id: &str) -> Result<Vec<Task>> {
        Storage::list_completed_tasks(self, workspace_id).await
    }

    async fn list_extracted_assets(
        &self,
        workspace_id: &str,
    ) -> Result<BTreeMap<String, RawAsset>> {
        self.list_task_assets(workspace_id).await
    }

    async fn list_deliverables(&self, workspace_id: &str) -> Result<Vec<Deliverable>> {
        Storage::list_deliverables(self, workspace_id).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use assetforge_shared::WorkspaceSnapshot;

    fn temp_db_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("assetforge-source-{}.db", uuid::Uuid::now_v7()))
    }

    #[tokio::test]
    async fn storage_implements_the_store_seam() {
        let raw = std::fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../../fixtures/json/workspace.fixture.json"
        ))
        .expect("fixture");
        let snapshot: WorkspaceSnapshot = serde_json::from_str(&raw).expect("parse");

        let path = temp_db_path();
        let storage = Storage::open(&path).await.expect("open");
        storage.import_snapshot(&snapshot).await.expect("import");

        let store: &dyn WorkspaceStore = &storage;
        let ws = store.get_workspace("ws-demo").await.expect("get");
        assert_eq!(ws.map(|w| w.id).as_deref(), Some("ws-demo"));
        assert_eq!(store.list_completed_tasks("ws-demo").await.expect("tasks").len(), 3);
        assert_eq!(store.list_extracted_assets("ws-demo").await.expect("assets").len(), 4);
        assert_eq!(store.list_deliverables("ws-demo").await.expect("deliverables").len(), 1);

        drop(storage);
        let _ = std::fs::remove_file(&path);
    }
}
