//! libSQL storage layer for workspaces, tasks, deliverables, and extractor output.
//!
//! The [`Storage`] struct wraps a local libSQL database. The consolidation
//! engine only reads from it; writes exist for importing workspace snapshots.
//!
//! **Access rules:**
//! - Import path: read-write via [`Storage::open`]
//! - Asset reads: read-only is sufficient via [`Storage::open_readonly`]

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};

use assetforge_shared::{
    AssetForgeError, Deliverable, RawAsset, Result, TASK_STATUS_COMPLETED, Task, Workspace,
    WorkspaceSnapshot,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Counts of records written by [`Storage::import_snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub tasks: usize,
    pub deliverables: usize,
    pub raw_assets: usize,
}

fn db_err(e: impl std::fmt::Display) -> AssetForgeError {
    AssetForgeError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AssetForgeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        AssetForgeError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(AssetForgeError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Workspace operations
    // -----------------------------------------------------------------------

    /// Insert or update a workspace.
    pub async fn upsert_workspace(&self, workspace: &Workspace) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO workspaces (id, name, goal, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   goal = excluded.goal,
                   status = excluded.status",
                params![
                    workspace.id.as_str(),
                    workspace.name.as_str(),
                    workspace.goal.as_str(),
                    workspace.status.as_deref(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a workspace by ID.
    pub async fn get_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, goal, status FROM workspaces WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_workspace(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List all workspaces, ordered by name.
    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, goal, status FROM workspaces ORDER BY name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_workspace(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Task operations
    // -----------------------------------------------------------------------

    /// Insert or update a task within a workspace.
    pub async fn upsert_task(&self, workspace_id: &str, task: &Task) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO tasks (id, workspace_id, name, status, iteration_count, assigned_to_role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   workspace_id = excluded.workspace_id,
                   name = excluded.name,
                   status = excluded.status,
                   iteration_count = excluded.iteration_count,
                   assigned_to_role = excluded.assigned_to_role,
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at",
                params![
                    task.id.as_str(),
                    workspace_id,
                    task.name.as_str(),
                    task.status.as_str(),
                    i64::from(task.iteration_count),
                    task.assigned_to_role.as_deref(),
                    task.created_at.map(|t| t.to_rfc3339()),
                    task.updated_at.map(|t| t.to_rfc3339()),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List the completed tasks of a workspace, oldest first.
    pub async fn list_completed_tasks(&self, workspace_id: &str) -> Result<Vec<Task>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, workspace_id, name, status, iteration_count, assigned_to_role, created_at, updated_at
                 FROM tasks WHERE workspace_id = ?1 AND status = ?2
                 ORDER BY created_at, id",
                params![workspace_id, TASK_STATUS_COMPLETED],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_task(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Deliverable operations
    // -----------------------------------------------------------------------

    /// Insert or replace a deliverable record.
    pub async fn upsert_deliverable(&self, deliverable: &Deliverable) -> Result<()> {
        self.check_writable()?;
        let content_json = serde_json::to_string(&deliverable.content)?;
        self.conn
            .execute(
                "INSERT INTO deliverables (id, workspace_id, title, content_json, source_task_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                   workspace_id = excluded.workspace_id,
                   title = excluded.title,
                   content_json = excluded.content_json,
                   source_task_id = excluded.source_task_id,
                   created_at = excluded.created_at",
                params![
                    deliverable.id.as_str(),
                    deliverable.workspace_id.as_str(),
                    deliverable.title.as_str(),
                    content_json,
                    deliverable.source_task_id.as_deref(),
                    deliverable.created_at.map(|t| t.to_rfc3339()),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List the deliverables of a workspace, oldest first.
    pub async fn list_deliverables(&self, workspace_id: &str) -> Result<Vec<Deliverable>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, workspace_id, title, content_json, source_task_id, created_at
                 FROM deliverables WHERE workspace_id = ?1
                 ORDER BY created_at, id",
                params![workspace_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let content_json: String = row.get(3).map_err(db_err)?;
            results.push(Deliverable {
                id: row.get::<String>(0).map_err(db_err)?,
                workspace_id: row.get::<String>(1).map_err(db_err)?,
                title: row.get::<String>(2).map_err(db_err)?,
                content: serde_json::from_str(&content_json)?,
                source_task_id: row.get::<String>(4).ok(),
                created_at: parse_timestamp(row.get::<String>(5).ok())?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Extractor output
    // -----------------------------------------------------------------------

    /// Store one raw asset produced by the extractor.
    pub async fn upsert_task_asset(
        &self,
        workspace_id: &str,
        asset_id: &str,
        asset: &RawAsset,
    ) -> Result<()> {
        self.check_writable()?;
        let asset_json = serde_json::to_string(asset)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO task_assets (id, workspace_id, asset_json, extracted_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(workspace_id, id) DO UPDATE SET
                   asset_json = excluded.asset_json,
                   extracted_at = excluded.extracted_at",
                params![asset_id, workspace_id, asset_json, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// All raw assets extracted for a workspace, keyed by raw-asset id.
    pub async fn list_task_assets(&self, workspace_id: &str) -> Result<BTreeMap<String, RawAsset>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, asset_json FROM task_assets WHERE workspace_id = ?1",
                params![workspace_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = BTreeMap::new();
        while let Ok(Some(row)) = rows.next().await {
            let id: String = row.get(0).map_err(db_err)?;
            let json: String = row.get(1).map_err(db_err)?;
            let asset: RawAsset = serde_json::from_str(&json).map_err(|e| {
                AssetForgeError::Storage(format!("invalid asset_json for {id}: {e}"))
            })?;
            results.insert(id, asset);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Snapshot import
    // -----------------------------------------------------------------------

    /// Write a whole workspace snapshot. Existing rows with the same ids are replaced.
    pub async fn import_snapshot(&self, snapshot: &WorkspaceSnapshot) -> Result<ImportSummary> {
        self.check_writable()?;
        let workspace_id = snapshot.workspace.id.as_str();
        if workspace_id.is_empty() {
            return Err(AssetForgeError::validation("snapshot workspace has no id"));
        }

        self.upsert_workspace(&snapshot.workspace).await?;

        for task in &snapshot.tasks {
            self.upsert_task(task.workspace_id.as_deref().unwrap_or(workspace_id), task)
                .await?;
        }
        for deliverable in &snapshot.deliverables {
            self.upsert_deliverable(deliverable).await?;
        }
        for (id, asset) in &snapshot.raw_assets {
            self.upsert_task_asset(workspace_id, id, asset).await?;
        }

        let summary = ImportSummary {
            tasks: snapshot.tasks.len(),
            deliverables: snapshot.deliverables.len(),
            raw_assets: snapshot.raw_assets.len(),
        };
        tracing::info!(
            workspace_id,
            tasks = summary.tasks,
            deliverables = summary.deliverables,
            raw_assets = summary.raw_assets,
            "snapshot imported"
        );
        Ok(summary)
    }
}

fn row_to_workspace(row: &libsql::Row) -> Result<Workspace> {
    Ok(Workspace {
        id: row.get::<String>(0).map_err(db_err)?,
        name: row.get::<String>(1).map_err(db_err)?,
        goal: row.get::<String>(2).unwrap_or_default(),
        status: row.get::<String>(3).ok(),
    })
}

fn row_to_task(row: &libsql::Row) -> Result<Task> {
    Ok(Task {
        id: row.get::<String>(0).map_err(db_err)?,
        workspace_id: row.get::<String>(1).ok(),
        name: row.get::<String>(2).map_err(db_err)?,
        status: row.get::<String>(3).map_err(db_err)?,
        iteration_count: row
            .get::<i64>(4)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1)
            .max(1),
        assigned_to_role: row.get::<String>(5).ok(),
        created_at: parse_timestamp(row.get::<String>(6).ok())?,
        updated_at: parse_timestamp(row.get::<String>(7).ok())?,
    })
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| AssetForgeError::Storage(format!("invalid date '{s}': {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("af_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn workspace(id: &str) -> Workspace {
        Workspace {
            id: id.into(),
            name: "Outbound".into(),
            goal: "Book 20 demos".into(),
            status: Some("active".into()),
        }
    }

    fn task(id: &str, status: &str, iteration_count: u32) -> Task {
        Task {
            id: id.into(),
            workspace_id: None,
            name: format!("Task {id}"),
            status: status.into(),
            iteration_count,
            assigned_to_role: Some("researcher".into()),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("af_test_{}.db", Uuid::now_v7()));
        let first = Storage::open(&tmp).await.expect("first open");
        drop(first);
        let second = Storage::open(&tmp).await.expect("second open");
        assert_eq!(second.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn workspace_crud() {
        let storage = test_storage().await;
        storage.upsert_workspace(&workspace("ws1")).await.unwrap();

        let ws = storage.get_workspace("ws1").await.unwrap().expect("exists");
        assert_eq!(ws.goal, "Book 20 demos");
        assert_eq!(ws.status.as_deref(), Some("active"));

        assert!(storage.get_workspace("missing").await.unwrap().is_none());
        assert_eq!(storage.list_workspaces().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_completed_tasks_are_listed() {
        let storage = test_storage().await;
        storage.upsert_workspace(&workspace("ws1")).await.unwrap();
        storage.upsert_task("ws1", &task("t1", "completed", 2)).await.unwrap();
        storage.upsert_task("ws1", &task("t2", "in_progress", 1)).await.unwrap();

        let tasks = storage.list_completed_tasks("ws1").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "t1");
        assert_eq!(tasks[0].iteration_count, 2);
        assert_eq!(tasks[0].workspace_id.as_deref(), Some("ws1"));
        assert!(tasks[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn deliverables_and_assets_roundtrip() {
        let storage = test_storage().await;
        storage.upsert_workspace(&workspace("ws1")).await.unwrap();

        let deliverable = Deliverable {
            id: "d1".into(),
            workspace_id: "ws1".into(),
            title: "Final report".into(),
            content: json!({"project_summary": "All done"}),
            source_task_id: None,
            created_at: None,
        };
        storage.upsert_deliverable(&deliverable).await.unwrap();
        let listed = storage.list_deliverables("ws1").await.unwrap();
        assert_eq!(listed, vec![deliverable]);

        let asset = RawAsset::new("contact_database", json!({"contacts": [{"name": "Ada"}]}));
        storage.upsert_task_asset("ws1", "a1", &asset).await.unwrap();
        storage.upsert_task_asset("ws2", "a2", &asset).await.unwrap();

        let assets = storage.list_task_assets("ws1").await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets["a1"], asset);
    }

    #[tokio::test]
    async fn import_fixture_snapshot() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/workspace.fixture.json")
            .expect("read fixture");
        let snapshot: WorkspaceSnapshot = serde_json::from_str(&fixture).expect("parse");

        let storage = test_storage().await;
        let summary = storage.import_snapshot(&snapshot).await.expect("import");
        assert_eq!(summary.tasks, 4);
        assert_eq!(summary.raw_assets, 4);

        let completed = storage.list_completed_tasks("ws-demo").await.unwrap();
        assert_eq!(completed.len(), 3);
        assert_eq!(storage.list_task_assets("ws-demo").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("af_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_workspace(&workspace("ws1")).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get_workspace("ws1").await.unwrap().is_some());
        let result = ro.upsert_workspace(&workspace("ws2")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
