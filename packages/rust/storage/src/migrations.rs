//! SQL migration definitions for the AssetForge database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: workspaces, tasks, deliverables",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS workspaces (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    goal       TEXT NOT NULL DEFAULT '',
    status     TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id               TEXT PRIMARY KEY,
    workspace_id     TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    name             TEXT NOT NULL,
    status           TEXT NOT NULL,
    iteration_count  INTEGER NOT NULL DEFAULT 1,
    assigned_to_role TEXT,
    created_at       TEXT,
    updated_at       TEXT
);

CREATE INDEX IF NOT EXISTS idx_tasks_workspace_status ON tasks(workspace_id, status);

CREATE TABLE IF NOT EXISTS deliverables (
    id             TEXT PRIMARY KEY,
    workspace_id   TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    title          TEXT NOT NULL DEFAULT '',
    content_json   TEXT NOT NULL,
    source_task_id TEXT,
    created_at     TEXT
);

CREATE INDEX IF NOT EXISTS idx_deliverables_workspace ON deliverables(workspace_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Extractor output: task_assets",
            sql: r#"
CREATE TABLE IF NOT EXISTS task_assets (
    id           TEXT NOT NULL,
    workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    asset_json   TEXT NOT NULL,
    extracted_at TEXT NOT NULL,
    PRIMARY KEY (workspace_id, id)
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
