//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use assetforge_core::{ProgressReporter, get_assets_or_empty, refresh_assets};
use assetforge_markup::HtmlRenderer;
use assetforge_shared::{
    AppConfig, EngineConfig, WorkspaceSnapshot, database_path, init_config, load_config,
};
use assetforge_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AssetForge: consolidate agent work products into versioned business assets.
#[derive(Parser)]
#[command(
    name = "assetforge",
    version,
    about = "Consolidate the raw assets of completed agent tasks into a versioned asset catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (overrides the configured path).
    #[arg(long, env = "ASSETFORGE_DB", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Import a workspace snapshot (JSON) into the database.
    Import {
        /// Path to the snapshot file.
        file: PathBuf,
    },

    /// List workspaces.
    Workspaces,

    /// Inspect the consolidated asset catalog of a workspace.
    Assets {
        #[command(subcommand)]
        action: AssetsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Asset catalog subcommands.
#[derive(Subcommand)]
pub(crate) enum AssetsAction {
    /// Print the asset catalog as JSON.
    Show {
        /// Workspace ID.
        #[arg(long)]
        workspace: String,

        /// Deliverable type passed through to the engine.
        #[arg(long)]
        deliverable_type: Option<String>,
    },
    /// Recompute the asset catalog and report per-group failures.
    Refresh {
        /// Workspace ID.
        #[arg(long)]
        workspace: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "assetforge=info",
        1 => "assetforge=debug",
        _ => "assetforge=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Import { file } => cmd_import(db.as_deref(), &file).await,
        Command::Workspaces => cmd_workspaces(db.as_deref()).await,
        Command::Assets { action } => match action {
            AssetsAction::Show {
                workspace,
                deliverable_type,
            } => cmd_assets_show(db.as_deref(), &workspace, deliverable_type).await,
            AssetsAction::Refresh { workspace } => {
                cmd_assets_refresh(db.as_deref(), &workspace).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn resolve_db_path(db: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    Ok(match db {
        Some(p) => p.to_path_buf(),
        None => database_path(config)?,
    })
}

/// Open the database at `--db`, or at the configured location, for writing.
async fn open_storage(db: Option<&Path>, config: &AppConfig) -> Result<Storage> {
    let path = resolve_db_path(db, config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("cannot create {}", parent.display()))?;
    }
    info!(path = %path.display(), "opening database");
    Ok(Storage::open(&path).await?)
}

/// Open an existing database read-only for the commands that only read.
async fn open_storage_readonly(db: Option<&Path>, config: &AppConfig) -> Result<Storage> {
    let path = resolve_db_path(db, config)?;
    if !path.exists() {
        return Err(eyre!(
            "no database at {}; import a snapshot with `assetforge import <snapshot.json>`",
            path.display()
        ));
    }
    info!(path = %path.display(), "opening database read-only");
    Ok(Storage::open_readonly(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_import(db: Option<&Path>, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("cannot read snapshot {}", file.display()))?;
    let snapshot: WorkspaceSnapshot = serde_json::from_str(&raw)
        .map_err(|e| eyre!("invalid snapshot {}: {e}", file.display()))?;

    let config = load_config()?;
    let storage = open_storage(db, &config).await?;
    let summary = storage.import_snapshot(&snapshot).await?;

    println!();
    println!("  Workspace imported!");
    println!("  ID:           {}", snapshot.workspace.id);
    println!("  Name:         {}", snapshot.workspace.name);
    println!("  Tasks:        {}", summary.tasks);
    println!("  Deliverables: {}", summary.deliverables);
    println!("  Raw assets:   {}", summary.raw_assets);
    println!();

    Ok(())
}

async fn cmd_workspaces(db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(db, &config).await?;
    let workspaces = storage.list_workspaces().await?;

    if workspaces.is_empty() {
        println!("No workspaces. Import one with `assetforge import <snapshot.json>`.");
        return Ok(());
    }

    for ws in workspaces {
        let status = ws.status.as_deref().unwrap_or("-");
        println!("{:<24} {:<10} {}", ws.id, status, ws.name);
    }
    Ok(())
}

async fn cmd_assets_show(
    db: Option<&Path>,
    workspace: &str,
    deliverable_type: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(db, &config).await?;
    let mut engine = EngineConfig::from(&config);
    if let Some(t) = deliverable_type {
        engine.deliverable_type = t;
    }

    let reporter = CliProgress::new();
    let response =
        get_assets_or_empty(&storage, &HtmlRenderer::new(), &engine, workspace, &reporter).await;
    reporter.finish();

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_assets_refresh(db: Option<&Path>, workspace: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(db, &config).await?;
    let engine = EngineConfig::from(&config);

    let reporter = CliProgress::new();
    let result =
        refresh_assets(&storage, &HtmlRenderer::new(), &engine, workspace, &reporter).await;
    reporter.finish();
    let consolidation = result?;

    println!("{}", serde_json::to_string_pretty(&consolidation.response)?);

    eprintln!();
    eprintln!("  Assets:   {}", consolidation.response.asset_count);
    eprintln!("  Versions: {}", consolidation.response.total_versions);
    eprintln!("  Failures: {}", consolidation.failures.len());
    for failure in &consolidation.failures {
        eprintln!(
            "    - {} ({}): {}",
            failure.group_key, failure.stage, failure.message
        );
    }
    eprintln!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn group_enhanced(&self, group_key: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enhancing [{current}/{total}] {group_key}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_assets_show_with_global_flags() {
        let cli = Cli::try_parse_from([
            "assetforge",
            "assets",
            "show",
            "--workspace",
            "ws-demo",
            "--deliverable-type",
            "reports",
            "--db",
            "/tmp/a.db",
            "-vv",
        ])
        .expect("parse");

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/a.db")));
        match cli.command {
            Command::Assets {
                action:
                    AssetsAction::Show {
                        workspace,
                        deliverable_type,
                    },
            } => {
                assert_eq!(workspace, "ws-demo");
                assert_eq!(deliverable_type.as_deref(), Some("reports"));
            }
            _ => panic!("expected assets show"),
        }
    }

    #[test]
    fn refresh_requires_workspace() {
        assert!(Cli::try_parse_from(["assetforge", "assets", "refresh"]).is_err());
    }

    #[tokio::test]
    async fn read_commands_open_the_database_readonly() {
        let tmp = std::env::temp_dir().join(format!("af_cli_{}.db", uuid::Uuid::now_v7()));
        let config = AppConfig::default();

        let missing = open_storage_readonly(Some(&tmp), &config).await;
        assert!(missing.is_err());
        assert!(!tmp.exists());

        drop(open_storage(Some(&tmp), &config).await.expect("create"));
        let storage = open_storage_readonly(Some(&tmp), &config)
            .await
            .expect("open readonly");
        assert!(storage.list_workspaces().await.expect("list").is_empty());

        let snapshot: WorkspaceSnapshot = serde_json::from_str(include_str!(
            "../../../fixtures/json/workspace.fixture.json"
        ))
        .expect("fixture");
        let err = storage.import_snapshot(&snapshot).await.unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }
}
