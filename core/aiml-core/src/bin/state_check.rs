//! Debug utility for inspecting saved AIML Dash state in local environments.

use aiml_core::{logging, AppManager, ImportOptions, StorageConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "state-check")]
#[command(about = "Print a summary of saved AIML Dash state")]
#[command(version)]
struct Cli {
    /// Storage root (defaults to $AIML_DASH_HOME or ~/.aiml_dash)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Application snapshot to load (sessions and workspace are restored)
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let storage = cli
        .root
        .map(StorageConfig::with_root)
        .unwrap_or_default();
    let _guard = logging::init(&storage);

    let mut app = AppManager::new(storage);

    println!("═══════════════════════════════════════════════════════════");
    println!("  AIML Dash State Check");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("Storage root: {}", app.storage().root().display());
    println!("Projects dir: {}", app.storage().projects_dir().display());
    println!();

    match app.project_manager_mut().load_all_projects(None) {
        Ok(count) => println!("Loaded {} project file(s)", count),
        Err(err) => {
            eprintln!("Failed to load projects: {}", err);
            return ExitCode::FAILURE;
        }
    }

    if let Some(path) = cli.snapshot {
        let options = ImportOptions {
            restore_sessions: true,
            restore_data: true,
            merge: false,
        };
        match app.import_state(&path, options) {
            Ok(message) => println!("{}", message),
            Err(err) => {
                eprintln!("Failed to import snapshot: {}", err);
                return ExitCode::FAILURE;
            }
        }
    }
    println!();

    let status = app.status_summary();
    println!("── Status ────────────────────────────────────────────────");
    println!(
        "  Sessions: {} (active: {})",
        status.sessions.total,
        status.sessions.active_id.as_deref().unwrap_or("-")
    );
    println!(
        "  Datasets: {} (active: {})",
        status.data.datasets,
        status.data.active_dataset.as_deref().unwrap_or("-")
    );
    println!(
        "  Projects: {} (active: {})",
        status.projects.total,
        status.projects.active.as_deref().unwrap_or("-")
    );
    println!(
        "  Cache: {} entries ({})",
        status.cache.size,
        if status.cache.enabled { "enabled" } else { "disabled" }
    );
    println!(
        "  Actions: {} logged ({})",
        status.actions.total,
        if status.actions.logging { "on" } else { "off" }
    );
    println!();

    println!("── Projects ──────────────────────────────────────────────");
    if app.project_manager().is_empty() {
        println!("  (no projects)");
    }
    for project in app.project_manager().list_projects() {
        let lock = match project.lock_holder() {
            Some(holder) => format!("🔒 {}", holder),
            None => "unlocked".to_string(),
        };
        println!(
            "  {} {} [{}] {} experiment(s), {} dataset(s), {}",
            project.id(),
            project.name,
            project.project_type,
            project.experiment_count(),
            project.dataset_count(),
            lock
        );
    }
    println!();

    println!("── Workspace ─────────────────────────────────────────────");
    let workspace = app.data_manager();
    if workspace.is_empty() {
        println!("  (no datasets)");
    }
    for name in workspace.dataset_names() {
        if let Some(info) = workspace.dataset_info(Some(&name)) {
            let marker = if workspace.active_dataset_name() == Some(name.as_str()) {
                "▶"
            } else {
                " "
            };
            println!(
                "  {} {} ({} rows × {} columns, {:.2} MB)",
                marker, info.name, info.rows, info.columns, info.metadata.memory_usage_mb
            );
        }
    }
    println!();
    println!("═══════════════════════════════════════════════════════════");

    ExitCode::SUCCESS
}
