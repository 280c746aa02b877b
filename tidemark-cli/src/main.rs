mod manifest;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, warn};
use serde_json::Value;

use tidemark_core::AttrPath;
use tidemark_core::differ::{AttributeChange, Diff};
use tidemark_core::origin::{declare_origin_slots, refresh_origin_values, refresh_slice_origin_values};
use tidemark_core::resource::ResourceData;
use tidemark_state::{BackendConfig, ResourceState, StateBackend, StateFile, create_backend};

use crate::manifest::{Manifest, ResourceSpec};

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Reconcile declared configuration with remotely observed state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which changes would surface and which are suppressed
    Plan {
        /// Path to the manifest
        #[arg(default_value = "tidemark.json")]
        manifest: PathBuf,
    },
    /// Store the declared attributes and refresh their origin values
    Apply {
        /// Path to the manifest
        #[arg(default_value = "tidemark.json")]
        manifest: PathBuf,
    },
    /// Release a state lock left behind by an interrupted run
    ForceUnlock {
        /// ID of the lock to release
        lock_id: String,

        /// Path to the manifest
        #[arg(long, default_value = "tidemark.json")]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan { manifest } => run_plan(&manifest).await,
        Commands::Apply { manifest } => run_apply(&manifest).await,
        Commands::ForceUnlock { lock_id, manifest } => run_force_unlock(&lock_id, &manifest).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load(path: &Path) -> Result<(Manifest, BackendConfig), String> {
    let manifest = Manifest::load(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let config = manifest.backend_config(base_dir);
    Ok((manifest, config))
}

async fn run_plan(path: &Path) -> Result<(), String> {
    let (manifest, config) = load(path)?;
    let backend = create_backend(&config)
        .await
        .map_err(|e| format!("Failed to create backend: {}", e))?;

    let state = backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?
        .unwrap_or_default();

    let diffs = plan(&manifest, &state)?;
    print_plan(&diffs);
    Ok(())
}

async fn run_apply(path: &Path) -> Result<(), String> {
    let (manifest, config) = load(path)?;
    let backend = create_backend(&config)
        .await
        .map_err(|e| format!("Failed to create backend: {}", e))?;
    backend
        .init()
        .await
        .map_err(|e| format!("Failed to initialize backend: {}", e))?;

    let lock = backend
        .acquire_lock("apply")
        .await
        .map_err(|e| format!("Failed to acquire lock: {}", e))?;

    let result = apply(&manifest, backend.as_ref()).await;

    // Release the lock even when apply failed
    if let Err(e) = backend.release_lock(&lock).await {
        warn!("failed to release lock {}: {}", lock.id, e);
    }

    let summary = result?;
    if summary.applied == 0 {
        println!("{}", "No changes needed.".green());
    } else {
        println!(
            "{}",
            format!("Apply complete! {} resources updated.", summary.applied)
                .green()
                .bold()
        );
    }
    if summary.origin_failures > 0 {
        println!(
            "{}",
            format!(
                "{} origin values could not be refreshed (see warnings above).",
                summary.origin_failures
            )
            .yellow()
        );
    }
    Ok(())
}

async fn run_force_unlock(lock_id: &str, path: &Path) -> Result<(), String> {
    let (_, config) = load(path)?;
    let backend = create_backend(&config)
        .await
        .map_err(|e| format!("Failed to create backend: {}", e))?;

    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| format!("Failed to unlock: {}", e))?;

    println!("{}", format!("Lock {} released.", lock_id).green());
    Ok(())
}

/// Diff every declared resource against stored state
fn plan(manifest: &Manifest, state: &StateFile) -> Result<Vec<Diff>, String> {
    manifest
        .resources
        .iter()
        .map(|resource| {
            let d = state.resource_data(&resource.id(), resource.config());
            Ok(resource.differ()?.diff(&d))
        })
        .collect()
}

#[derive(Debug, Default, PartialEq)]
struct ApplySummary {
    applied: usize,
    origin_failures: usize,
}

async fn apply(manifest: &Manifest, backend: &dyn StateBackend) -> Result<ApplySummary, String> {
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?
        .unwrap_or_default();

    let mut summary = ApplySummary::default();
    for resource in &manifest.resources {
        let mut d = state.resource_data(&resource.id(), resource.config());
        let diff = resource.differ()?.diff(&d);
        if !diff.is_change() {
            debug!("{}: no change", d.id);
            continue;
        }

        print_diff(&diff);
        summary.origin_failures += apply_resource(resource, &mut d)?;
        state.upsert_resource(ResourceState::from_resource_data(&d));
        summary.applied += 1;
    }

    if summary.applied > 0 {
        state.increment_serial();
        backend
            .write_state(&state)
            .await
            .map_err(|e| format!("Failed to write state: {}", e))?;
    }
    Ok(summary)
}

/// Store the declared attributes and snapshot the tracked ones as origin.
/// Returns how many origin values failed to refresh.
fn apply_resource(resource: &ResourceSpec, d: &mut ResourceData) -> Result<usize, String> {
    // The local provider echoes the declaration back as observed state
    for (key, value) in &resource.attributes {
        d.set(&AttrPath::from_segments(vec![key.clone()]), value.clone())
            .map_err(|e| format!("{}: failed to store '{}': {}", d.id, key, e))?;
    }

    let differ = resource.differ()?;
    let ruled: Vec<AttrPath> = differ.rules().iter().map(|rule| rule.path.clone()).collect();
    clear_removed(d, &ruled)?;

    let tracked = differ.tracked_paths();
    let all: Vec<_> = tracked.objects.iter().chain(&tracked.slices).cloned().collect();
    declare_origin_slots(d, &all);

    let mut failures = 0;
    if let Err(e) = refresh_origin_values(d, &tracked.objects) {
        warn!("{}: {}", d.id, e);
        failures += e.failures().len();
    }
    if let Err(e) = refresh_slice_origin_values(d, &tracked.slices) {
        warn!("{}: {}", d.id, e);
        failures += e.failures().len();
    }
    Ok(failures)
}

/// Clear rule-covered attributes the declaration no longer holds, along with
/// their origin values, so the removal is carried out
fn clear_removed(d: &mut ResourceData, paths: &[AttrPath]) -> Result<(), String> {
    for path in paths {
        let key = path.to_string();
        if !d.get_raw_config(&key).is_null() || d.get(&key).is_null() {
            continue;
        }

        debug!("{}: clearing removed attribute '{}'", d.id, key);
        d.set(path, Value::Null)
            .map_err(|e| format!("{}: failed to clear '{}': {}", d.id, key, e))?;
        if !d.get_origin(&key).is_null() {
            d.set(&path.origin(), Value::Null)
                .map_err(|e| format!("{}: failed to clear origin of '{}': {}", d.id, key, e))?;
        }
    }
    Ok(())
}

fn print_plan(diffs: &[Diff]) {
    if !diffs.iter().any(Diff::is_change) {
        println!("{}", "No changes. Stored state matches the declaration.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    let mut create_count = 0;
    let mut update_count = 0;
    for diff in diffs {
        match diff {
            Diff::Create(_) => create_count += 1,
            Diff::Update { .. } => update_count += 1,
            Diff::NoChange(_) => continue,
        }
        print_diff(diff);
    }

    println!();
    println!(
        "Plan: {} to create, {} to update.",
        create_count.to_string().green(),
        update_count.to_string().yellow()
    );
}

fn print_diff(diff: &Diff) {
    match diff {
        Diff::Create(id) => println!("  {} {}", "+".green().bold(), id),
        Diff::Update {
            id,
            changes,
            suppressed,
        } => {
            println!("  {} {}", "~".yellow().bold(), id);
            for change in changes {
                println!("      {}", format_change(change));
            }
            for change in suppressed {
                println!(
                    "      {}",
                    format!("{} (suppressed)", change.key).dimmed()
                );
            }
        }
        Diff::NoChange(_) => {}
    }
}

fn format_change(change: &AttributeChange) -> String {
    format!(
        "{}: {} => {}",
        change.key,
        format_value(&change.old).red(),
        format_value(&change.new).green()
    )
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(unset)".to_string(),
        other => other.to_string(),
    }
}
