use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::json;
use tracing::warn;

use moma::loader::FsLoader;
use moma::resolve::{ModuleManager, ResourceState};
use moma::runtime::{drive, DriveSummary};

use super::load_config;

#[derive(Args)]
pub struct ResolveArgs {
    /// Module names or resource paths (default: resolver.entry)
    pub names: Vec<String>,
    /// Path to moma.toml (default: nearest one above the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Give up on outstanding fetches after this many milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_resolve(args: ResolveArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let names = if args.names.is_empty() {
        config.resolver.entry.clone()
    } else {
        args.names
    };
    if names.is_empty() {
        bail!("nothing to resolve: pass module names or set resolver.entry in moma.toml");
    }

    let mut manager = config.manager();
    for name in &names {
        if manager.request_resource(name, None).is_none() {
            warn!(name = %name, "no path mapping for entry");
        }
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start runtime")?;
    let timeout = Duration::from_millis(args.timeout_ms);
    let summary = runtime.block_on(async {
        tokio::time::timeout(timeout, drive(&mut manager, &FsLoader)).await
    });
    let summary = match summary {
        Ok(summary) => summary,
        Err(_) => {
            warn!(timeout_ms = args.timeout_ms, "fetches still outstanding; giving up");
            DriveSummary {
                fetched: manager.resources().len(),
                phase: manager.phase(),
                unsolved: manager.unsolved(),
            }
        }
    };

    let failed = failed_entries(&manager, &names);
    if args.json {
        println!("{}", json_report(&manager, &summary, &failed));
    } else {
        print_report(&manager, &summary, &failed);
    }

    if !summary.is_complete() || manager.pending_resources() > 0 || !failed.is_empty() {
        process::exit(1);
    }
    Ok(())
}

/// Entries that did not come out resolved. A module name must end up solved;
/// a direct resource path only has to load.
fn failed_entries(manager: &ModuleManager, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|name| {
            if manager.paths().has_resource_suffix(name) {
                let loaded = manager
                    .paths()
                    .resolve(name)
                    .and_then(|path| manager.resource_state(&path).cloned());
                loaded != Some(ResourceState::Loaded)
            } else {
                !manager.is_solved(name)
            }
        })
        .cloned()
        .collect()
}

fn print_report(manager: &ModuleManager, summary: &DriveSummary, failed: &[String]) {
    println!("Solved ({}):", manager.solved_order().len());
    for (i, name) in manager.solved_order().iter().enumerate() {
        println!("  {:>3}. {}", i + 1, name);
    }

    if !summary.unsolved.is_empty() {
        println!("\nUnsolved ({}):", summary.unsolved.len());
        for status in manager.dump_status().iter().filter(|s| !s.solved) {
            println!("  {}", status);
        }
    }

    let resources = manager.resources();
    if !resources.is_empty() {
        println!("\nResources ({}, {} fetched):", resources.len(), summary.fetched);
        for resource in &resources {
            println!("  {}", resource);
        }
    }

    if !failed.is_empty() {
        println!("\nEntries not resolved ({}):", failed.len());
        for name in failed {
            println!("  {}", name);
        }
    }

    let diagnostics = manager.diagnostics();
    if !diagnostics.is_empty() {
        println!("\nProblems ({}):", diagnostics.len());
        for diag in diagnostics {
            println!("  {}", diag);
        }
    }

    let cycles = manager.cycles();
    if !cycles.is_empty() {
        println!("\nCycles:");
        for cycle in cycles {
            println!("  {}", cycle.join(" <-> "));
        }
    }
}

fn json_report(
    manager: &ModuleManager,
    summary: &DriveSummary,
    failed: &[String],
) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = manager
        .dump_status()
        .into_iter()
        .map(|s| {
            json!({
                "name": s.name,
                "solved": s.solved,
                "unresolved": s.unresolved,
                "failed": s.failed,
            })
        })
        .collect();
    let resources: Vec<serde_json::Value> = manager
        .resources()
        .into_iter()
        .map(|r| {
            json!({
                "path": r.path.display().to_string(),
                "origins": r.origins,
                "state": r.state.to_string(),
            })
        })
        .collect();
    let problems: Vec<String> = manager.diagnostics().iter().map(|d| d.to_string()).collect();

    json!({
        "solved": manager.solved_order(),
        "fetched": summary.fetched,
        "phase": format!("{:?}", summary.phase),
        "nodes": nodes,
        "resources": resources,
        "failed_entries": failed,
        "problems": problems,
        "cycles": manager.cycles(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use moma::{LoadError, ModuleDescriptor, PathPolicy};

    fn manager() -> ModuleManager {
        ModuleManager::new(PathPolicy::new("/proj").map("app", "src/app"))
    }

    fn entries(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    /// Request every entry, answer each fetch with `answer`, and settle.
    fn settle(
        m: &mut ModuleManager,
        names: &[String],
        answer: impl Fn(&PathBuf) -> Result<Vec<ModuleDescriptor>, LoadError>,
    ) {
        for name in names {
            m.request_resource(name, None);
        }
        for request in m.take_requests() {
            let outcome = answer(&request.path);
            m.complete_resource(request.path, outcome);
        }
        m.run_pending();
    }

    #[test]
    fn test_solved_entry_passes() {
        let mut m = manager();
        let names = entries(&["app.Main"]);
        settle(&mut m, &names, |_| Ok(vec![ModuleDescriptor::new("app.Main")]));
        assert!(failed_entries(&m, &names).is_empty());
    }

    #[test]
    fn test_missing_file_fails_entry() {
        let mut m = manager();
        let names = entries(&["app.Main"]);
        settle(&mut m, &names, |path| Err(LoadError::NotFound(path.clone())));
        assert_eq!(m.pending_resources(), 0);
        assert!(m.unsolved().is_empty());
        assert_eq!(failed_entries(&m, &names), names);
    }

    #[test]
    fn test_unmapped_entry_fails() {
        let mut m = manager();
        let names = entries(&["other.Thing"]);
        settle(&mut m, &names, |_| Ok(Vec::new()));
        assert!(m.resources().is_empty());
        assert_eq!(failed_entries(&m, &names), names);
    }

    #[test]
    fn test_entry_missing_from_its_resource_fails() {
        let mut m = manager();
        let names = entries(&["app.Main"]);
        settle(&mut m, &names, |_| Ok(vec![ModuleDescriptor::new("app.Other")]));
        assert!(m.is_solved("app.Other"));
        assert_eq!(failed_entries(&m, &names), names);
    }

    #[test]
    fn test_resource_path_entry_only_needs_to_load() {
        let mut m = manager();
        let names = entries(&["vendor/lib.toml", "vendor/gone.toml"]);
        settle(&mut m, &names, |path| {
            if path.ends_with("lib.toml") {
                Ok(Vec::new())
            } else {
                Err(LoadError::NotFound(path.clone()))
            }
        });
        assert_eq!(failed_entries(&m, &names), entries(&["vendor/gone.toml"]));
    }
}
