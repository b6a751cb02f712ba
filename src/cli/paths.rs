use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Args;

use super::load_config;

#[derive(Args)]
pub struct PathsArgs {
    /// Module names or resource paths to map
    #[arg(required = true)]
    pub names: Vec<String>,
    /// Path to moma.toml (default: nearest one above the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn cmd_paths(args: PathsArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let policy = config.path_policy();

    let mut unmapped = 0;
    for name in &args.names {
        match policy.resolve(name) {
            Some(path) => {
                let marker = if path.exists() { "" } else { "  (missing)" };
                println!("{} -> {}{}", name, path.display(), marker);
            }
            None => {
                println!("{} -> (no mapping)", name);
                unmapped += 1;
            }
        }
    }

    if unmapped > 0 {
        process::exit(1);
    }
    Ok(())
}
