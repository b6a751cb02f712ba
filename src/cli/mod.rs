pub mod init;
pub mod paths;
pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use moma::config::Config;
use moma::diagnostic::Diagnostic;

/// Load `--config`, or the nearest moma.toml above the current directory,
/// or fall back to defaults rooted at the current directory.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let path: Option<PathBuf> = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => Config::find(&cwd),
    };
    let Some(path) = path else {
        tracing::debug!(dir = %cwd.display(), "no moma.toml found; using defaults");
        return Ok(Config::with_root(cwd));
    };

    Config::load(&path).map_err(|diag| report(&diag, &path))
}

/// Render a file diagnostic and turn it into an error for `main`.
fn report(diag: &Diagnostic, path: &Path) -> anyhow::Error {
    let filename = path.display().to_string();
    match std::fs::read_to_string(path) {
        Ok(source) => diag.render(&filename, &source),
        Err(_) => eprintln!("error: {}", diag.message),
    }
    anyhow!("failed to load '{}'", filename)
}
