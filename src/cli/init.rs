use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use moma::config::CONFIG_FILE;

#[derive(Args)]
pub struct InitArgs {
    /// Project directory (defaults to the current directory)
    pub dir: Option<PathBuf>,
}

const CONFIG_TEMPLATE: &str = r#"[resolver]
base_dir = "."
suffixes = ["toml"]
initializer = "init"
auto_fetch = true
entry = ["app.Main"]

[paths]
"" = "modules"
"#;

const MAIN_TEMPLATE: &str = r#"[[module]]
name = "app.Main"
requires = ["app.Base"]
extends = "app.Base"
aliases = ["Main"]

[module.defaults]
title = "main"

[[module]]
name = "app.Base"

[module.defaults]
title = "base"
visible = true

[module.constants]
VERSION = 1
"#;

pub fn cmd_init(args: InitArgs) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        bail!("'{}' already exists", config_path.display());
    }

    let modules_dir = dir.join("modules").join("app");
    std::fs::create_dir_all(&modules_dir)
        .with_context(|| format!("cannot create '{}'", modules_dir.display()))?;
    write(&config_path, CONFIG_TEMPLATE)?;
    write(&modules_dir.join("Main.toml"), MAIN_TEMPLATE)?;

    eprintln!(
        "Created {} in {}\n\n  moma resolve",
        CONFIG_FILE,
        dir.display()
    );
    Ok(())
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("cannot write '{}'", path.display()))
}
