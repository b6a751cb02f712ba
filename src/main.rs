use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

#[derive(Parser)]
#[command(
    name = "moma",
    version,
    about = "Resolve module graphs and compose their types"
)]
struct Cli {
    /// Log resolver decisions (same as RUST_LOG=moma=debug)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve module names against the project's resources
    Resolve(cli::resolve::ResolveArgs),
    /// Show the resource path each name maps to
    Paths(cli::paths::PathsArgs),
    /// Create a moma.toml and an example manifest
    Init(cli::init::InitArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "moma=debug" } else { "moma=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Resolve(args) => cli::resolve::cmd_resolve(args),
        Command::Paths(args) => cli::paths::cmd_paths(args),
        Command::Init(args) => cli::init::cmd_init(args),
    }
}
