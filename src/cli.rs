use clap::{Parser, Subcommand};

/// Workstation bootstrapper
///
/// macstrap provisions a macOS workstation from declarative manifests:
/// Homebrew itself, the formulae, casks, fonts and taps listed in
/// `packages.toml`, and a Conda/Mamba environment from `environment.yml`.
/// Every stage checks current state first, so re-running is always safe.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect prerequisites and bootstrap Homebrew if it is missing
    Probe,

    /// Install every package declared in the manifests
    Bundle,

    /// Create or update the Conda environment (pruning undeclared packages)
    Env,

    /// Upgrade Homebrew packages, casks, the environment manager and the environment
    Update,

    /// Run probe, bundle and env in order
    All,

    /// Validate manifests and the environment file without changing anything
    Check,
}
