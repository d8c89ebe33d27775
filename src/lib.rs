// Public API
pub mod cli;
pub mod commands;

// Core domain types
pub mod config;
pub mod environment;
pub mod error;
pub mod installers;
pub mod manifest;
pub mod probe;
pub mod process;
pub mod provision;
pub mod shell_profile;
pub mod stage;
pub mod sync;
pub mod update;
mod ui;
mod workspace;

// Re-export main types
pub use config::Config;
pub use environment::{EnvironmentSpec, DEFAULT_ENVIRONMENT};
pub use error::ProvisionError;
pub use installers::{Installer, PackageManager};
pub use manifest::{Manifest, PackageKind, PackageSpec};
pub use probe::{probe, ToolAvailability};
pub use shell_profile::{Shell, ShellProfile};
pub use stage::{Stage, StageResult, StageStatus};
pub use sync::{EnvironmentManager, Synchronizer};
pub use update::UpdateOrchestrator;
pub use workspace::{Workspace, WorkspacePath};
