use std::path::{Path, PathBuf};
use tracing::debug;

use crate::process::{CommandLine, CommandRunner};

/// Default install prefixes checked when `brew` is not yet on `PATH`.
const HOMEBREW_PREFIXES: &[&str] = &[
    "/opt/homebrew/bin/brew",
    "/usr/local/bin/brew",
    "/home/linuxbrew/.linuxbrew/bin/brew",
];

/// Which prerequisite tools are present on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolAvailability {
    pub compiler_toolchain: bool,
    pub package_manager: bool,
    pub env_manager: bool,
    pub fast_env_manager: bool,
    /// Resolved `brew` executable.
    pub brew: Option<PathBuf>,
    /// Resolved `conda` executable.
    pub conda: Option<PathBuf>,
    /// Resolved `mamba` executable.
    pub mamba: Option<PathBuf>,
}

impl ToolAvailability {
    /// Human readable summary, e.g. `toolchain ✓  brew ✓  conda ✗  mamba ✗`.
    pub fn summary(&self) -> String {
        let mark = |present: bool| if present { "✓" } else { "✗" };
        format!(
            "toolchain {}  brew {}  conda {}  mamba {}",
            mark(self.compiler_toolchain),
            mark(self.package_manager),
            mark(self.conda.is_some()),
            mark(self.fast_env_manager),
        )
    }
}

/// Locates executables. Abstracted so probing can be tested without touching `PATH`.
pub trait ToolLocator {
    fn find(&self, name: &str) -> Option<PathBuf>;
    fn exists(&self, path: &Path) -> bool;
}

/// Looks tools up on the real `PATH` with the `which` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn find(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Detect prerequisite tools. Only read-only lookups are performed.
pub fn probe(locator: &dyn ToolLocator, runner: &dyn CommandRunner) -> ToolAvailability {
    let brew = locate_brew(locator);
    let conda = locate_beside_brew(locator, "conda", brew.as_deref());
    let mamba = locate_beside_brew(locator, "mamba", brew.as_deref());
    let compiler_toolchain = has_compiler_toolchain(locator, runner);

    let availability = ToolAvailability {
        compiler_toolchain,
        package_manager: brew.is_some(),
        env_manager: conda.is_some() || mamba.is_some(),
        fast_env_manager: mamba.is_some(),
        brew,
        conda,
        mamba,
    };
    debug!(?availability, "probe complete");
    availability
}

/// Find `brew` on `PATH`, falling back to the default install prefixes.
pub fn locate_brew(locator: &dyn ToolLocator) -> Option<PathBuf> {
    locator.find("brew").or_else(|| {
        HOMEBREW_PREFIXES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| locator.exists(candidate))
    })
}

/// Find a tool on `PATH`, falling back to brew's own bin directory.
///
/// Casks such as `miniforge` link into that directory, which is not on the
/// running process's `PATH` until the shell profile is re-read.
fn locate_beside_brew(
    locator: &dyn ToolLocator,
    name: &str,
    brew: Option<&Path>,
) -> Option<PathBuf> {
    locator.find(name).or_else(|| {
        brew.and_then(Path::parent)
            .map(|dir| dir.join(name))
            .filter(|candidate| locator.exists(candidate))
    })
}

fn has_compiler_toolchain(locator: &dyn ToolLocator, runner: &dyn CommandRunner) -> bool {
    if cfg!(target_os = "macos") {
        if let Some(xcode_select) = locator.find("xcode-select") {
            let query = CommandLine::new(xcode_select).arg("-p");
            return match runner.output(&query) {
                Ok(output) => output.success && !output.stdout.trim().is_empty(),
                Err(err) => {
                    debug!("xcode-select probe failed: {err:#}");
                    false
                }
            };
        }
        return false;
    }
    locator.find("cc").is_some()
}
