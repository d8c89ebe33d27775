use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Login shells whose profile we know how to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Zsh,
    Bash,
    Fish,
}

impl Shell {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "zsh" => Some(Shell::Zsh),
            "bash" => Some(Shell::Bash),
            "fish" => Some(Shell::Fish),
            _ => None,
        }
    }

    /// Detect from `$SHELL`; macOS has defaulted to zsh since Catalina.
    pub fn detect() -> Self {
        std::env::var("SHELL")
            .ok()
            .and_then(|shell| {
                Path::new(&shell)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(Shell::from_name)
            })
            .unwrap_or(Shell::Zsh)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shell::Zsh => "zsh",
            Shell::Bash => "bash",
            Shell::Fish => "fish",
        }
    }

    /// Login profile for this shell, relative to `home`.
    pub fn profile_path(self, home: &Path) -> PathBuf {
        match self {
            Shell::Zsh => home.join(".zprofile"),
            Shell::Bash => home.join(".bash_profile"),
            Shell::Fish => home.join(".config/fish/config.fish"),
        }
    }

    /// Line that puts Homebrew on `PATH` for new login shells.
    pub fn brew_shellenv(self, brew: &Path) -> String {
        match self {
            Shell::Zsh | Shell::Bash => format!("eval \"$({} shellenv)\"", brew.display()),
            Shell::Fish => format!("{} shellenv | source", brew.display()),
        }
    }
}

/// A shell profile file edited only through idempotent line appends.
#[derive(Debug, Clone)]
pub struct ShellProfile {
    shell: Shell,
    path: PathBuf,
}

impl ShellProfile {
    pub fn new(shell: Shell, path: PathBuf) -> Self {
        Self { shell, path }
    }

    pub fn for_shell(shell: Shell, home: &Path) -> Self {
        Self::new(shell, shell.profile_path(home))
    }

    pub fn shell(&self) -> Shell {
        self.shell
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the profile already has `line` (ignoring surrounding whitespace).
    pub fn contains(&self, line: &str) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read shell profile {:?}", self.path))?;
        let needle = line.trim();
        Ok(contents.lines().any(|existing| existing.trim() == needle))
    }

    /// Append `line` unless it is already present. Returns `true` if the file changed.
    pub fn ensure_line(&self, line: &str) -> Result<bool> {
        if self.contains(line)? {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let needs_newline = self.path.exists()
            && fs::read(&self.path)
                .map(|bytes| bytes.last().is_some_and(|b| *b != b'\n'))
                .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open shell profile {:?}", self.path))?;
        if needs_newline {
            writeln!(file)?;
        }
        writeln!(file, "{}", line.trim())
            .with_context(|| format!("Failed to write shell profile {:?}", self.path))?;

        info!(profile = %self.path.display(), "added line to shell profile");
        Ok(true)
    }
}
