use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use whoami::fallible;

/// Base manifest file name inside the manifest directory.
pub const BASE_MANIFEST: &str = "packages.toml";

/// Kinds of entries a package manifest can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageKind {
    Tap,
    Formula,
    Cask,
    Font,
}

impl PackageKind {
    /// Install order: taps first so formulae and casks from them resolve.
    pub const ALL: [PackageKind; 4] = [
        PackageKind::Tap,
        PackageKind::Formula,
        PackageKind::Cask,
        PackageKind::Font,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PackageKind::Tap => "tap",
            PackageKind::Formula => "formula",
            PackageKind::Cask => "cask",
            PackageKind::Font => "font",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared package. Unique by `(name, kind)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub kind: PackageKind,
    /// Manager specific options such as `appdir` or `auto_updates`.
    pub options: BTreeMap<String, String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, kind: PackageKind) -> Self {
        Self {
            name: name.into(),
            kind,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
impl PackageSpec {
    pub(crate) fn formula(name: impl Into<String>) -> Self {
        Self::new(name, PackageKind::Formula)
    }

    pub(crate) fn cask(name: impl Into<String>) -> Self {
        Self::new(name, PackageKind::Cask)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// One manifest layer as read from disk.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub path: PathBuf,
    entries: Vec<PackageSpec>,
}

impl ManifestFile {
    fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file {:?}", path))?;
        let entries = parse_manifest(&contents)
            .with_context(|| format!("Failed to parse manifest file {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &[PackageSpec] {
        &self.entries
    }
}

/// The merged set of packages declared across all manifest layers.
///
/// Layers are `packages.toml`, then `packages-<platform>.toml`, then
/// `packages-<host>.toml`. A later layer replaces the options of an entry with
/// the same `(name, kind)`.
#[derive(Debug, Default)]
pub struct Manifest {
    files: Vec<ManifestFile>,
    merged: BTreeMap<(PackageKind, String), PackageSpec>,
}

impl Manifest {
    /// Load the layered manifests from `dir`. A missing base file yields an empty manifest.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let base_path = dir.join(BASE_MANIFEST);
        if !base_path.exists() {
            return Ok(Self::default());
        }

        let mut files = vec![ManifestFile::load(&base_path)?];
        if let Some(path) = variant_path(dir, platform_slug()) {
            files.push(ManifestFile::load(&path)?);
        }
        if let Some(path) = host_slug().and_then(|slug| variant_path(dir, &slug)) {
            files.push(ManifestFile::load(&path)?);
        }

        let mut merged = BTreeMap::new();
        for file in &files {
            for spec in &file.entries {
                merged.insert((spec.kind, spec.name.clone()), spec.clone());
            }
        }

        Ok(Self { files, merged })
    }

    /// Build a manifest directly from specs, deduplicating by `(name, kind)`.
    pub fn from_specs(specs: impl IntoIterator<Item = PackageSpec>) -> Self {
        let merged = specs
            .into_iter()
            .map(|spec| ((spec.kind, spec.name.clone()), spec))
            .collect();
        Self {
            files: Vec::new(),
            merged,
        }
    }

    /// Packages in install order: taps, formulae, casks, fonts; by name within a kind.
    pub fn packages(&self) -> impl Iterator<Item = &PackageSpec> {
        self.merged.values()
    }

    pub fn of_kind(&self, kind: PackageKind) -> impl Iterator<Item = &PackageSpec> {
        self.merged.values().filter(move |spec| spec.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Manifest layers in precedence order.
    pub fn files(&self) -> &[ManifestFile] {
        &self.files
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    tap: BTreeMap<String, BTreeMap<String, toml::Value>>,
    #[serde(default)]
    formula: BTreeMap<String, BTreeMap<String, toml::Value>>,
    #[serde(default)]
    cask: BTreeMap<String, BTreeMap<String, toml::Value>>,
    #[serde(default)]
    font: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

fn parse_manifest(contents: &str) -> Result<Vec<PackageSpec>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let raw: RawManifest = toml::from_str(contents)?;
    let tables = [
        (PackageKind::Tap, raw.tap),
        (PackageKind::Formula, raw.formula),
        (PackageKind::Cask, raw.cask),
        (PackageKind::Font, raw.font),
    ];

    let mut specs = Vec::new();
    for (kind, table) in tables {
        for (name, raw_options) in table {
            if name.trim().is_empty() {
                bail!("{kind} entry has an empty name");
            }
            let mut spec = PackageSpec::new(name, kind);
            for (key, value) in raw_options {
                let value = option_value(&value).with_context(|| {
                    format!("Invalid option '{key}' for {kind} '{}'", spec.name)
                })?;
                spec = spec.with_option(key, value);
            }
            specs.push(spec);
        }
    }
    Ok(specs)
}

fn option_value(value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        other => bail!("expected a string, boolean or number, found {}", other.type_str()),
    }
}

fn variant_path(dir: &Path, slug: &str) -> Option<PathBuf> {
    let path = dir.join(format!("packages-{slug}.toml"));
    path.exists().then_some(path)
}

pub(crate) fn platform_slug() -> &'static str {
    std::env::consts::OS
}

pub(crate) fn host_slug() -> Option<String> {
    let raw = fallible::hostname()
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            std::env::var("HOSTNAME")
                .ok()
                .filter(|value| !value.trim().is_empty())
        })?;

    let raw = raw.split('.').next().unwrap_or(&raw).to_string();
    let mut slug = String::new();
    let mut previous_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            previous_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if !previous_dash {
            previous_dash = true;
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-').to_string();
    (!slug.is_empty()).then_some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_all_kinds_with_options() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(BASE_MANIFEST),
            r#"
# CLI tools
[formula.fd]
[formula.ripgrep]

[tap."buo/cask-upgrade"]

[cask.iterm2]
appdir = "~/Applications"
auto_updates = true

[font.font-fira-code]
"#,
        )
        .unwrap();

        let manifest = Manifest::load_from_dir(temp.path()).unwrap();
        assert_eq!(manifest.len(), 5);

        let order: Vec<String> = manifest.packages().map(|spec| spec.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "tap buo/cask-upgrade",
                "formula fd",
                "formula ripgrep",
                "cask iterm2",
                "font font-fira-code",
            ]
        );

        let iterm = manifest.of_kind(PackageKind::Cask).next().unwrap();
        assert_eq!(iterm.options.get("appdir").unwrap(), "~/Applications");
        assert_eq!(iterm.options.get("auto_updates").unwrap(), "true");
    }

    #[test]
    fn missing_base_manifest_is_empty() {
        let temp = TempDir::new().unwrap();
        let manifest = Manifest::load_from_dir(temp.path()).unwrap();
        assert!(manifest.is_empty());
        assert!(manifest.files().is_empty());
    }

    #[test]
    fn same_name_different_kind_are_distinct() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(BASE_MANIFEST),
            "[formula.docker]\n[cask.docker]\n",
        )
        .unwrap();
        let manifest = Manifest::load_from_dir(temp.path()).unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn platform_variant_overrides_base_entry() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(BASE_MANIFEST),
            "[cask.firefox]\nappdir = \"/Applications\"\n[formula.fd]\n",
        )
        .unwrap();
        fs::write(
            temp.path().join(format!("packages-{}.toml", platform_slug())),
            "[cask.firefox]\nappdir = \"~/Applications\"\n[formula.jq]\n",
        )
        .unwrap();

        let manifest = Manifest::load_from_dir(temp.path()).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.files().len(), 2);
        let firefox = manifest.of_kind(PackageKind::Cask).next().unwrap();
        assert_eq!(firefox.options.get("appdir").unwrap(), "~/Applications");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(BASE_MANIFEST), "[mas.xcode]\n").unwrap();
        let err = Manifest::load_from_dir(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse manifest"));
    }

    #[test]
    fn nested_tables_are_not_options() {
        let err = parse_manifest("[cask.iterm2]\nargs = { appdir = \"x\" }\n").unwrap_err();
        assert!(format!("{err:#}").contains("Invalid option 'args'"));
    }

    #[test]
    fn from_specs_deduplicates() {
        let manifest = Manifest::from_specs([
            PackageSpec::formula("fd"),
            PackageSpec::formula("fd").with_option("HEAD", "true"),
        ]);
        assert_eq!(manifest.len(), 1);
        let fd = manifest.packages().next().unwrap();
        assert_eq!(fd.options.get("HEAD").map(String::as_str), Some("true"));
    }
}
