//! Plugin manifest (`manifest.json`) read by the host before running a hook.

use crate::hooks::HookKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "manifest.json";

/// What a plugin is for; decides which hooks the host will send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PluginKind {
    /// Unknown or missing type. Only `load` is sent.
    #[default]
    Internal,
    Configuration,
    Dependency,
    Resolver,
    Build,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Internal => "internal",
            PluginKind::Configuration => "configuration",
            PluginKind::Dependency => "dependency",
            PluginKind::Resolver => "resolver",
            PluginKind::Build => "build",
        }
    }

    /// Case-insensitive; unrecognised names map to `Internal`.
    pub fn from_name(name: &str) -> Self {
        [
            PluginKind::Configuration,
            PluginKind::Dependency,
            PluginKind::Resolver,
            PluginKind::Build,
        ]
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
        .unwrap_or(PluginKind::Internal)
    }

    pub fn supports(&self, hook: HookKind) -> bool {
        match hook {
            HookKind::Load => true,
            HookKind::Build => matches!(self, PluginKind::Build | PluginKind::Configuration),
            HookKind::Install => matches!(self, PluginKind::Build),
            HookKind::Remove => matches!(self, PluginKind::Dependency),
            HookKind::Resolve => matches!(self, PluginKind::Resolver),
        }
    }
}

impl From<String> for PluginKind {
    fn from(name: String) -> Self {
        PluginKind::from_name(&name)
    }
}

impl From<PluginKind> for String {
    fn from(kind: PluginKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(rename = "type", default)]
    pub kind: PluginKind,
    #[serde(default)]
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Executable path relative to the plugin directory.
    #[serde(default)]
    pub executable: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("manifest at {path} is empty")]
    Empty { path: PathBuf },
    #[error("{kind} plugin has no executable in {path}")]
    MissingExecutable { path: PathBuf, kind: PluginKind },
}

impl PluginManifest {
    /// Reads `manifest.json` from a plugin directory.
    pub fn load(plugin_dir: &Path) -> Result<Self, ManifestError> {
        let path = plugin_dir.join(MANIFEST_FILE);
        let contents = fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let manifest = Self::parse(&contents).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;
        let manifest = manifest.ok_or_else(|| ManifestError::Empty { path: path.clone() })?;

        if manifest.kind != PluginKind::Internal && manifest.executable.is_none() {
            return Err(ManifestError::MissingExecutable {
                path,
                kind: manifest.kind,
            });
        }
        Ok(manifest)
    }

    /// Parses manifest JSON; `None` for an empty object.
    pub fn parse(contents: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        if value.as_object().is_some_and(|map| map.is_empty()) {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }

    pub fn executable_path(&self, plugin_dir: &Path) -> Option<PathBuf> {
        self.executable.as_ref().map(|exe| plugin_dir.join(exe))
    }
}
