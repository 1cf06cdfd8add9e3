use anyhow::{Context, bail};
use serde::{Serialize, Deserialize};
use serde_json::{Value as Json, Map as JsonMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{GenerateError, Result};

/// Read-only settings tree (`global`, `lambda`, `outputs`, `clusters`).
///
/// Lookups take a path of keys and report the dotted path when something is
/// missing, so callers can surface `MissingConfigKey` as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(pub Json);

fn dotted(path: &[&str]) -> String { path.join(".") }

impl Settings {
    pub fn new(v: Json) -> Self { Self(v) }

    pub fn get(&self, path: &[&str]) -> Option<&Json> {
        path.iter().try_fold(&self.0, |node, key| node.get(*key))
    }

    pub fn contains(&self, path: &[&str]) -> bool { self.get(path).is_some() }

    pub fn require(&self, path: &[&str]) -> Result<&Json> {
        self.get(path).ok_or_else(|| GenerateError::MissingConfigKey(dotted(path)))
    }

    pub fn str_at(&self, path: &[&str]) -> Result<&str> {
        self.require(path)?.as_str().ok_or_else(|| GenerateError::InvalidConfigValue {
            path: dotted(path), expected: "a string",
        })
    }

    /// Like [`Settings::str_at`], but an absent key yields `default`.
    pub fn str_or<'a>(&'a self, path: &[&str], default: &'a str) -> Result<&'a str> {
        match self.get(path) {
            None => Ok(default),
            Some(_) => self.str_at(path),
        }
    }

    pub fn u64_at(&self, path: &[&str]) -> Result<u64> {
        self.require(path)?.as_u64().ok_or_else(|| GenerateError::InvalidConfigValue {
            path: dotted(path), expected: "a non-negative integer",
        })
    }

    pub fn bool_or(&self, path: &[&str], default: bool) -> Result<bool> {
        match self.get(path) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| GenerateError::InvalidConfigValue {
                path: dotted(path), expected: "a boolean",
            }),
        }
    }

    /// Names under `clusters`, sorted.
    pub fn cluster_names(&self) -> Vec<String> {
        self.get(&["clusters"])
            .and_then(Json::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Load a `conf/` directory: `global` and `lambda` are required, `outputs`
    /// is optional, and every file in `clusters/` becomes `clusters.<stem>`.
    /// Each file may be JSON or YAML.
    pub fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut root = JsonMap::new();
        for section in ["global", "lambda"] {
            let v = read_section(dir, section)?
                .with_context(|| format!("{}: no {section}.json (or .yaml) found", dir.display()))?;
            root.insert(section.to_string(), v);
        }
        if let Some(v) = read_section(dir, "outputs")? {
            root.insert("outputs".to_string(), v);
        }

        let mut clusters = JsonMap::new();
        let clusters_dir = dir.join("clusters");
        if clusters_dir.is_dir() {
            let mut paths = Vec::new();
            for entry in std::fs::read_dir(&clusters_dir)
                .with_context(|| format!("read {}", clusters_dir.display()))?
            {
                paths.push(entry?.path());
            }
            paths.sort();
            for p in paths {
                if Format::of(&p).is_none() {
                    debug!(path = %p.display(), "skipping non-settings file");
                    continue;
                }
                let stem = p.file_stem().and_then(|s| s.to_str())
                    .with_context(|| format!("bad cluster file name {}", p.display()))?
                    .to_string();
                let v = parse_file(&p)?;
                if clusters.insert(stem.clone(), v).is_some() {
                    bail!("cluster '{stem}' is defined by more than one file");
                }
            }
        }
        info!(conf = %dir.display(), clusters = clusters.len(), "loaded settings");
        root.insert("clusters".to_string(), Json::Object(clusters));
        Ok(Self(Json::Object(root)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format { Json, Yaml }

impl Format {
    fn of(p: &Path) -> Option<Format> {
        match p.extension().and_then(|s| s.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

fn read_section(dir: &Path, name: &str) -> anyhow::Result<Option<Json>> {
    let found: Vec<PathBuf> = ["json", "yaml", "yml"].iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .filter(|p| p.is_file())
        .collect();
    match found.as_slice() {
        [] => Ok(None),
        [p] => parse_file(p).map(Some),
        _ => bail!("{}: '{name}' is defined by more than one file", dir.display()),
    }
}

fn parse_file(p: &Path) -> anyhow::Result<Json> {
    let bytes = std::fs::read(p).with_context(|| format!("read {}", p.display()))?;
    let v: Json = match Format::of(p) {
        Some(Format::Yaml) => serde_yaml::from_slice(&bytes)
            .with_context(|| format!("parse {}", p.display()))?,
        _ => serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", p.display()))?,
    };
    if !v.is_object() {
        bail!("{}: top level must be a mapping", p.display());
    }
    debug!(path = %p.display(), "parsed settings file");
    Ok(v)
}
