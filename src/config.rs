use crate::db::Options;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NonDbConfig {
    pub root: Option<String>,
    pub extension: Option<String>,
    pub default_key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tables: BTreeMap<String, TableConfig>,
}

/// Per-table settings. Indices listed here are attached on every open.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TableConfig {
    pub key: Option<String>,
    #[serde(default)]
    pub indices: Vec<String>,
}

impl NonDbConfig {
    pub fn options(&self) -> Options {
        let defaults = Options::default();
        Options {
            extension: self.extension.clone().unwrap_or(defaults.extension),
            default_key: self.default_key.clone().unwrap_or(defaults.default_key),
        }
    }

    pub fn root_path(&self) -> PathBuf {
        self.root
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(default_root_path)
    }

    pub fn key_for_table(&self, name: &str) -> String {
        self.tables
            .get(name)
            .and_then(|t| t.key.clone())
            .unwrap_or_else(|| self.options().default_key)
    }

    pub fn indices_for_table(&self, name: &str) -> &[String] {
        self.tables
            .get(name)
            .map(|t| t.indices.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `expr` is maintained on every open of `table`
    pub fn is_indexed(&self, table: &str, expr: &str) -> bool {
        self.indices_for_table(table).iter().any(|e| e == expr)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("nondb.toml")
}

pub fn default_root_path() -> PathBuf {
    PathBuf::from("data")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<NonDbConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: NonDbConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &NonDbConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
