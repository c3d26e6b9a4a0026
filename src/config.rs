use crate::error::Result;
use crate::models::{Category, Priority};
use crate::query::SortKey;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub const APP_NAME: &str = "taskdeck";
pub const CONFIG_ENV: &str = "TASKDECK_CONFIG";
pub const DATA_DIR_ENV: &str = "TASKDECK_DATA_DIR";

// config.toml, every field optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub default_category: Category,
    pub default_priority: Priority,
    pub default_sort: SortKey,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: None,
            default_category: Category::Personal,
            default_priority: Priority::Medium,
            default_sort: SortKey::Manual,
        }
    }
}

impl Config {
    /// Reads the config file if there is one; a missing file means defaults.
    pub fn load() -> Result<Config> {
        let path = match env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => match dirs::config_dir() {
                Some(dir) => dir.join(APP_NAME).join("config.toml"),
                None => return Ok(Config::default()),
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&path)?;
        let config = Config::from_toml(&contents)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }

    /// `TASKDECK_DATA_DIR`, then the config file, then the platform data dir.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir_with(|key| env::var_os(key).map(PathBuf::from))
    }

    fn data_dir_with<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        lookup(DATA_DIR_ENV)
            .or_else(|| self.data_dir.clone())
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_NAME)))
            .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_NAME)))
    }
}
