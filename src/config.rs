// Copyright 2026 Fels Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde::Serialize;

use crate::transfer::RetryPolicy;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "FELS_CONFIG";
/// Overrides the default catalogue directory.
pub const OUTPUT_DIR_ENV: &str = "FELS_DEFAULT_OUTPUTDIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where catalogue indexes and their caches live.
    pub catalog_dir: Option<PathBuf>,
    /// Where the reference grid GeoJSON files live; defaults to the
    /// catalogue directory.
    pub grid_dir: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_dir: None,
            grid_dir: None,
            retry_attempts: 3,
            retry_delay_secs: 10,
            timeout_secs: 600,
        }
    }
}

impl Config {
    pub fn catalog_dir(&self) -> PathBuf {
        self.catalog_dir.clone().unwrap_or_else(default_catalog_dir)
    }

    /// Configured grid directory, else the catalogue directory in use.
    pub fn grid_dir(&self, catalog_dir: &Path) -> PathBuf {
        self.grid_dir
            .clone()
            .unwrap_or_else(|| catalog_dir.to_path_buf())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_secs(self.retry_delay_secs),
        )
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub fn default_catalog_dir() -> PathBuf {
    if let Some(dir) = non_empty_env(OUTPUT_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .map(|dir| dir.join("fels"))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn global_config_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_env(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("fels").join("fels.toml"))
}

pub fn load_global_config() -> Result<Config> {
    let Some(path) = global_config_path() else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    read_config(&path)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: Config =
        toml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    if config.timeout_secs == 0 {
        bail!("timeout_secs in {} must be positive", path.display());
    }
    Ok(config)
}
