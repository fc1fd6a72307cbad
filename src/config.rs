// cpe-insight - CLI for the CPE Insight API
// Copyright (C) 2024 cpe-insight contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://wifi.telenor.no";
pub const DEFAULT_API_BASE: &str = "/api";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub api_base: Option<String>,
    pub password: Option<String>,
    pub verify_tls: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error(
        "password required; pass it with `cpe-insight --password \"...\"` or save it with `--save-config`"
    )]
    MissingPassword,
}

#[derive(Debug)]
pub struct EffectiveConfig {
    pub base_url: String,
    pub api_base: String,
    pub password: Option<String>,
    pub verify_tls: bool,
}

impl EffectiveConfig {
    pub fn require_password(&self) -> Result<&str, ConfigError> {
        self.password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingPassword)
    }
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".cpe-insight.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var("CPE_INSIGHT_CONFIG_DIR") {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("cpe-insight").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

/// Merges both config files, then applies command-line overrides on top.
pub fn resolve(cwd: &Path, overrides: Config) -> Result<EffectiveConfig> {
    let merged = merge(load(cwd)?, overrides);

    Ok(EffectiveConfig {
        base_url: merged
            .base_url
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_base: merged
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        password: merged.password,
        verify_tls: merged.verify_tls.unwrap_or(true),
    })
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

/// Fields set in `over` win.
pub fn merge(base: Config, over: Config) -> Config {
    Config {
        base_url: over.base_url.or(base.base_url),
        api_base: over.api_base.or(base.api_base),
        password: over.password.or(base.password),
        verify_tls: over.verify_tls.or(base.verify_tls),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::{env, fs};
    use tempfile::tempdir;

    static ENV_LOCK: OnceLock<std::sync::Mutex<()>> = OnceLock::new();

    fn isolate(cwd: &Path) {
        unsafe {
            env::set_var("CPE_INSIGHT_CONFIG_DIR", cwd.join("config"));
        }
        fs::create_dir_all(cwd.join("config")).unwrap();
    }

    #[test]
    fn merges_user_and_local_and_overrides() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        isolate(cwd.path());

        let user_cfg = Config {
            base_url: Some("https://router.example".into()),
            api_base: Some("/api/v2".into()),
            password: Some("user-pass".into()),
            verify_tls: Some(false),
        };
        save(Scope::User, &user_cfg, cwd.path()).unwrap();

        let local_cfg = Config {
            password: Some("local-pass".into()),
            ..Config::default()
        };
        save(Scope::Local, &local_cfg, cwd.path()).unwrap();

        let effective = resolve(cwd.path(), Config::default()).unwrap();
        assert_eq!(effective.base_url, "https://router.example");
        assert_eq!(effective.api_base, "/api/v2");
        assert_eq!(effective.require_password().unwrap(), "local-pass");
        assert!(!effective.verify_tls);

        let overridden = resolve(
            cwd.path(),
            Config {
                base_url: Some("http://192.168.1.1".into()),
                password: Some("flag-pass".into()),
                ..Config::default()
            },
        )
        .unwrap();
        assert_eq!(overridden.base_url, "http://192.168.1.1");
        assert_eq!(overridden.require_password().unwrap(), "flag-pass");
        assert_eq!(overridden.api_base, "/api/v2");
    }

    #[test]
    fn defaults_apply_without_files() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        isolate(cwd.path());

        let effective = resolve(cwd.path(), Config::default()).unwrap();
        assert_eq!(effective.base_url, DEFAULT_BASE_URL);
        assert_eq!(effective.api_base, DEFAULT_API_BASE);
        assert!(effective.verify_tls);
        let err = effective.require_password().unwrap_err();
        assert!(err.to_string().contains("password required"));
    }

    #[test]
    fn load_scope_reads_only_that_file() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        isolate(cwd.path());

        let local_cfg = Config {
            api_base: Some("/x".into()),
            ..Config::default()
        };
        let path = save(Scope::Local, &local_cfg, cwd.path()).unwrap();
        assert_eq!(path, cwd.path().join(".cpe-insight.yaml"));

        assert_eq!(load_scope(Scope::Local, cwd.path()).unwrap(), local_cfg);
        assert_eq!(load_scope(Scope::User, cwd.path()).unwrap(), Config::default());
    }
}
