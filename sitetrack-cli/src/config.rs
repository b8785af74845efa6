use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sitetrack_core::{CascadeSettings, EmployeeId, parse_timezone};
use std::fs;
use std::path::PathBuf;

use crate::state::Home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreSection,
    pub cascade: CascadeSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// SQLite file; relative paths resolve against the sitetrack home.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSection {
    /// Sender id stamped on system chat entries.
    pub system_actor_id: i64,
    /// IANA zone used for milestone completion dates.
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Filter directive; `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sitetrack.db"),
        }
    }
}

impl Default for CascadeSection {
    fn default() -> Self {
        Self {
            system_actor_id: 0,
            timezone: "America/Chicago".to_string(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn cascade_settings(&self) -> Result<CascadeSettings> {
        let timezone = parse_timezone(&self.cascade.timezone).context("cascade.timezone")?;
        Ok(CascadeSettings {
            system_actor: EmployeeId(self.cascade.system_actor_id),
            timezone,
        })
    }
}

pub fn load_config(home: &Home) -> Result<Config> {
    let p = home.config_path();
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(home: &Home, cfg: &Config) -> Result<()> {
    home.ensure()?;
    let p = home.config_path();
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

/// Writes the default config unless one already exists. Returns whether a
/// file was written.
pub fn init_config(home: &Home) -> Result<bool> {
    if home.config_path().exists() {
        return Ok(false);
    }
    save_config(home, &Config::default())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let home = Home::at(dir.path());
        assert_eq!(load_config(&home).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let home = Home::at(dir.path());
        fs::write(
            home.config_path(),
            "[cascade]\ntimezone = \"Europe/Berlin\"\n",
        )
        .unwrap();

        let cfg = load_config(&home).unwrap();
        assert_eq!(cfg.cascade.timezone, "Europe/Berlin");
        assert_eq!(cfg.cascade.system_actor_id, 0);
        assert_eq!(cfg.store.path, PathBuf::from("sitetrack.db"));
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let home = Home::at(dir.path().join("nested"));
        assert!(init_config(&home).unwrap());

        let mut cfg = load_config(&home).unwrap();
        cfg.cascade.system_actor_id = 42;
        save_config(&home, &cfg).unwrap();

        assert!(!init_config(&home).unwrap());
        assert_eq!(load_config(&home).unwrap().cascade.system_actor_id, 42);
    }

    #[test]
    fn test_default_config_matches_library_defaults() {
        assert_eq!(
            Config::default().cascade_settings().unwrap(),
            CascadeSettings::default()
        );
    }

    #[test]
    fn test_bad_timezone_is_reported() {
        let mut cfg = Config::default();
        cfg.cascade.timezone = "Mars/Olympus".to_string();
        assert!(cfg.cascade_settings().is_err());

        cfg.cascade.timezone = "UTC".to_string();
        assert_eq!(
            cfg.cascade_settings().unwrap().timezone,
            parse_timezone("UTC").unwrap()
        );
    }
}
