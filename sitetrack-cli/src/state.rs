use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding `config.toml` and, by default, the database.
#[derive(Debug, Clone)]
pub struct Home {
    dir: PathBuf,
}

impl Home {
    /// `--home` wins, then `SITETRACK_HOME`, then `$HOME/.sitetrack`.
    pub fn resolve(flag: Option<PathBuf>) -> Result<Self> {
        let dir = match flag {
            Some(dir) => dir,
            None => match std::env::var_os("SITETRACK_HOME") {
                Some(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => {
                    let home = std::env::var("HOME").context("HOME is not set")?;
                    PathBuf::from(home).join(".sitetrack")
                }
            },
        };
        Ok(Self { dir })
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure(&self) -> Result<&Path> {
        fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        Ok(&self.dir)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join("config.toml")
    }

    /// Relative paths are taken relative to the home directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_beats_environment() {
        let home = Home::resolve(Some(PathBuf::from("/srv/site"))).unwrap();
        assert_eq!(home.dir(), Path::new("/srv/site"));
    }

    #[test]
    fn test_resolve_path() {
        let home = Home::at("/srv/site");
        assert_eq!(
            home.resolve_path(Path::new("data/s.db")),
            PathBuf::from("/srv/site/data/s.db")
        );
        assert_eq!(
            home.resolve_path(Path::new("/var/s.db")),
            PathBuf::from("/var/s.db")
        );
    }
}
