use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Points straight at an install directory, skipping the search.
pub const ROOT_ENV_VAR: &str = "RESCUE_ROOT";
pub const THEME_FILE_NAME: &str = "main-theme.mid";
pub const LEADERBOARD_FILE_NAME: &str = "leaderboard.bin";

const ASSETS_DIR: &str = "assets";
const DATA_DIR: &str = "data";

#[derive(Debug, Error)]
pub enum PathsError {
    #[error(
        "{var}={path} does not contain assets/{theme}",
        var = ROOT_ENV_VAR,
        theme = THEME_FILE_NAME
    )]
    BadOverride { path: PathBuf },
    #[error(
        "no assets/{theme} found above {dirs}; set {var} to the game directory",
        dirs = display_all(.searched),
        theme = THEME_FILE_NAME,
        var = ROOT_ENV_VAR
    )]
    NotInstalled { searched: Vec<PathBuf> },
    #[error("cannot create save directory {path}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the game reads its theme and keeps its leaderboard.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Uses `RESCUE_ROOT` when set, otherwise the nearest install directory
    /// above the executable or the working directory.
    pub fn discover() -> Result<Self, PathsError> {
        let starts: Vec<PathBuf> = [
            env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            env::current_dir().ok(),
        ]
        .into_iter()
        .flatten()
        .collect();
        let root = find_root(env::var_os(ROOT_ENV_VAR).map(PathBuf::from), &starts)?;
        Self::at(root)
    }

    /// Lays out the directories under `root`, creating the save directory.
    pub fn at(root: PathBuf) -> Result<Self, PathsError> {
        let data_dir = root.join(DATA_DIR);
        fs::create_dir_all(&data_dir).map_err(|source| PathsError::DataDir {
            path: data_dir.clone(),
            source,
        })?;
        Ok(Self {
            assets_dir: root.join(ASSETS_DIR),
            data_dir,
            root,
        })
    }

    pub fn theme_path(&self) -> PathBuf {
        self.assets_dir.join(THEME_FILE_NAME)
    }

    pub fn leaderboard_path(&self) -> PathBuf {
        self.data_dir.join(LEADERBOARD_FILE_NAME)
    }
}

fn find_root(override_dir: Option<PathBuf>, starts: &[PathBuf]) -> Result<PathBuf, PathsError> {
    if let Some(dir) = override_dir {
        return if has_theme(&dir) {
            Ok(dir)
        } else {
            Err(PathsError::BadOverride { path: dir })
        };
    }

    for start in starts {
        if let Some(found) = start.ancestors().find(|dir| has_theme(dir)) {
            debug!(start = %start.display(), root = %found.display(), "install_dir_found");
            return Ok(found.to_path_buf());
        }
    }
    Err(PathsError::NotInstalled {
        searched: starts.to_vec(),
    })
}

fn has_theme(dir: &Path) -> bool {
    dir.join(ASSETS_DIR).join(THEME_FILE_NAME).is_file()
}

fn display_all(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn install() -> TempDir {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        fs::write(temp.path().join("assets/main-theme.mid"), b"MThd").expect("theme");
        temp
    }

    #[test]
    fn search_walks_up_to_the_install_dir() {
        let temp = install();
        let nested = temp.path().join("target/debug");
        fs::create_dir_all(&nested).expect("nested");

        let root = find_root(None, &[PathBuf::from("/nonexistent"), nested]).expect("root");
        assert_eq!(root, temp.path());
    }

    #[test]
    fn override_must_hold_the_theme() {
        let temp = install();
        assert_eq!(
            find_root(Some(temp.path().to_path_buf()), &[]).expect("root"),
            temp.path()
        );

        let empty = TempDir::new().expect("temp");
        let err = find_root(Some(empty.path().to_path_buf()), &[temp.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, PathsError::BadOverride { .. }));
    }

    #[test]
    fn missing_install_names_every_search_start() {
        let empty = TempDir::new().expect("temp");
        let err = find_root(None, &[empty.path().to_path_buf()]).unwrap_err();
        assert!(err.to_string().contains(&empty.path().display().to_string()));
        assert!(err.to_string().contains(ROOT_ENV_VAR));
    }

    #[test]
    fn layout_creates_data_dir_and_names_files() {
        let temp = install();
        let paths = AppPaths::at(temp.path().to_path_buf()).expect("paths");
        assert!(paths.data_dir.is_dir());
        assert_eq!(paths.theme_path(), temp.path().join("assets/main-theme.mid"));
        assert_eq!(
            paths.leaderboard_path(),
            temp.path().join("data/leaderboard.bin")
        );
    }
}
