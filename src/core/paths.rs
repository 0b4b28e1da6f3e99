//! Default file locations and path normalization.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Application directory name under the XDG-style config and data roots.
pub const APP_DIR: &str = "bambu-progress";

/// Home directory, or `/tmp` when `HOME` is unset (containers, CI).
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
}

/// `~/.config/bambu-progress/config.toml`
pub fn default_config_file() -> PathBuf {
    home_dir().join(".config").join(APP_DIR).join("config.toml")
}

/// `~/.local/share/bambu-progress/bambu-progress.log`
pub fn default_log_file() -> PathBuf {
    home_dir()
        .join(".local")
        .join("share")
        .join(APP_DIR)
        .join(format!("{APP_DIR}.log"))
}

/// Resolve a user-supplied path to an absolute, normalized path.
///
/// Existing paths are canonicalized; paths that do not exist yet (a log file
/// on first start) are made absolute against the CWD and normalized
/// syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
