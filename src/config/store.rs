// config/store.rs
use std::{
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use super::KubeConfig;
use crate::utils::logging::Logger;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unable to determine the home directory")]
    MissingHome,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid kubeconfig: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `~/.kube/config`
pub fn default_kubeconfig_path() -> Result<PathBuf, StoreError> {
    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or(StoreError::MissingHome)
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// `<path>.bak`, next to the original.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Byte-for-byte copy of the current file to `<path>.bak`, replacing any
/// previous backup.
pub fn backup(path: &Path, logger: &mut dyn Logger) -> Result<PathBuf, StoreError> {
    let target = backup_path(path);
    fs::copy(path, &target).map_err(|e| StoreError::io(&target, e))?;
    logger.info(&format!("Backup created at {}", target.display()));
    Ok(target)
}

pub fn load(path: &Path, logger: &mut dyn Logger) -> Result<KubeConfig, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let document = serde_yaml::from_str(&text).map_err(|source| StoreError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    logger.debug_log(&format!("Loaded {} ({} bytes)", path.display(), text.len()));
    KubeConfig::from_document(document, logger)
}

/// Serializes `config` next to `path` and renames it into place, so an
/// interrupted write never leaves a truncated kubeconfig behind. A
/// symlinked `path` is resolved first and its target is replaced, not
/// the link.
pub fn save(path: &Path, config: &KubeConfig, logger: &mut dyn Logger) -> Result<(), StoreError> {
    let document = config.to_document().map_err(|source| StoreError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    let text = serde_yaml::to_string(&document).map_err(|source| StoreError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if target != path {
        logger.debug_log(&format!("{} resolves to {}", path.display(), target.display()));
    }

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(text.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;

    // kubeconfigs are usually 0600; keep whatever the original had
    if let Ok(meta) = fs::metadata(&target) {
        fs::set_permissions(tmp.path(), meta.permissions())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
    }

    tmp.persist(&target)
        .map_err(|e| StoreError::io(&target, e.error))?;
    logger.debug_log(&format!("Wrote {} ({} bytes)", target.display(), text.len()));
    Ok(())
}
