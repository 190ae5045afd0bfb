use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{Config, LoadReport};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} does not contain a JSON object")]
    NotAnObject(PathBuf),
}

/// Saved generation parameters, one JSON object keyed by field name.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn save(&self, config: &Config) -> Result<(), StoreError> {
        let payload = Value::Object(config.dump().into_iter().collect());
        write_json_object(&self.path, &payload)?;
        tracing::info!(path = %self.path.display(), "saved config");
        Ok(())
    }

    pub fn load(&self, config: &mut Config) -> Result<LoadReport, StoreError> {
        let payload = read_json_object(&self.path)?;
        let report = config.load(&payload);
        tracing::info!(
            path = %self.path.display(),
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            ignored = report.ignored.len(),
            "loaded config"
        );
        Ok(report)
    }
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match parsed {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject(path.to_path_buf())),
    }
}

fn write_json_object(path: &Path, payload: &Value) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let text = serde_json::to_string_pretty(payload).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(io_err)?;
    Ok(())
}
