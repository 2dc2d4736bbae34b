#![deny(clippy::all)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use mend_engine::{Engine, EngineConfig, TransformRequest};
use napi::{Error, Result, Status};
use napi_derive::napi;
use serde::Serialize;

fn failure(message: impl std::fmt::Display) -> Error {
    Error::new(Status::GenericFailure, message.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(failure)
}

/// One engine per instance. Requests and results cross the boundary as the
/// engine's camelCase JSON documents.
#[napi]
pub struct Mend {
    engine: RwLock<Option<Engine>>,
}

#[napi]
impl Mend {
    /// Opens with `configPath`, or `mend.config.json` in the working directory.
    #[napi(constructor)]
    pub fn new(config_path: Option<String>) -> Result<Self> {
        let cwd = env::current_dir().map_err(failure)?;
        let config = match config_path {
            Some(path) => {
                let path = cwd.join(path);
                let mut config = EngineConfig::load(&path)
                    .map_err(|e| failure(format!("failed to load {}: {:#}", path.display(), e)))?;
                if config.project_root.is_none() {
                    config.project_root = path.parent().map(Path::to_path_buf);
                }
                config
            }
            None => EngineConfig::discover(&cwd).map_err(|e| failure(format!("{:#}", e)))?,
        };
        let engine = Engine::open(config).map_err(failure)?;
        Ok(Mend {
            engine: RwLock::new(Some(engine)),
        })
    }

    /// `requestJson` is a serialized transform request; returns the response
    /// document. Failures inside the pipeline are reported in the response,
    /// not thrown.
    #[napi]
    pub fn transform(&self, request_json: String) -> Result<String> {
        let request: TransformRequest = serde_json::from_str(&request_json)
            .map_err(|e| Error::new(Status::InvalidArg, format!("invalid request: {}", e)))?;
        let guard = self.engine.read().unwrap_or_else(PoisonError::into_inner);
        let engine = guard.as_ref().ok_or_else(|| failure("engine is closed"))?;
        to_json(&engine.transform(&request))
    }

    #[napi]
    pub fn list_backups(&self, file_path: String) -> Result<String> {
        let guard = self.engine.read().unwrap_or_else(PoisonError::into_inner);
        let engine = guard.as_ref().ok_or_else(|| failure("engine is closed"))?;
        let backups = engine
            .backups()
            .list_backups(&PathBuf::from(file_path))
            .map_err(failure)?;
        to_json(&backups)
    }

    /// Returns the restored path.
    #[napi]
    pub fn restore_backup(&self, backup_path: String, target: Option<String>) -> Result<String> {
        let guard = self.engine.read().unwrap_or_else(PoisonError::into_inner);
        let engine = guard.as_ref().ok_or_else(|| failure("engine is closed"))?;
        let restored = engine
            .backups()
            .restore_from_backup(Path::new(&backup_path), target.as_deref().map(Path::new))
            .map_err(failure)?;
        Ok(restored.to_string_lossy().into_owned())
    }

    /// Saves learned rules. Later calls on this instance fail.
    #[napi]
    pub fn close(&self) -> Result<String> {
        let engine = self
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| failure("engine is closed"))?;
        to_json(&engine.close().map_err(failure)?)
    }
}

#[napi]
pub fn version() -> String {
    mend_engine::version().to_string()
}
