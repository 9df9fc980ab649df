use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::StateStore;
use crate::{Error, Result};

/// JSON document on disk shared by independent processes
///
/// Every update holds an exclusive advisory lock on a sidecar `.lock` file for
/// the whole read-modify-write, and replaces the document by writing a temp
/// file and renaming it over the target, so readers never observe partial
/// data and concurrent writers cannot lose each other's updates.
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _state: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _state: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?)
    }

    fn corrupt(&self, message: impl ToString) -> Error {
        Error::StateCorrupt {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl<T: Serialize + DeserializeOwned + Default> JsonFileStore<T> {
    fn read_unlocked(&self) -> Result<T> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(self.corrupt(e)),
        };
        if contents.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&contents).map_err(|e| self.corrupt(e))
    }

    fn write_unlocked(&self, state: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("state");
        let temp_path = self
            .path
            .with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()));
        std::fs::write(&temp_path, json)?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl<T: Serialize + DeserializeOwned + Default> StateStore<T> for JsonFileStore<T> {
    fn load(&self) -> Result<T> {
        if !self.path.exists() {
            return Ok(T::default());
        }
        let lock = self.open_lock()?;
        FileExt::lock_shared(&lock)?;
        let state = self.read_unlocked();
        let _ = FileExt::unlock(&lock);
        state
    }

    fn update<R>(&self, apply: impl FnOnce(&mut T) -> R) -> Result<R> {
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock)?;

        let result = (|| -> Result<R> {
            let mut state = self.read_unlocked().unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable state");
                T::default()
            });
            let out = apply(&mut state);
            self.write_unlocked(&state)?;
            debug!(path = %self.path.display(), "State written");
            Ok(out)
        })();

        let _ = FileExt::unlock(&lock);
        result
    }
}
