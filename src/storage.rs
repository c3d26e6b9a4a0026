use crate::error::Result;
use crate::models::{Task, Theme};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[cfg(test)]
use std::{cell::RefCell, collections::HashMap, path::Path, rc::Rc};

pub const TASKS_KEY: &str = "tasks";
pub const THEME_KEY: &str = "theme";

/// A flat string-to-string store that survives between sessions.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as a file named after it inside `dir`.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        // Temp file lives next to the target so the rename stays on one
        // filesystem; it is removed on drop if anything fails first
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }
}

/// In-process store; clones share the same map.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Reads and writes the task collection and theme preference.
#[derive(Clone, Debug)]
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Persistence { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Never fails: an absent, unreadable or malformed blob yields an empty collection.
    pub fn load_tasks(&self) -> Vec<Task> {
        let raw = match self.store.get(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "could not read stored tasks");
                return Vec::new();
            }
        };

        let tasks: Vec<Task> = match serde_json::from_str(&raw) {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "stored tasks are malformed, starting empty");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let total = tasks.len();
        let tasks: Vec<Task> = tasks
            .into_iter()
            .filter(|task| seen.insert(task.id.clone()))
            .collect();
        if tasks.len() != total {
            warn!(dropped = total - tasks.len(), "dropped tasks with duplicate ids");
        }
        debug!(count = tasks.len(), "loaded tasks");
        tasks
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        let blob = serde_json::to_string(tasks)?;
        self.store.set(TASKS_KEY, &blob)?;
        debug!(count = tasks.len(), "saved tasks");
        Ok(())
    }

    pub fn load_theme(&self) -> Theme {
        match self.store.get(THEME_KEY) {
            Ok(Some(raw)) => match raw.trim().trim_matches('"') {
                "dark" => Theme::Dark,
                "light" => Theme::Light,
                other => {
                    warn!(value = other, "stored theme is unknown");
                    Theme::default()
                }
            },
            Ok(None) => Theme::default(),
            Err(err) => {
                warn!(error = %err, "could not read stored theme");
                Theme::default()
            }
        }
    }

    pub fn save_theme(&self, theme: Theme) -> Result<()> {
        self.store.set(THEME_KEY, theme.as_str())
    }
}
