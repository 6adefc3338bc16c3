use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::persistence::store::{Record, StoreError, WorldStore, WorldTables};

/// In-memory tables, optionally backed by a YAML snapshot file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: WorldTables,
    snapshot: Option<PathBuf>,
    dirty: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: WorldTables) -> Self {
        Self {
            tables,
            snapshot: None,
            dirty: false,
        }
    }

    /// Loads the snapshot at `path` when present; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let tables = match fs::read_to_string(path) {
            Ok(text) => serde_yaml::from_str(&text).map_err(|source| StoreError::Snapshot {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "store snapshot missing, starting empty");
                WorldTables::default()
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            tables,
            snapshot: Some(path.to_path_buf()),
            dirty: false,
        })
    }

    pub fn tables(&self) -> &WorldTables {
        &self.tables
    }

    pub fn count<T: Record>(&self) -> usize {
        T::table(&self.tables).len()
    }

    fn write_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let text = serde_yaml::to_string(&self.tables).map_err(|source| StoreError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, text).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl WorldStore for MemoryStore {
    fn find<T, P>(&self, predicate: P) -> Result<Option<T>, StoreError>
    where
        T: Record,
        P: Fn(&T) -> bool,
    {
        Ok(T::table(&self.tables).values().find(|r| predicate(r)).cloned())
    }

    fn find_all<T, P>(&self, predicate: P) -> Result<Vec<T>, StoreError>
    where
        T: Record,
        P: Fn(&T) -> bool,
    {
        Ok(T::table(&self.tables)
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }

    fn get<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError> {
        Ok(T::table(&self.tables).get(key).cloned())
    }

    fn insert<T: Record>(&mut self, record: T) -> Result<(), StoreError> {
        let key = record.key();
        let table = T::table_mut(&mut self.tables);
        if table.contains_key(&key) {
            return Err(StoreError::Conflict { kind: T::KIND, key });
        }
        debug!(kind = T::KIND, key = %key, "insert");
        table.insert(key, record);
        self.dirty = true;
        Ok(())
    }

    fn update<T: Record>(&mut self, record: T) -> Result<(), StoreError> {
        let key = record.key();
        let table = T::table_mut(&mut self.tables);
        match table.get_mut(&key) {
            Some(existing) => {
                *existing = record;
                self.dirty = true;
                Ok(())
            }
            None => Err(StoreError::NotFound { kind: T::KIND, key }),
        }
    }

    fn delete<T: Record>(&mut self, key: &str) -> Result<bool, StoreError> {
        let removed = T::table_mut(&mut self.tables).remove(key).is_some();
        if removed {
            debug!(kind = T::KIND, key, "delete");
            self.dirty = true;
        }
        Ok(removed)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = self.snapshot.clone() {
            self.write_snapshot(&path)?;
        }
        self.dirty = false;
        Ok(())
    }
}
