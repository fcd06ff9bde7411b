use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write results: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// The store rolls back on a failed flush; replaying the command is safe.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResultEntry {
    pub name: String,
    pub score: u32,
    pub progress: usize,
}

impl ResultEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: 0,
            progress: 0,
        }
    }
}

pub type Entries = IndexMap<String, ResultEntry>;

/// Durable storage the store flushes to after every mutation.
pub trait ResultsBackend: Send + Sync {
    fn flush(&self, entries: &Entries) -> Result<(), StoreError>;
}

/// Persists the whole mapping as a pretty-printed JSON object. The file is
/// written next to the target and renamed over it.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultsBackend for JsonFileBackend {
    fn flush(&self, entries: &Entries) -> Result<(), StoreError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, entries)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Keeps nothing; every flush succeeds.
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl ResultsBackend for MemoryBackend {
    fn flush(&self, _entries: &Entries) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Scores and progress of every participant for the current run, keyed by
/// participant id in the order participants first appeared.
pub struct ResultsStore {
    entries: Mutex<Entries>,
    backend: Box<dyn ResultsBackend>,
}

impl ResultsStore {
    /// Creates an empty store and immediately flushes it, discarding whatever
    /// a previous run left in the backend.
    pub fn fresh(backend: impl ResultsBackend + 'static) -> Result<Self, StoreError> {
        let store = Self {
            entries: Mutex::new(IndexMap::new()),
            backend: Box::new(backend),
        };
        store.clear()?;
        Ok(store)
    }

    pub fn get(&self, id: &str) -> Option<ResultEntry> {
        self.lock().get(id).cloned()
    }

    /// Inserts or replaces the entry for `id` and flushes. If the flush fails
    /// the previous value is restored and the error returned.
    pub fn upsert(&self, id: &str, entry: ResultEntry) -> Result<(), StoreError> {
        let mut entries = self.lock();
        let previous = entries.insert(id.to_string(), entry);

        if let Err(err) = self.backend.flush(&entries) {
            log::error!("Flushing results for participant {id} failed: {err}");
            match previous {
                Some(previous) => {
                    entries.insert(id.to_string(), previous);
                }
                None => {
                    entries.shift_remove(id);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// All entries in creation order.
    pub fn all(&self) -> Vec<(String, ResultEntry)> {
        self.lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Empties the store and flushes. On a failed flush the entries are kept.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.lock();
        let previous = std::mem::take(&mut *entries);

        if let Err(err) = self.backend.flush(&entries) {
            log::error!("Flushing cleared results failed: {err}");
            *entries = previous;
            return Err(err);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Entries are only replaced wholesale, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    /// A backend whose flushes can be switched to fail.
    #[derive(Debug, Clone, Default)]
    pub struct FlakyBackend {
        failing: Arc<AtomicBool>,
    }

    impl FlakyBackend {
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl ResultsBackend for FlakyBackend {
        fn flush(&self, _entries: &Entries) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            Ok(())
        }
    }
}
