//! Storage backends: one file per slot, or shared memory

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lumen_mcu::{Slot, Storage};

/// Slots stored as files in a directory
///
/// Writes go to `<slot>.tmp`, are synced, then renamed over the slot file, so
/// a power loss leaves either the old or the new value.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.name())
    }
}

impl Storage for FileStorage {
    type Error = io::Error;

    fn read(&self, slot: Slot) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(slot)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, slot: Slot, data: &[u8]) -> io::Result<()> {
        let path = self.path(slot);
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)
    }

    fn remove(&mut self, slot: Slot) -> io::Result<()> {
        match fs::remove_file(self.path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("storage read failed")]
    Read,
    #[error("storage write failed")]
    Write,
    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct MemoryInner {
    slots: HashMap<Slot, Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
}

/// Volatile slots shared between clones
///
/// For boards without usable flash. Read and write failures can be switched
/// on to exercise the fallback paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn set_fail_reads(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_reads = fail;
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = fail;
        }
    }

    /// Current value of a slot, bypassing failure injection
    pub fn get(&self, slot: Slot) -> Option<Vec<u8>> {
        self.inner.lock().ok()?.slots.get(&slot).cloned()
    }

    /// Set a slot, bypassing failure injection
    pub fn put(&self, slot: Slot, data: &[u8]) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.slots.insert(slot, data.to_vec());
        }
    }
}

impl Storage for MemoryStorage {
    type Error = MemoryError;

    fn read(&self, slot: Slot) -> Result<Option<Vec<u8>>, MemoryError> {
        let inner = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        if inner.fail_reads {
            return Err(MemoryError::Read);
        }
        Ok(inner.slots.get(&slot).cloned())
    }

    fn write(&mut self, slot: Slot, data: &[u8]) -> Result<(), MemoryError> {
        let mut inner = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        if inner.fail_writes {
            return Err(MemoryError::Write);
        }
        inner.slots.insert(slot, data.to_vec());
        Ok(())
    }

    fn remove(&mut self, slot: Slot) -> Result<(), MemoryError> {
        let mut inner = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        if inner.fail_writes {
            return Err(MemoryError::Write);
        }
        inner.slots.remove(&slot);
        Ok(())
    }
}
