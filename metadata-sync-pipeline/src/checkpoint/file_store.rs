use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use super::{resume_offset, CheckpointEntry, CheckpointStore};
use crate::errors::CheckpointError;

type Entries = BTreeMap<String, serde_json::Value>;

/// Checkpoint store backed by one JSON file per container.
///
/// The file lives at `<status_dir>/<account>/<container>` and maps each
/// partition to its entry:
///
/// ```json
/// { "0": { "last_row": 1042, "index": "objects" } }
/// ```
///
/// Entries are decoded one partition at a time; a malformed entry only
/// affects its own partition.
///
/// Saves are a read-modify-write under an exclusive lock on a sibling
/// `.lock` file. The new content is written to a temporary file and renamed
/// over the old one, so readers only ever see a complete file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
    index: String,
}

impl FileCheckpointStore {
    pub fn new(
        status_dir: impl AsRef<Path>,
        account: &str,
        container: &str,
        index: impl Into<String>,
    ) -> Self {
        Self {
            path: status_dir.as_ref().join(account).join(container),
            index: index.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Read every entry as raw JSON. A missing file is empty; an unparsable
    /// one is treated as empty as well.
    fn read_entries(&self) -> Result<Entries, CheckpointError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unparsable checkpoint file");
                Ok(Entries::new())
            }
        }
    }

    fn write_entries(&self, dir: &Path, entries: &Entries) -> Result<(), CheckpointError> {
        let tmp_path = dir.join(format!(".checkpoint-{}.tmp", uuid::Uuid::new_v4()));
        let result = (|| -> Result<(), CheckpointError> {
            let mut file = File::create(&tmp_path)?;
            serde_json::to_writer(&mut file, entries)?;
            file.flush()?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, partition: &str) -> Result<u64, CheckpointError> {
        let mut entries = self.read_entries()?;
        let raw = entries.remove(partition);
        let entry = match raw.map(serde_json::from_value::<CheckpointEntry>) {
            Some(Ok(entry)) => Some(entry),
            Some(Err(e)) => {
                warn!(partition = %partition, error = %e, "Ignoring malformed checkpoint entry");
                None
            }
            None => None,
        };
        let offset = resume_offset(entry.as_ref(), &self.index);
        debug!(partition = %partition, offset, "Loaded checkpoint");
        Ok(offset)
    }

    fn save(&self, partition: &str, offset: u64, index: &str) -> Result<(), CheckpointError> {
        let dir = self.path.parent().ok_or_else(|| {
            std::io::Error::new(ErrorKind::InvalidInput, "checkpoint path has no parent")
        })?;
        fs::create_dir_all(dir)?;

        let _lock = FileLock::exclusive(&self.lock_path())?;

        let entry = CheckpointEntry {
            last_row: offset,
            index: index.to_string(),
        };
        let mut entries = self.read_entries()?;
        entries.insert(partition.to_string(), serde_json::to_value(entry)?);
        self.write_entries(dir, &entries)?;

        debug!(partition = %partition, offset, index = %index, "Saved checkpoint");
        Ok(())
    }
}

/// Advisory lock released when dropped.
struct FileLock {
    _file: File,
}

impl FileLock {
    fn exclusive(path: &Path) -> Result<Self, CheckpointError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.lock_exclusive()
            .map_err(|e| CheckpointError::Lock(e.to_string()))?;

        Ok(Self { _file: file })
    }
}
