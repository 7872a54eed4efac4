//! TOML file bounds store.
//!
//! The whole forest lives in one file of `[[node]]` tables. Column names for
//! key, parent and bounds come from `ColumnNames` and are resolved when the
//! store is opened. Changes are written on commit only, through a temp file
//! renamed over the target.
//!
//! Each transaction holds an exclusive lock on `<file>.lock` from `begin` to
//! `commit`/`rollback` and starts from a fresh read of the file, so stores
//! opened on the same path (in one process or several) serialize their
//! writes. Reads outside a transaction see the forest as of the last load.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs4::fs_std::FileExt;
use tempfile::NamedTempFile;
use toml::{Table, Value};
use tracing::{debug, instrument, trace};

use crate::config::ColumnNames;
use crate::domain::{check_forest, BoundKind, Node, NodeId, NewRecord, Region};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::store::memory::MemoryStore;
use crate::infrastructure::traits::BoundsStore;

const NODE_TABLE: &str = "node";
const NAME_COLUMN: &str = "name";

/// File-backed store: a `MemoryStore` loaded from and flushed to TOML.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    columns: ColumnNames,
    memory: MemoryStore,
    file_lock: Mutex<Option<File>>,
}

impl TomlFileStore {
    /// Open the forest at `path`. A missing file is an empty forest; a file
    /// whose bounds are inconsistent is refused.
    #[instrument(level = "debug", skip(columns))]
    pub fn open(path: &Path, columns: ColumnNames) -> StoreResult<Self> {
        let nodes = load_nodes(path, &columns)?;
        Ok(Self {
            path: path.to_path_buf(),
            columns,
            memory: MemoryStore::with_nodes(nodes),
            file_lock: Mutex::new(None),
        })
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn held_lock(&self) -> StoreResult<MutexGuard<'_, Option<File>>> {
        self.file_lock
            .lock()
            .map_err(|_| StoreError::Transaction("file lock state poisoned".into()))
    }

    /// Block until this store owns the sidecar lock file. Dropping the
    /// returned handle releases the lock.
    fn acquire_lock(&self) -> StoreResult<File> {
        let dir = self.dir();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("create {}", dir.display()), e))?;

        let lock_path = lock_path(&self.path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::io(format!("open {}", lock_path.display()), e))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::io(format!("lock {}", lock_path.display()), e))?;
        trace!("locked {}", lock_path.display());
        Ok(file)
    }

    /// Host writes made outside a transaction are flushed at once, under the
    /// file lock.
    fn write_through<T>(&self, f: impl FnOnce(&MemoryStore) -> StoreResult<T>) -> StoreResult<T> {
        let in_transaction = self.held_lock()?.is_some();
        if in_transaction {
            return f(&self.memory);
        }
        let _file = self.acquire_lock()?;
        self.memory.begin()?;
        match f(&self.memory).and_then(|value| self.persist().map(|()| value)) {
            Ok(value) => {
                self.memory.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.memory.rollback()?;
                Err(e)
            }
        }
    }

    fn release_lock(&self) -> StoreResult<()> {
        if self.held_lock()?.take().is_some() {
            trace!("unlocked {}", lock_path(&self.path).display());
        }
        Ok(())
    }

    fn persist(&self) -> StoreResult<()> {
        let nodes = self.memory.all()?;
        let content = render_nodes(&self.path, &nodes, &self.columns)?;

        let dir = self.dir();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("create {}", dir.display()), e))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| StoreError::io(format!("temp file in {}", dir.display()), e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StoreError::io("write temp file", e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(format!("replace {}", self.path.display()), e.error))?;
        debug!("wrote {} nodes to {}", nodes.len(), self.path.display());
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Read and validate the forest at `path`; a missing file is empty.
fn load_nodes(path: &Path, columns: &ColumnNames) -> StoreResult<Vec<Node>> {
    let nodes = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;
        parse_nodes(path, &content, columns)?
    } else {
        debug!("store file {} missing, starting empty", path.display());
        Vec::new()
    };

    check_forest(&nodes).map_err(|e| format_err(path, e.to_string()))?;
    debug!("loaded {} nodes from {}", nodes.len(), path.display());
    Ok(nodes)
}

fn format_err(path: &Path, message: impl Into<String>) -> StoreError {
    StoreError::Format {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn parse_nodes(path: &Path, content: &str, columns: &ColumnNames) -> StoreResult<Vec<Node>> {
    let doc: Table = toml::from_str(content).map_err(|e| format_err(path, e.to_string()))?;

    let Some(rows) = doc.get(NODE_TABLE) else {
        return Ok(Vec::new());
    };
    let rows = rows
        .as_array()
        .ok_or_else(|| format_err(path, format!("`{NODE_TABLE}` must be an array of tables")))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let row = row
                .as_table()
                .ok_or_else(|| format_err(path, format!("{NODE_TABLE} #{i} is not a table")))?;
            let int = |column: &str| -> StoreResult<Option<i64>> {
                match row.get(column) {
                    None => Ok(None),
                    Some(v) => v.as_integer().map(Some).ok_or_else(|| {
                        format_err(path, format!("{NODE_TABLE} #{i}: `{column}` is not an integer"))
                    }),
                }
            };
            let required = |column: &str| -> StoreResult<i64> {
                int(column)?.ok_or_else(|| {
                    format_err(path, format!("{NODE_TABLE} #{i}: missing `{column}`"))
                })
            };
            let key = |value: i64| -> StoreResult<NodeId> {
                NodeId::try_from(value)
                    .map_err(|_| format_err(path, format!("{NODE_TABLE} #{i}: negative key {value}")))
            };

            Ok(Node {
                id: key(required(&columns.key)?)?,
                parent: int(&columns.parent)?.map(key).transpose()?,
                left: required(&columns.left)?,
                right: required(&columns.right)?,
                name: row
                    .get(NAME_COLUMN)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

fn render_nodes(path: &Path, nodes: &[Node], columns: &ColumnNames) -> StoreResult<String> {
    let rows = nodes
        .iter()
        .map(|node| {
            let key = |id: NodeId| -> StoreResult<Value> {
                i64::try_from(id)
                    .map(Value::Integer)
                    .map_err(|_| format_err(path, format!("key {id} does not fit a TOML integer")))
            };
            let mut row = Table::new();
            row.insert(columns.key.clone(), key(node.id)?);
            if let Some(parent) = node.parent {
                row.insert(columns.parent.clone(), key(parent)?);
            }
            row.insert(columns.left.clone(), Value::Integer(node.left));
            row.insert(columns.right.clone(), Value::Integer(node.right));
            row.insert(NAME_COLUMN.to_string(), Value::String(node.name.clone()));
            Ok(Value::Table(row))
        })
        .collect::<StoreResult<Vec<Value>>>()?;

    let mut doc = Table::new();
    doc.insert(NODE_TABLE.to_string(), Value::Array(rows));
    toml::to_string(&doc).map_err(|e| format_err(path, e.to_string()))
}

impl BoundsStore for TomlFileStore {
    fn get_by_key(&self, id: NodeId) -> StoreResult<Option<Node>> {
        self.memory.get_by_key(id)
    }

    fn find_children(&self, parent: Option<NodeId>) -> StoreResult<Vec<Node>> {
        self.memory.find_children(parent)
    }

    fn find_by_interval(&self, left_gt: i64, right_lt: i64) -> StoreResult<Vec<Node>> {
        self.memory.find_by_interval(left_gt, right_lt)
    }

    fn count_by_interval(
        &self,
        left_gt: i64,
        right_lt: i64,
        parent: Option<NodeId>,
    ) -> StoreResult<usize> {
        self.memory.count_by_interval(left_gt, right_lt, parent)
    }

    fn find_by_bound(&self, kind: BoundKind, value: i64) -> StoreResult<Option<Node>> {
        self.memory.find_by_bound(kind, value)
    }

    fn max_right(&self) -> StoreResult<i64> {
        self.memory.max_right()
    }

    fn shift_range(&self, kind: BoundKind, region: Region, delta: i64) -> StoreResult<()> {
        self.memory.shift_range(kind, region, delta)
    }

    fn delete_descendants(&self, id: NodeId) -> StoreResult<usize> {
        self.memory.delete_descendants(id)
    }

    fn insert(&self, record: NewRecord) -> StoreResult<Node> {
        self.write_through(|memory| memory.insert(record))
    }

    fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> StoreResult<()> {
        self.write_through(|memory| memory.set_parent(id, parent))
    }

    fn delete(&self, id: NodeId) -> StoreResult<bool> {
        self.write_through(|memory| memory.delete(id))
    }

    fn all(&self) -> StoreResult<Vec<Node>> {
        self.memory.all()
    }

    fn begin(&self) -> StoreResult<()> {
        // A second lock on the same file from this store would block forever.
        if self.held_lock()?.is_some() {
            return Err(StoreError::Transaction("transaction already open".into()));
        }
        let file = self.acquire_lock()?;
        let nodes = load_nodes(&self.path, &self.columns)?;
        self.memory.replace_all(nodes)?;
        self.memory.begin()?;
        *self.held_lock()? = Some(file);
        Ok(())
    }

    // Flush while the snapshot is still held, so a failed write can be rolled back.
    fn commit(&self) -> StoreResult<()> {
        self.persist()?;
        self.memory.commit()?;
        self.release_lock()
    }

    fn rollback(&self) -> StoreResult<()> {
        let result = self.memory.rollback();
        self.release_lock()?;
        result
    }
}
