//! In-memory stand-in for the hosted bucket and table, recording every call.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{ObjectEntry, ObjectStore, ProviderError, ProviderResult, PutOptions, RowStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub options: PutOptions,
}

#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    tables: Mutex<BTreeMap<String, Vec<Value>>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<BTreeMap<&'static str, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next calls to `op` ("put", "list", "remove", "upsert",
    /// "select") fail with `message`.
    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures.lock().unwrap().insert(op, message.to_owned());
    }

    pub fn seed_object(&self, path: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(
            path.to_owned(),
            StoredObject {
                bytes: bytes.to_vec(),
                options: PutOptions {
                    content_type: "application/octet-stream".into(),
                    overwrite: false,
                    cache_control_secs: 3600,
                },
            },
        );
    }

    pub fn seed_row(&self, table: &str, row: Value) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_owned())
            .or_default()
            .push(row);
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn object_paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, detail: &str) -> ProviderResult<()> {
        self.calls.lock().unwrap().push(format!("{} {}", op, detail));
        match self.failures.lock().unwrap().get(op) {
            Some(message) => Err(ProviderError {
                status: Some(400),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn put(&self, path: &str, bytes: Vec<u8>, options: &PutOptions) -> ProviderResult<()> {
        self.record("put", path)?;
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(path) && !options.overwrite {
            return Err(ProviderError {
                status: Some(400),
                message: "The resource already exists".into(),
            });
        }
        objects.insert(
            path.to_owned(),
            StoredObject {
                bytes,
                options: options.clone(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str, search: &str) -> ProviderResult<Vec<ObjectEntry>> {
        self.record("list", prefix)?;
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter_map(|path| path.strip_prefix(&dir))
            .filter(|name| !name.contains('/') && name.contains(search))
            .map(|name| ObjectEntry {
                name: name.to_owned(),
            })
            .collect())
    }

    async fn remove(&self, paths: &[String]) -> ProviderResult<()> {
        self.record("remove", &paths.join(","))?;
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for MemoryBackend {
    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> ProviderResult<()> {
        self.record("upsert", table)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_owned()).or_default();
        match rows
            .iter_mut()
            .find(|existing| existing[on_conflict] == row[on_conflict])
        {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        Ok(())
    }

    async fn select_all(&self, table: &str) -> ProviderResult<Vec<Value>> {
        self.record("select", table)?;
        Ok(self.rows(table))
    }
}
