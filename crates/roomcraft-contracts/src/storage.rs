use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

pub trait KeyValueStore: Send {
    fn get(&mut self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()>;

    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&mut self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// A single JSON object on disk. Reads refresh from the file and writes merge
/// only the keys this instance touched, so two stores sharing a file keep
/// each other's keys.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    payload: Map<String, Value>,
    dirty_keys: Vec<String>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: Map::new(),
            dirty_keys: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&mut self) {
        self.payload = read_json_object(&self.path).unwrap_or_default();
    }

    fn mark_dirty(&mut self, key: &str) {
        if !self.dirty_keys.iter().any(|existing| existing == key) {
            self.dirty_keys.push(key.to_string());
        }
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if self.dirty_keys.is_empty() {
            return Ok(());
        }
        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        for key in &self.dirty_keys {
            match self.payload.get(key) {
                Some(value) => {
                    on_disk.insert(key.clone(), value.clone());
                }
                None => {
                    on_disk.remove(key);
                }
            }
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = on_disk;
        self.dirty_keys.clear();
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&mut self, key: &str) -> Option<Value> {
        self.refresh();
        self.payload.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.refresh();
        if self.payload.get(key) == Some(&value) {
            return Ok(());
        }
        self.payload.insert(key.to_string(), value);
        self.mark_dirty(key);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.refresh();
        if self.payload.remove(key).is_none() {
            return Ok(());
        }
        self.mark_dirty(key);
        self.flush()
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Value>(&raw).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(payload)?;
    std::fs::write(path, body).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}
