use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::GenerationSettings;
use crate::storage::KeyValueStore;

pub const SAVED_DESIGNS_KEY: &str = "saved_designs";
pub const SAVED_DESIGNS_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    pub session_id: String,
    pub attempt: String,
    pub artifact_url: String,
    pub settings: GenerationSettings,
    pub primary_image: Option<String>,
    #[serde(default)]
    pub auxiliary_images: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: String,
}

impl DesignRecord {
    pub fn new(
        session_id: impl Into<String>,
        attempt: impl Into<String>,
        artifact_url: impl Into<String>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            attempt: attempt.into(),
            artifact_url: artifact_url.into(),
            settings,
            primary_image: None,
            auxiliary_images: Vec::new(),
            metadata: Map::new(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Saved designs, oldest first. Rows that no longer parse are skipped.
pub fn load_design_records(store: &mut dyn KeyValueStore) -> Vec<DesignRecord> {
    match store.get(SAVED_DESIGNS_KEY) {
        Some(Value::Array(rows)) => rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn append_design_record(
    store: &mut dyn KeyValueStore,
    record: &DesignRecord,
    limit: usize,
) -> anyhow::Result<usize> {
    let mut rows = match store.get(SAVED_DESIGNS_KEY) {
        Some(Value::Array(rows)) => rows,
        _ => Vec::new(),
    };
    rows.push(serde_json::to_value(record)?);
    if rows.len() > limit {
        let overflow = rows.len() - limit;
        rows.drain(..overflow);
    }
    let count = rows.len();
    store.set(SAVED_DESIGNS_KEY, Value::Array(rows))?;
    Ok(count)
}
