use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only JSONL log of workflow events.
///
/// Envelope keys (`type`, `session_id`, `seq`, `ts`) are reserved; payload
/// entries with those names are dropped.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    state: Mutex<LogState>,
}

#[derive(Debug, Default)]
struct LogState {
    file: Option<File>,
    seq: u64,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                state: Mutex::new(LogState::default()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut guard = self
            .inner
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let state = &mut *guard;
        let file = match state.file.take() {
            Some(file) => file,
            None => open_log(&self.inner.path)?,
        };
        let file = state.file.insert(file);

        let seq = state.seq + 1;
        let mut event: EventPayload = [
            ("type", Value::from(event_type)),
            ("session_id", Value::from(self.session_id())),
            ("seq", Value::from(seq)),
            ("ts", Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false))),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        for (key, value) in payload {
            event.entry(key).or_insert(value);
        }

        writeln!(file, "{}", serde_json::to_string(&event)?)
            .with_context(|| format!("failed appending to {}", self.inner.path.display()))?;
        state.seq = seq;
        Ok(Value::Object(event))
    }
}

fn open_log(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed opening {}", path.display()))
}

/// Event types in file order, skipping lines that are not JSON objects.
pub fn read_event_types(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_one_compact_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("stage".to_string(), Value::from(2));
        let emitted = writer.emit("stage_changed", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::from("stage_changed"));
        assert_eq!(parsed["session_id"], Value::from("session-1"));
        assert_eq!(parsed["seq"], Value::from(1));
        assert_eq!(parsed["stage"], Value::from(2));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn envelope_keys_cannot_be_overridden() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");

        let mut payload = EventPayload::new();
        payload.insert("session_id".to_string(), Value::from("replayed"));
        payload.insert("seq".to_string(), Value::from(99));
        payload.insert("scope".to_string(), Value::from("workflow"));
        let emitted = writer.emit("workflow_reset", payload)?;

        assert_eq!(emitted["session_id"], Value::from("session-1"));
        assert_eq!(emitted["seq"], Value::from(1));
        assert_eq!(emitted["scope"], Value::from("workflow"));
        Ok(())
    }

    #[test]
    fn clones_share_one_sequence() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");
        let other = writer.clone();

        writer.emit("session_started", EventPayload::new())?;
        other.emit("stage_changed", EventPayload::new())?;
        let third = writer.emit("stage_changed", EventPayload::new())?;
        assert_eq!(third["seq"], Value::from(3));
        Ok(())
    }

    #[test]
    fn read_event_types_preserves_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        writer.emit("session_started", EventPayload::new())?;
        writer.emit("generation_submitted", EventPayload::new())?;
        OpenOptions::new().append(true).open(&path)?.write_all(b"not json\n")?;
        writer.emit("generation_failed", EventPayload::new())?;

        assert_eq!(
            read_event_types(&path)?,
            vec!["session_started", "generation_submitted", "generation_failed"]
        );
        Ok(())
    }
}
