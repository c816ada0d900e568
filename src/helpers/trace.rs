//! Trace recorder for tool invocations
//!
//! Appends one JSON object per line for every tool start and end. Attach it
//! to an `AgentLoop` as a `ToolObserver`.
//!
//! # Example
//!
//! ```ignore
//! let recorder = Arc::new(TraceRecorder::create("logs/tools.jsonl")?);
//! let agent = AgentLoop::new(model, registry).with_observer(recorder);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::ToolObserver;
use crate::conversation::ToolCallRequest;
use crate::core::AgentResult;
use crate::tools::ToolResult;

/// Types of trace events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ToolStart,
    ToolEnd,
}

/// One line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event_type: EventType,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub iteration: usize,
    pub tool_name: String,
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TraceRecorder {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    sequence: AtomicU64,
}

impl TraceRecorder {
    /// Open (or create) a JSONL trace file, appending to existing content
    pub fn create(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::info!("[TraceRecorder] Recording tool calls to {:?}", path);

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event back from a trace file
    pub fn read_events(path: impl AsRef<Path>) -> AgentResult<Vec<TraceEvent>> {
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }

    fn event(&self, event_type: EventType, call: &ToolCallRequest, iteration: usize) -> TraceEvent {
        TraceEvent {
            event_type,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            iteration,
            tool_name: call.name.clone(),
            call_id: call.id.clone(),
            input: None,
            success: None,
            output: None,
            error: None,
        }
    }

    fn write(&self, event: &TraceEvent) {
        if let Err(e) = self.try_write(event) {
            tracing::warn!("[TraceRecorder] Failed to record {}: {}", event.call_id, e);
        }
    }

    fn try_write(&self, event: &TraceEvent) -> AgentResult<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "trace writer poisoned"))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

impl ToolObserver for TraceRecorder {
    fn on_tool_start(&self, call: &ToolCallRequest, iteration: usize) {
        let mut event = self.event(EventType::ToolStart, call, iteration);
        event.input = Some(call.arguments.clone());
        self.write(&event);
    }

    fn on_tool_end(&self, call: &ToolCallRequest, result: &ToolResult, iteration: usize) {
        let mut event = self.event(EventType::ToolEnd, call, iteration);
        event.success = Some(result.success);
        if result.success {
            event.output = Some(result.payload.clone());
        }
        event.error = result.error.clone();
        self.write(&event);
    }
}
