//! Telemetry ring buffer with optional JSON-lines persistence.
//!
//! Snapshots are immutable once pushed; readers clone `Arc`s out of the
//! ring. The optional sink appends one JSON object per line in tick order.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::types::FacilityState;

/// Snapshot retention.
pub const TELEMETRY_CAPACITY: usize = 1000;

pub struct TelemetryBuffer {
    buffer: VecDeque<Arc<FacilityState>>,
    sink: Option<BufWriter<File>>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(TELEMETRY_CAPACITY),
            sink: None,
        }
    }

    /// Attach a JSON-lines sink; snapshots are appended from now on.
    pub fn with_sink(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            buffer: VecDeque::with_capacity(TELEMETRY_CAPACITY),
            sink: Some(BufWriter::new(file)),
        })
    }

    /// Push one snapshot, evicting the oldest past capacity.
    pub fn push(&mut self, snapshot: Arc<FacilityState>) {
        if let Some(sink) = &mut self.sink {
            match serde_json::to_string(snapshot.as_ref()) {
                Ok(line) => {
                    if let Err(e) = writeln!(sink, "{line}").and_then(|()| sink.flush()) {
                        warn!(error = %e, "Telemetry sink write failed");
                    }
                }
                Err(e) => warn!(error = %e, "Telemetry snapshot serialisation failed"),
            }
        }

        self.buffer.push_back(snapshot);
        while self.buffer.len() > TELEMETRY_CAPACITY {
            self.buffer.pop_front();
        }
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<Arc<FacilityState>> {
        self.buffer.back().cloned()
    }

    /// Last `n` snapshots, oldest first.
    pub fn history(&self, n: usize) -> Vec<Arc<FacilityState>> {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop buffered snapshots; the sink (if any) keeps appending.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Move the sink out (used by reset to carry it into the rebuilt buffer).
    pub fn take_sink(&mut self) -> Option<BufWriter<File>> {
        self.sink.take()
    }

    pub fn set_sink(&mut self, sink: Option<BufWriter<File>>) {
        self.sink = sink;
    }
}

impl Default for TelemetryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TelemetryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBuffer")
            .field("len", &self.buffer.len())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
