use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use branch_core::timestamp;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: String,
    pub level: Level,
    pub target: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn message(&self) -> &str {
        self.fields
            .iter()
            .find(|(name, _)| name == "message")
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn format_compact(&self) -> String {
        let mut extras: Vec<String> = self
            .fields
            .iter()
            .filter(|(name, _)| name != "message")
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        extras.sort();
        if extras.is_empty() {
            format!(
                "{} {:<5} {} {}",
                self.timestamp,
                self.level,
                self.target,
                self.message()
            )
        } else {
            format!(
                "{} {:<5} {} {} | {}",
                self.timestamp,
                self.level,
                self.target,
                self.message(),
                extras.join(" ")
            )
        }
    }
}

/// Bounded in-memory copy of recent events, replayed by commands that want
/// to show what went wrong after their own output.
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<BufferState>>,
    max_entries: usize,
}

#[derive(Default)]
struct BufferState {
    entries: VecDeque<LogEntry>,
    next_seq: u64,
}

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufferState::default())),
            max_entries,
        }
    }

    /// Sequence number the next recorded event will get.
    pub fn mark(&self) -> u64 {
        self.inner.lock().map(|state| state.next_seq).unwrap_or(0)
    }

    pub fn entries_since(&self, mark: u64) -> Vec<LogEntry> {
        self.inner
            .lock()
            .map(|state| {
                state
                    .entries
                    .iter()
                    .filter(|entry| entry.seq >= mark)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn push(&self, mut entry: LogEntry) {
        if let Ok(mut state) = self.inner.lock() {
            entry.seq = state.next_seq;
            state.next_seq += 1;
            state.entries.push_back(entry);
            while state.entries.len() > self.max_entries {
                state.entries.pop_front();
            }
        }
    }
}

#[derive(Clone)]
pub struct LogLayer {
    buffer: LogBuffer,
}

impl LogLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        let metadata = event.metadata();
        self.buffer.push(LogEntry {
            seq: 0,
            timestamp: format_timestamp(timestamp::to_local(OffsetDateTime::now_utc())),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            fields: fields.0,
        });
    }
}

/// Numbers and bools fall through to `record_debug`, which prints them plainly.
#[derive(Default)]
struct FieldCollector(Vec<(String, String)>);

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
}

fn format_timestamp(value: PrimitiveDateTime) -> String {
    let format = time::macros::format_description!("[hour repr:24]:[minute]:[second]");
    value
        .format(&format)
        .unwrap_or_else(|_| timestamp::format(&value))
}
