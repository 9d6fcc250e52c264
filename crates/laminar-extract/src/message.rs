//! Output messages and message sinks.
//!
//! Every execution branch produces a [`MessageStream`]: a lazy sequence of
//! [`Message`]s (records, state checkpoints, logs, traces). Cursors that
//! publish checkpoints out-of-band do so through a [`MessageSink`].

use std::collections::VecDeque;
use std::fmt;

use futures::stream::BoxStream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog::StreamDescriptor;
use crate::error::ExtractError;
use crate::state::StreamState;

/// Lazy sequence of output messages produced by an execution branch.
pub type MessageStream = BoxStream<'static, Result<Message, ExtractError>>;

/// One unit of job output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// A data record.
    Record(RecordMessage),

    /// A state checkpoint for one stream.
    State(StateMessage),

    /// A log line.
    Log(LogMessage),

    /// A trace event (errors, stream status).
    Trace(TraceMessage),
}

impl Message {
    /// Returns the stream this message belongs to, if any.
    #[must_use]
    pub fn stream(&self) -> Option<&StreamDescriptor> {
        match self {
            Message::Record(r) => Some(&r.stream),
            Message::State(s) => Some(&s.stream),
            Message::Trace(t) => t.stream.as_ref(),
            Message::Log(_) => None,
        }
    }

    /// Returns `true` for record messages.
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Message::Record(_))
    }
}

/// A single extracted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    /// Stream that produced the record.
    pub stream: StreamDescriptor,

    /// Record payload.
    pub data: serde_json::Value,
}

impl RecordMessage {
    /// Creates a record message.
    #[must_use]
    pub fn new(stream: StreamDescriptor, data: serde_json::Value) -> Self {
        Self { stream, data }
    }
}

/// A state checkpoint for one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    /// Stream the state belongs to.
    pub stream: StreamDescriptor,

    /// Opaque progress data.
    pub data: StreamState,
}

impl StateMessage {
    /// Creates a state message.
    #[must_use]
    pub fn new(stream: StreamDescriptor, data: StreamState) -> Self {
        Self { stream, data }
    }
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Debug output.
    Debug,
    /// Informational output.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// A log line forwarded to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Severity.
    pub level: LogLevel,

    /// Text.
    pub message: String,
}

/// Kind of trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceKind {
    /// An error reported as data rather than raised.
    Error,
    /// A stream status transition (started, running, complete).
    StreamStatus,
}

/// A trace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMessage {
    /// Event kind.
    pub kind: TraceKind,

    /// Stream the event refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamDescriptor>,

    /// Event text.
    pub message: String,
}

/// Destination for messages emitted outside of an execution branch.
///
/// Cursors emit into the sink; the concurrent engine drains it with
/// [`consume_queue`](Self::consume_queue) and forwards the messages in its
/// own output.
pub trait MessageSink: Send + Sync + fmt::Debug {
    /// Accepts one message.
    fn emit(&self, message: Message);

    /// Removes and returns all queued messages in emission order.
    fn consume_queue(&self) -> Vec<Message>;
}

/// Default [`MessageSink`]: an in-memory FIFO queue.
#[derive(Debug, Default)]
pub struct InMemoryMessageRepository {
    queue: Mutex<VecDeque<Message>>,
}

impl InMemoryMessageRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl MessageSink for InMemoryMessageRepository {
    fn emit(&self, message: Message) {
        self.queue.lock().push_back(message);
    }

    fn consume_queue(&self) -> Vec<Message> {
        self.queue.lock().drain(..).collect()
    }
}
