//! Incremental-progress cursors.
//!
//! A cursor tracks how far one stream has been read. Two kinds exist:
//!
//! - [`IncrementalCursor`]: backed by the greatest cursor-field value
//!   observed in the records, checkpointed through the state manager
//! - [`FinalStateCursor`]: carries no progress; it only guarantees that a
//!   final state message is emitted for the stream
//!
//! Both satisfy [`Cursor`], so engines never special-case either one.
//! Cursors are shared as [`SharedCursor`] so a child stream and its parent
//! can hold the identical instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::catalog::StreamDescriptor;
use crate::message::{Message, MessageSink, RecordMessage, StateMessage};
use crate::state::{StateManager, StreamState};

/// State key written by [`FinalStateCursor`].
pub const NO_CURSOR_STATE_KEY: &str = "__no_cursor_state";

/// Cursor shared between a stream, its parent and the engine.
pub type SharedCursor = Arc<dyn Cursor>;

/// Kind of cursor bound to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    /// Tracks real per-record progress.
    Incremental,
    /// Carries no progress; only emits a final state.
    FinalState,
}

/// Progress tracker for one stream.
///
/// Methods take `&self`; implementations synchronize internally because
/// engines may observe records from several tasks.
pub trait Cursor: Send + Sync + std::fmt::Debug {
    /// Returns the cursor kind.
    fn kind(&self) -> CursorKind;

    /// Returns the stream this cursor tracks.
    fn stream(&self) -> &StreamDescriptor;

    /// Returns the current progress.
    fn state(&self) -> StreamState;

    /// Observes a record read from the stream.
    fn observe(&self, record: &RecordMessage);

    /// Signals that a unit of work finished and progress may be checkpointed.
    fn close_partition(&self);

    /// Emits a state message if none was emitted so far.
    fn ensure_at_least_one_state_emitted(&self);
}

/// Cursor for streams without incremental progress.
#[derive(Debug)]
pub struct FinalStateCursor {
    stream: StreamDescriptor,
    sink: Arc<dyn MessageSink>,
    emitted: AtomicBool,
}

impl FinalStateCursor {
    /// Creates a final-state cursor for a stream, emitting into `sink`.
    #[must_use]
    pub fn new(stream: StreamDescriptor, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            stream,
            sink,
            emitted: AtomicBool::new(false),
        }
    }
}

impl Cursor for FinalStateCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::FinalState
    }

    fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    fn state(&self) -> StreamState {
        StreamState::new()
    }

    fn observe(&self, _record: &RecordMessage) {}

    fn close_partition(&self) {}

    fn ensure_at_least_one_state_emitted(&self) {
        if self.emitted.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut data = StreamState::new();
        data.insert(NO_CURSOR_STATE_KEY.to_string(), Value::Bool(true));
        tracing::debug!(stream = %self.stream, "emitting final state");
        self.sink
            .emit(Message::State(StateMessage::new(self.stream.clone(), data)));
    }
}

#[derive(Debug, Default)]
struct Progress {
    /// Greatest cursor value known (seed or observed).
    value: Option<Value>,
    /// Value carried by the last emitted state message.
    last_emitted: Option<Value>,
    has_emitted: bool,
}

/// Cursor tracking the greatest value of a cursor field.
///
/// Numbers compare numerically and strings lexicographically. Records whose
/// cursor value is missing or of a different type than the current value
/// are ignored, so progress never regresses below the seeded state.
#[derive(Debug)]
pub struct IncrementalCursor {
    stream: StreamDescriptor,
    cursor_field: Vec<String>,
    state_key: String,
    sink: Arc<dyn MessageSink>,
    state_manager: Arc<StateManager>,
    progress: Mutex<Progress>,
}

impl IncrementalCursor {
    /// Creates a cursor seeded from `initial_state`.
    ///
    /// `cursor_field` is a path into the record payload; the state key is
    /// the path joined with `.`.
    #[must_use]
    pub fn new(
        stream: StreamDescriptor,
        cursor_field: Vec<String>,
        initial_state: StreamState,
        sink: Arc<dyn MessageSink>,
        state_manager: Arc<StateManager>,
    ) -> Self {
        let state_key = cursor_field.join(".");
        let value = initial_state
            .get(&state_key)
            .filter(|v| is_comparable(v))
            .cloned();
        Self {
            stream,
            cursor_field,
            state_key,
            sink,
            state_manager,
            progress: Mutex::new(Progress {
                value,
                ..Progress::default()
            }),
        }
    }

    /// Returns the cursor field path.
    #[must_use]
    pub fn cursor_field(&self) -> &[String] {
        &self.cursor_field
    }

    fn state_for(&self, value: Option<&Value>) -> StreamState {
        let mut state = StreamState::new();
        if let Some(v) = value {
            state.insert(self.state_key.clone(), v.clone());
        }
        state
    }

    fn emit_state(&self, state: StreamState) {
        self.state_manager
            .update_state_for_stream(&self.stream, state.clone());
        self.sink
            .emit(Message::State(StateMessage::new(self.stream.clone(), state)));
    }
}

impl Cursor for IncrementalCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::Incremental
    }

    fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    fn state(&self) -> StreamState {
        self.state_for(self.progress.lock().value.as_ref())
    }

    fn observe(&self, record: &RecordMessage) {
        if record.stream != self.stream || self.cursor_field.is_empty() {
            return;
        }
        let Some(candidate) = lookup(&record.data, &self.cursor_field) else {
            return;
        };
        let mut progress = self.progress.lock();
        if is_newer(candidate, progress.value.as_ref()) {
            progress.value = Some(candidate.clone());
        }
    }

    fn close_partition(&self) {
        let state = {
            let mut guard = self.progress.lock();
            let progress = &mut *guard;
            if progress.value.is_none() || progress.value == progress.last_emitted {
                return;
            }
            progress.last_emitted.clone_from(&progress.value);
            progress.has_emitted = true;
            self.state_for(progress.value.as_ref())
        };
        tracing::debug!(stream = %self.stream, "checkpointing cursor state");
        self.emit_state(state);
    }

    fn ensure_at_least_one_state_emitted(&self) {
        let state = {
            let mut guard = self.progress.lock();
            let progress = &mut *guard;
            if progress.has_emitted {
                return;
            }
            progress.has_emitted = true;
            progress.last_emitted.clone_from(&progress.value);
            self.state_for(progress.value.as_ref())
        };
        self.emit_state(state);
    }
}

fn lookup<'a>(data: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(data, |value, key| value.get(key))
}

fn is_comparable(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

fn is_newer(candidate: &Value, current: Option<&Value>) -> bool {
    let Some(current) = current else {
        return is_comparable(candidate);
    };
    match (candidate, current) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a > b,
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
        },
        (Value::String(a), Value::String(b)) => a > b,
        _ => false,
    }
}

/// Attachment point for a cursor on a stream that supports one.
#[derive(Debug, Default)]
pub struct CursorSlot {
    cursor: RwLock<Option<SharedCursor>>,
}

impl CursorSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a cursor, returning the previously attached one.
    pub fn attach(&self, cursor: SharedCursor) -> Option<SharedCursor> {
        self.cursor.write().replace(cursor)
    }

    /// Returns the attached cursor.
    #[must_use]
    pub fn get(&self) -> Option<SharedCursor> {
        self.cursor.read().clone()
    }

    /// Returns `true` if a cursor is attached.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.cursor.read().is_some()
    }
}
