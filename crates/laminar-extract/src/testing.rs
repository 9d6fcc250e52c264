//! Testing utilities for routers and engines.
//!
//! Provides mock engines, a static stream provider, and helpers for
//! declaring streams in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::binder::CursorBinder;
use crate::catalog::{ConfiguredCatalog, StreamDescriptor};
use crate::config::SourceConfig;
use crate::engine::{ConcurrentEngine, SequentialEngine, StreamProvider};
use crate::error::ExtractError;
use crate::message::{Message, MessageStream, RecordMessage};
use crate::state::{SourceState, StateManager};
use crate::stream::{AbstractStream, DeclaredStream, SourceStream};

/// Builds a record message for `stream` with `{"id": id}` as data.
#[must_use]
pub fn record(stream: &StreamDescriptor, id: i64) -> RecordMessage {
    RecordMessage::new(stream.clone(), serde_json::json!({ "id": id }))
}

/// Declares a stream that stays on the sequential path.
#[must_use]
pub fn plain_stream(name: &str) -> DeclaredStream {
    SourceStream::builder(name).build().into()
}

/// Declares a concurrent-capable stream bound to a final-state cursor.
#[must_use]
pub fn concurrent_stream(name: &str) -> DeclaredStream {
    CursorBinder::default().bind_declared(Arc::new(SourceStream::builder(name).build()), None)
}

/// Declares a concurrent-capable stream with an incremental cursor on `id`.
///
/// The cursor is seeded from `manager` and reports its progress back to it.
#[must_use]
pub fn incremental_stream(name: &str, manager: &Arc<StateManager>) -> DeclaredStream {
    let stream = Arc::new(
        SourceStream::builder(name)
            .accepts_cursor()
            .cursor_field(["id"])
            .build(),
    );
    let binder = CursorBinder::new(None);
    let cursor = manager.cursor_for(&stream, Arc::clone(binder.sink()));
    binder.bind_declared(stream, cursor)
}

/// Mock concurrent engine.
///
/// Spawns one tokio task per stream. Each task emits `records_per_stream`
/// records (`id` counting from 1) and feeds them to the stream's cursor. It
/// then closes the partition and forwards whatever the cursor queued in the
/// stream's message repository. Messages arrive in whatever order the tasks
/// run.
#[derive(Debug)]
pub struct MockConcurrentEngine {
    records_per_stream: usize,
    invocations: Mutex<Vec<Vec<String>>>,
}

impl MockConcurrentEngine {
    /// Creates a mock emitting `records_per_stream` records per stream.
    #[must_use]
    pub fn new(records_per_stream: usize) -> Self {
        Self {
            records_per_stream,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Returns the stream names of every invocation, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.lock().clone()
    }

    /// Returns how many times the engine was invoked.
    #[must_use]
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

impl ConcurrentEngine for MockConcurrentEngine {
    fn read(&self, streams: Vec<AbstractStream>) -> MessageStream {
        self.invocations
            .lock()
            .push(streams.iter().map(|s| s.name().to_string()).collect());

        let (tx, rx) = mpsc::channel(64);
        for stream in streams {
            let tx = tx.clone();
            let count = i64::try_from(self.records_per_stream).unwrap_or(i64::MAX);
            tokio::spawn(async move {
                for id in 1..=count {
                    let rec = record(stream.descriptor(), id);
                    stream.cursor().observe(&rec);
                    if tx.send(Ok(Message::Record(rec))).await.is_err() {
                        return;
                    }
                }
                stream.cursor().close_partition();
                stream.cursor().ensure_at_least_one_state_emitted();
                for message in stream.message_repository().consume_queue() {
                    if tx.send(Ok(message)).await.is_err() {
                        return;
                    }
                }
            });
        }

        ReceiverStream::new(rx).boxed()
    }
}

/// A recorded sequential-engine invocation.
#[derive(Debug, Clone)]
pub struct SequentialCall {
    /// The source type of the configuration passed in.
    pub source_type: String,
    /// The residual catalog.
    pub catalog: ConfiguredCatalog,
    /// The state argument.
    pub state: Option<SourceState>,
}

/// Mock sequential engine.
///
/// Emits `records_per_stream` records for each catalog entry, one stream
/// after another in catalog order.
#[derive(Debug)]
pub struct MockSequentialEngine {
    records_per_stream: usize,
    calls: Mutex<Vec<SequentialCall>>,
}

impl MockSequentialEngine {
    /// Creates a mock emitting `records_per_stream` records per entry.
    #[must_use]
    pub fn new(records_per_stream: usize) -> Self {
        Self {
            records_per_stream,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns every recorded invocation.
    #[must_use]
    pub fn calls(&self) -> Vec<SequentialCall> {
        self.calls.lock().clone()
    }

    /// Returns how many times the engine was invoked.
    #[must_use]
    pub fn invocation_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl SequentialEngine for MockSequentialEngine {
    fn read(
        &self,
        config: &SourceConfig,
        catalog: ConfiguredCatalog,
        state: Option<SourceState>,
    ) -> MessageStream {
        self.calls.lock().push(SequentialCall {
            source_type: config.source_type().to_string(),
            catalog: catalog.clone(),
            state,
        });

        let count = i64::try_from(self.records_per_stream).unwrap_or(i64::MAX);
        let messages: Vec<Result<Message, ExtractError>> = catalog
            .streams
            .iter()
            .flat_map(|entry| {
                (1..=count).map(move |id| Ok(Message::Record(record(&entry.stream, id))))
            })
            .collect();

        stream::iter(messages).boxed()
    }
}

/// Engine whose output is a single error.
#[derive(Debug, Clone)]
pub struct FailingEngine {
    message: String,
}

impl FailingEngine {
    /// Creates an engine failing with `ExtractError::Engine(message)`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn fail(&self) -> MessageStream {
        stream::once(futures::future::ready(Err(ExtractError::Engine(
            self.message.clone(),
        ))))
        .boxed()
    }
}

impl ConcurrentEngine for FailingEngine {
    fn read(&self, _streams: Vec<AbstractStream>) -> MessageStream {
        self.fail()
    }
}

impl SequentialEngine for FailingEngine {
    fn read(
        &self,
        _config: &SourceConfig,
        _catalog: ConfiguredCatalog,
        _state: Option<SourceState>,
    ) -> MessageStream {
        self.fail()
    }
}

/// Stream provider returning a fixed list of declarations.
#[derive(Debug)]
pub struct StaticStreamProvider {
    streams: Vec<DeclaredStream>,
    error: Option<String>,
    calls: AtomicUsize,
}

impl StaticStreamProvider {
    /// Creates a provider declaring `streams`.
    #[must_use]
    pub fn new(streams: Vec<DeclaredStream>) -> Self {
        Self {
            streams,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a provider whose discovery fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            streams: Vec::new(),
            error: Some(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times streams were requested.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StreamProvider for StaticStreamProvider {
    async fn streams(&self, _config: &SourceConfig) -> Result<Vec<DeclaredStream>, ExtractError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.error {
            Some(message) => Err(ExtractError::Discovery(message.clone())),
            None => Ok(self.streams.clone()),
        }
    }
}
