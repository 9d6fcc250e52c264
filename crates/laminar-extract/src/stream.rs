//! Declared streams and their concurrent-capable facades.
//!
//! A [`SourceStream`] is a named unit of extractable data. Its optional
//! capabilities (accepting a cursor, having a parent that accepts one) are
//! resolved once by [`SourceStreamBuilder::build`] into a fixed
//! [`StreamCapabilities`] table.
//!
//! Streams that opt into concurrent execution are wrapped in a
//! [`StreamFacade`], which exposes the engine-facing [`AbstractStream`].
//! The stream provider hands out [`DeclaredStream`]s:
//!
//! ```text
//! DeclaredStream::Plain(Arc<SourceStream>)        -> sequential engine
//! DeclaredStream::Concurrent(StreamFacade)
//!     └── underlying_stream() -> AbstractStream   -> concurrent engine
//!            ├── source: Arc<SourceStream>   (shared, not copied)
//!            ├── cursor: SharedCursor
//!            ├── state:  StreamState (captured at bind time)
//!            └── message_repository: where the cursor's state messages queue
//! ```

use std::sync::Arc;

use crate::catalog::StreamDescriptor;
use crate::cursor::{CursorSlot, SharedCursor};
use crate::message::MessageSink;
use crate::state::StreamState;

/// Optional capabilities of a stream, fixed at declaration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCapabilities {
    /// The stream accepts an externally supplied cursor.
    pub supports_cursor: bool,

    /// The stream has a parent that accepts a cursor.
    pub has_parent_with_cursor: bool,
}

/// A declared stream.
#[derive(Debug)]
pub struct SourceStream {
    descriptor: StreamDescriptor,
    cursor_field: Vec<String>,
    cursor_slot: Option<CursorSlot>,
    parent: Option<Arc<SourceStream>>,
    capabilities: StreamCapabilities,
}

impl SourceStream {
    /// Starts building a stream with the given name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SourceStreamBuilder {
        SourceStreamBuilder::new(name)
    }

    /// Returns the stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Returns the stream namespace.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.descriptor.namespace.as_deref()
    }

    /// Returns the stream identity.
    #[must_use]
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    /// Returns the cursor field path. Empty when the stream has none.
    #[must_use]
    pub fn cursor_field(&self) -> &[String] {
        &self.cursor_field
    }

    /// Returns `true` if the stream declares a non-empty cursor field.
    #[must_use]
    pub fn has_cursor_field(&self) -> bool {
        !self.cursor_field.is_empty()
    }

    /// Returns the capability table.
    #[must_use]
    pub fn capabilities(&self) -> StreamCapabilities {
        self.capabilities
    }

    /// Returns the parent stream, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<SourceStream>> {
        self.parent.as_ref()
    }

    /// Returns the attached cursor, if any.
    #[must_use]
    pub fn cursor(&self) -> Option<SharedCursor> {
        self.cursor_slot.as_ref().and_then(CursorSlot::get)
    }

    /// Attaches a cursor. Returns `false` if the stream cannot hold one.
    pub fn set_cursor(&self, cursor: SharedCursor) -> bool {
        match &self.cursor_slot {
            Some(slot) => {
                slot.attach(cursor);
                true
            }
            None => false,
        }
    }
}

/// Builder for [`SourceStream`].
#[derive(Debug)]
pub struct SourceStreamBuilder {
    descriptor: StreamDescriptor,
    cursor_field: Vec<String>,
    accepts_cursor: bool,
    parent: Option<Arc<SourceStream>>,
}

impl SourceStreamBuilder {
    /// Creates a builder for a stream without namespace or capabilities.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: StreamDescriptor::new(name),
            cursor_field: Vec::new(),
            accepts_cursor: false,
            parent: None,
        }
    }

    /// Sets the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.descriptor.namespace = Some(namespace.into());
        self
    }

    /// Sets the cursor field path.
    #[must_use]
    pub fn cursor_field<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cursor_field = path.into_iter().map(Into::into).collect();
        self
    }

    /// Gives the stream a cursor slot so a cursor can be attached to it.
    #[must_use]
    pub fn accepts_cursor(mut self) -> Self {
        self.accepts_cursor = true;
        self
    }

    /// Sets the parent stream this stream depends on.
    #[must_use]
    pub fn parent(mut self, parent: Arc<SourceStream>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builds the stream and resolves its capability table.
    #[must_use]
    pub fn build(self) -> SourceStream {
        let capabilities = StreamCapabilities {
            supports_cursor: self.accepts_cursor,
            has_parent_with_cursor: self
                .parent
                .as_ref()
                .is_some_and(|p| p.capabilities().supports_cursor),
        };
        SourceStream {
            descriptor: self.descriptor,
            cursor_field: self.cursor_field,
            cursor_slot: self.accepts_cursor.then(CursorSlot::new),
            parent: self.parent,
            capabilities,
        }
    }
}

/// Engine-facing representation of a concurrent-capable stream.
#[derive(Debug, Clone)]
pub struct AbstractStream {
    source: Arc<SourceStream>,
    cursor: SharedCursor,
    state: StreamState,
    message_repository: Arc<dyn MessageSink>,
}

impl AbstractStream {
    /// Returns the stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Returns the stream identity.
    #[must_use]
    pub fn descriptor(&self) -> &StreamDescriptor {
        self.source.descriptor()
    }

    /// Returns the wrapped declared stream.
    #[must_use]
    pub fn source(&self) -> &Arc<SourceStream> {
        &self.source
    }

    /// Returns the effective cursor.
    #[must_use]
    pub fn cursor(&self) -> &SharedCursor {
        &self.cursor
    }

    /// Returns the state captured when the stream was bound.
    #[must_use]
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Returns the repository the stream's cursor emits state messages into.
    ///
    /// Nothing reaches the job output unless the engine drains it.
    #[must_use]
    pub fn message_repository(&self) -> &Arc<dyn MessageSink> {
        &self.message_repository
    }
}

/// A declared stream that opted into concurrent execution.
#[derive(Debug, Clone)]
pub struct StreamFacade {
    underlying: AbstractStream,
}

impl StreamFacade {
    /// Wraps a stream together with its effective cursor, captured state and
    /// the repository its cursor publishes into.
    #[must_use]
    pub fn create_from_stream(
        stream: Arc<SourceStream>,
        state: StreamState,
        cursor: SharedCursor,
        message_repository: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            underlying: AbstractStream {
                source: stream,
                cursor,
                state,
                message_repository,
            },
        }
    }

    /// Returns the stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.underlying.name()
    }

    /// Returns the engine-facing representation.
    #[must_use]
    pub fn underlying_stream(&self) -> &AbstractStream {
        &self.underlying
    }

    /// Unwraps into the engine-facing representation.
    #[must_use]
    pub fn into_underlying(self) -> AbstractStream {
        self.underlying
    }

    /// Returns the effective cursor.
    #[must_use]
    pub fn cursor(&self) -> &SharedCursor {
        self.underlying.cursor()
    }

    /// Returns the captured state.
    #[must_use]
    pub fn state(&self) -> &StreamState {
        self.underlying.state()
    }

    /// Returns the repository the cursor publishes into.
    #[must_use]
    pub fn message_repository(&self) -> &Arc<dyn MessageSink> {
        self.underlying.message_repository()
    }
}

/// A stream as handed out by a stream provider.
#[derive(Debug, Clone)]
pub enum DeclaredStream {
    /// Runs through the sequential engine.
    Plain(Arc<SourceStream>),

    /// Runs through the concurrent engine.
    Concurrent(StreamFacade),
}

impl DeclaredStream {
    /// Returns the stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DeclaredStream::Plain(s) => s.name(),
            DeclaredStream::Concurrent(f) => f.name(),
        }
    }

    /// Returns the stream identity.
    #[must_use]
    pub fn descriptor(&self) -> &StreamDescriptor {
        match self {
            DeclaredStream::Plain(s) => s.descriptor(),
            DeclaredStream::Concurrent(f) => f.underlying_stream().descriptor(),
        }
    }

    /// Returns the declared stream behind this entry.
    #[must_use]
    pub fn source(&self) -> &Arc<SourceStream> {
        match self {
            DeclaredStream::Plain(s) => s,
            DeclaredStream::Concurrent(f) => f.underlying_stream().source(),
        }
    }

    /// Returns `true` for concurrent-capable streams.
    #[must_use]
    pub fn is_concurrent(&self) -> bool {
        matches!(self, DeclaredStream::Concurrent(_))
    }

    /// Returns the facade of a concurrent-capable stream.
    #[must_use]
    pub fn as_facade(&self) -> Option<&StreamFacade> {
        match self {
            DeclaredStream::Concurrent(f) => Some(f),
            DeclaredStream::Plain(_) => None,
        }
    }
}

impl From<SourceStream> for DeclaredStream {
    fn from(stream: SourceStream) -> Self {
        DeclaredStream::Plain(Arc::new(stream))
    }
}

impl From<StreamFacade> for DeclaredStream {
    fn from(facade: StreamFacade) -> Self {
        DeclaredStream::Concurrent(facade)
    }
}
