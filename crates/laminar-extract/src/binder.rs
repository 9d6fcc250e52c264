//! Cursor binding.
//!
//! Before a stream reaches the router, the [`CursorBinder`] decides which
//! cursor it runs with and wraps it in a [`StreamFacade`]:
//!
//! - a supplied cursor is used as-is, its state is captured, and it is
//!   attached to the stream and to the stream's parent where their
//!   capabilities allow
//! - without a supplied cursor, a [`FinalStateCursor`] is created for the
//!   stream and the captured state is empty
//!
//! Binding never fails. Missing capabilities skip the attachment.

use std::sync::Arc;

use crate::cursor::{FinalStateCursor, SharedCursor};
use crate::message::{InMemoryMessageRepository, MessageSink};
use crate::state::StreamState;
use crate::stream::{DeclaredStream, SourceStream, StreamFacade};

/// Attaches cursors to streams and produces concurrent-capable facades.
#[derive(Debug, Clone)]
pub struct CursorBinder {
    sink: Arc<dyn MessageSink>,
}

impl CursorBinder {
    /// Creates a binder emitting final-state messages into `sink`.
    ///
    /// Without a sink, a fresh [`InMemoryMessageRepository`] is used.
    #[must_use]
    pub fn new(sink: Option<Arc<dyn MessageSink>>) -> Self {
        let sink: Arc<dyn MessageSink> = match sink {
            Some(sink) => sink,
            None => Arc::new(InMemoryMessageRepository::new()),
        };
        Self { sink }
    }

    /// Returns the sink used by final-state cursors and carried by every
    /// facade this binder creates.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn MessageSink> {
        &self.sink
    }

    /// Binds the effective cursor to `stream`.
    ///
    /// The returned facade carries the stream, the effective cursor and the
    /// state captured from it.
    #[must_use]
    pub fn bind(
        &self,
        stream: Arc<SourceStream>,
        supplied: Option<SharedCursor>,
    ) -> StreamFacade {
        let (state, cursor) = match supplied {
            Some(cursor) => {
                let state = cursor.state();
                let capabilities = stream.capabilities();

                if capabilities.supports_cursor && stream.has_cursor_field() {
                    stream.set_cursor(Arc::clone(&cursor));
                    tracing::debug!(stream = %stream.descriptor(), "attached cursor");
                }

                if capabilities.has_parent_with_cursor {
                    if let Some(parent) = stream.parent() {
                        parent.set_cursor(Arc::clone(&cursor));
                        tracing::debug!(
                            stream = %stream.descriptor(),
                            parent = %parent.descriptor(),
                            "attached cursor to parent stream"
                        );
                    }
                }

                (state, cursor)
            }
            None => {
                let cursor: SharedCursor = Arc::new(FinalStateCursor::new(
                    stream.descriptor().clone(),
                    Arc::clone(&self.sink),
                ));
                (StreamState::new(), cursor)
            }
        };

        StreamFacade::create_from_stream(stream, state, cursor, Arc::clone(&self.sink))
    }

    /// Binds and returns the stream as a concurrent-capable declaration.
    #[must_use]
    pub fn bind_declared(
        &self,
        stream: Arc<SourceStream>,
        supplied: Option<SharedCursor>,
    ) -> DeclaredStream {
        DeclaredStream::Concurrent(self.bind(stream, supplied))
    }
}

impl Default for CursorBinder {
    fn default() -> Self {
        Self::new(None)
    }
}
