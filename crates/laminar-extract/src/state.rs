//! Incremental state and the state manager.
//!
//! State is opaque per-stream progress data. It arrives with the job as a
//! [`SourceState`], is indexed by [`StateManager`], and is captured into a
//! cursor when a stream is bound.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::catalog::StreamDescriptor;
use crate::cursor::{IncrementalCursor, SharedCursor};
use crate::error::ExtractError;
use crate::message::{Message, MessageSink, StateMessage};
use crate::stream::SourceStream;

/// Progress data for one stream.
pub type StreamState = serde_json::Map<String, serde_json::Value>;

/// State supplied to a job.
///
/// Either a list of per-stream state messages, or the legacy shape: one
/// object keyed by stream name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceState {
    /// One state message per stream.
    PerStream(Vec<StateMessage>),

    /// Stream name to state object. Namespaces cannot be expressed.
    Legacy(serde_json::Map<String, serde_json::Value>),
}

impl SourceState {
    /// Parses job state from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Serde` if the document matches neither shape.
    pub fn from_json(json: &str) -> Result<Self, ExtractError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Per-stream state lookup for one job.
#[derive(Debug, Default)]
pub struct StateManager {
    states: RwLock<HashMap<StreamDescriptor, StreamState>>,
}

impl StateManager {
    /// Indexes the incoming job state.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::StateError` if a legacy entry is not an object.
    pub fn new(state: Option<&SourceState>) -> Result<Self, ExtractError> {
        let mut states = HashMap::new();
        match state {
            None => {}
            Some(SourceState::PerStream(messages)) => {
                for msg in messages {
                    states.insert(msg.stream.clone(), msg.data.clone());
                }
            }
            Some(SourceState::Legacy(map)) => {
                for (name, value) in map {
                    let serde_json::Value::Object(obj) = value else {
                        return Err(ExtractError::StateError(format!(
                            "state for stream '{name}' must be an object"
                        )));
                    };
                    states.insert(StreamDescriptor::new(name.clone()), obj.clone());
                }
            }
        }
        Ok(Self {
            states: RwLock::new(states),
        })
    }

    /// Returns the stored state for a stream, or an empty state.
    #[must_use]
    pub fn get_stream_state(&self, stream: &StreamDescriptor) -> StreamState {
        self.states.read().get(stream).cloned().unwrap_or_default()
    }

    /// Replaces the stored state for a stream.
    pub fn update_state_for_stream(&self, stream: &StreamDescriptor, state: StreamState) {
        self.states.write().insert(stream.clone(), state);
    }

    /// Builds a state message from the stored state of a stream.
    #[must_use]
    pub fn create_state_message(&self, stream: &StreamDescriptor) -> Message {
        Message::State(StateMessage::new(
            stream.clone(),
            self.get_stream_state(stream),
        ))
    }

    /// Returns the streams that currently have state.
    #[must_use]
    pub fn streams(&self) -> Vec<StreamDescriptor> {
        let mut streams: Vec<_> = self.states.read().keys().cloned().collect();
        streams.sort();
        streams
    }

    /// Supplies a real cursor for a stream, when it can have one.
    ///
    /// Streams that declare a cursor field get an [`IncrementalCursor`]
    /// seeded with their stored state. Streams without one get `None`,
    /// which makes the binder fall back to a final-state cursor.
    #[must_use]
    pub fn cursor_for(
        self: &Arc<Self>,
        stream: &SourceStream,
        sink: Arc<dyn MessageSink>,
    ) -> Option<SharedCursor> {
        if !stream.has_cursor_field() {
            return None;
        }
        let descriptor = stream.descriptor().clone();
        let initial = self.get_stream_state(&descriptor);
        Some(Arc::new(IncrementalCursor::new(
            descriptor,
            stream.cursor_field().to_vec(),
            initial,
            sink,
            Arc::clone(self),
        )))
    }
}
