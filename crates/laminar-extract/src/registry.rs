//! Stream registry with factory pattern.
//!
//! The [`StreamRegistry`] keeps the stream declarations of a source as
//! factories and builds them on demand from the job configuration. It is the
//! standard [`StreamProvider`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::SourceConfig;
use crate::engine::StreamProvider;
use crate::error::ExtractError;
use crate::stream::DeclaredStream;

/// Factory function type for declaring a stream.
pub type StreamFactory =
    Arc<dyn Fn(&SourceConfig) -> Result<DeclaredStream, ExtractError> + Send + Sync>;

/// Registry of stream declarations.
///
/// Streams are declared in registration order. Registering a name again
/// replaces the factory but keeps its position.
///
/// # Example
///
/// ```rust,ignore
/// let registry = StreamRegistry::new();
/// registry.register_fn("users", |_config| {
///     Ok(SourceStream::builder("users").build().into())
/// });
///
/// let streams = registry.streams(&config).await?;
/// ```
#[derive(Clone, Default)]
pub struct StreamRegistry {
    factories: Arc<RwLock<Vec<(String, StreamFactory)>>>,
}

impl StreamRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stream factory under `name`.
    pub fn register(&self, name: impl Into<String>, factory: StreamFactory) {
        let name = name.into();
        let mut factories = self.factories.write();
        if let Some(slot) = factories.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = factory;
        } else {
            factories.push((name, factory));
        }
    }

    /// Registers a closure as the factory for `name`.
    pub fn register_fn<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SourceConfig) -> Result<DeclaredStream, ExtractError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(factory));
    }

    /// Returns `true` if a stream is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().iter().any(|(n, _)| n == name)
    }

    /// Lists the registered stream names in declaration order.
    #[must_use]
    pub fn list_streams(&self) -> Vec<String> {
        self.factories.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Returns the number of registered streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Returns `true` if no streams are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

#[async_trait]
impl StreamProvider for StreamRegistry {
    async fn streams(&self, config: &SourceConfig) -> Result<Vec<DeclaredStream>, ExtractError> {
        // Clone out so no lock is held while factories run
        let factories: Vec<StreamFactory> = self
            .factories
            .read()
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();

        factories.iter().map(|factory| factory(config)).collect()
    }
}

impl fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("streams", &self.list_streams())
            .finish()
    }
}
