//! Execution engine traits.
//!
//! The router does not read data itself. It hands concurrent-capable streams
//! to a [`ConcurrentEngine`] and the residual catalog to a
//! [`SequentialEngine`], and obtains its stream declarations from a
//! [`StreamProvider`].

use async_trait::async_trait;

use crate::catalog::ConfiguredCatalog;
use crate::config::SourceConfig;
use crate::error::ExtractError;
use crate::message::MessageStream;
use crate::state::SourceState;
use crate::stream::{AbstractStream, DeclaredStream};

/// Reads a set of unwrapped streams concurrently.
///
/// Implementations own their scheduling. The returned stream yields the
/// messages of all given streams in whatever interleaving the engine
/// produces, and is expected to drive each stream's cursor.
pub trait ConcurrentEngine: Send + Sync {
    /// Starts reading `streams` and returns their messages.
    fn read(&self, streams: Vec<AbstractStream>) -> MessageStream;
}

/// Reads a catalog one stream at a time.
pub trait SequentialEngine: Send + Sync {
    /// Starts reading `catalog` and returns its messages.
    ///
    /// `state` is the job state exactly as it was supplied.
    fn read(
        &self,
        config: &SourceConfig,
        catalog: ConfiguredCatalog,
        state: Option<SourceState>,
    ) -> MessageStream;
}

/// Declares the streams a source exposes.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Returns all streams declared for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError` if the streams cannot be discovered.
    async fn streams(&self, config: &SourceConfig) -> Result<Vec<DeclaredStream>, ExtractError>;
}
