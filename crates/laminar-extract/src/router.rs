//! Extraction router.
//!
//! The [`ExtractRouter`] splits one extraction job across two engines:
//!
//! ```text
//! catalog ──> StreamProvider ──> StreamClassifier
//!                                  │            │
//!                       concurrent │            │ residual catalog
//!                                  v            v
//!                       ConcurrentEngine   SequentialEngine
//!                                  │            │
//!                                  └── chain ───┘──> MessageStream
//! ```
//!
//! The output is a single lazy stream: every concurrent message comes
//! first, then every sequential message. An engine is only invoked when
//! its branch has work, and the sequential engine is only invoked after
//! the concurrent branch is exhausted.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};

use crate::catalog::{split_residual, ConfiguredCatalog};
use crate::classifier::StreamClassifier;
use crate::config::{RouterConfig, SourceConfig};
use crate::engine::{ConcurrentEngine, SequentialEngine, StreamProvider};
use crate::error::ExtractError;
use crate::message::{Message, MessageStream};
use crate::metrics::RouterMetrics;
use crate::state::SourceState;
use crate::stream::AbstractStream;

/// Names the engine a message or stream was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionBranch {
    /// The concurrent engine.
    Concurrent,
    /// The sequential engine.
    Sequential,
}

impl fmt::Display for ExecutionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionBranch::Concurrent => write!(f, "concurrent"),
            ExecutionBranch::Sequential => write!(f, "sequential"),
        }
    }
}

/// How a catalog is split across the two engines.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    /// Streams for the concurrent engine, in first-seen catalog order.
    pub concurrent: Vec<AbstractStream>,

    /// Catalog entries for the sequential engine, in catalog order.
    ///
    /// Entries naming undeclared streams are not included.
    pub residual: ConfiguredCatalog,

    /// Catalog names with no declared stream.
    pub unknown: Vec<String>,
}

impl ExecutionPlan {
    /// Returns `true` if neither engine has work.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concurrent.is_empty() && self.residual.is_empty()
    }
}

/// Routes an extraction job to the concurrent and sequential engines.
pub struct ExtractRouter {
    provider: Arc<dyn StreamProvider>,
    concurrent: Arc<dyn ConcurrentEngine>,
    sequential: Arc<dyn SequentialEngine>,
    config: RouterConfig,
    metrics: Arc<RouterMetrics>,
}

impl ExtractRouter {
    /// Creates a router over the given collaborators.
    #[must_use]
    pub fn new(
        provider: Arc<dyn StreamProvider>,
        concurrent: Arc<dyn ConcurrentEngine>,
        sequential: Arc<dyn SequentialEngine>,
        config: RouterConfig,
    ) -> Self {
        Self {
            provider,
            concurrent,
            sequential,
            config,
            metrics: Arc::new(RouterMetrics::new()),
        }
    }

    /// Returns the router configuration.
    #[must_use]
    pub fn config(&self) -> RouterConfig {
        self.config
    }

    /// Returns the router metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<RouterMetrics> {
        &self.metrics
    }

    /// Splits `catalog` across the two engines without reading anything.
    ///
    /// Streams are declared once per call.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if discovery fails, or
    /// `ExtractError::UnknownStream` under a strict policy.
    pub async fn plan(
        &self,
        config: &SourceConfig,
        catalog: &ConfiguredCatalog,
    ) -> Result<ExecutionPlan, ExtractError> {
        let declared = self.provider.streams(config).await?;
        let classification =
            StreamClassifier::new(self.config.unknown_streams).classify(catalog, &declared)?;
        // Skipped unknown names produce no output on either branch
        let mut excluded = classification.concurrent_names();
        excluded.extend(classification.unknown.iter().cloned());
        let residual = split_residual(catalog, &excluded);

        Ok(ExecutionPlan {
            concurrent: classification.concurrent,
            residual,
            unknown: classification.unknown,
        })
    }

    /// Reads `catalog`, returning the merged message stream.
    ///
    /// The concurrent engine runs first, over every concurrent-capable
    /// stream; the sequential engine then reads the residual catalog with
    /// `state` exactly as given. Messages and errors are forwarded as the
    /// engines yield them.
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails. Engine errors surface as items
    /// of the returned stream.
    pub async fn read(
        &self,
        config: &SourceConfig,
        catalog: &ConfiguredCatalog,
        state: Option<SourceState>,
    ) -> Result<MessageStream, ExtractError> {
        let ExecutionPlan {
            concurrent,
            residual,
            unknown,
        } = self.plan(config, catalog).await?;

        self.metrics
            .record_plan(concurrent.len(), residual.len(), unknown.len());
        tracing::info!(
            source = config.source_type(),
            concurrent = concurrent.len(),
            sequential = residual.len(),
            unknown = unknown.len(),
            "routing extraction"
        );

        let mut output: MessageStream = stream::empty().boxed();

        if !concurrent.is_empty() {
            let engine = Arc::clone(&self.concurrent);
            let branch = stream::once(async move { engine.read(concurrent) }).flatten();
            output = output
                .chain(instrument(
                    branch,
                    ExecutionBranch::Concurrent,
                    Arc::clone(&self.metrics),
                ))
                .boxed();
        }

        if !residual.is_empty() {
            let engine = Arc::clone(&self.sequential);
            let config = config.clone();
            let branch =
                stream::once(async move { engine.read(&config, residual, state) }).flatten();
            output = output
                .chain(instrument(
                    branch,
                    ExecutionBranch::Sequential,
                    Arc::clone(&self.metrics),
                ))
                .boxed();
        }

        Ok(output)
    }
}

impl fmt::Debug for ExtractRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractRouter")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

/// Counts what a branch yields. Items pass through unchanged.
fn instrument<S>(
    branch: S,
    kind: ExecutionBranch,
    metrics: Arc<RouterMetrics>,
) -> impl Stream<Item = Result<Message, ExtractError>> + Send + 'static
where
    S: Stream<Item = Result<Message, ExtractError>> + Send + 'static,
{
    branch.inspect(move |item| match item {
        Ok(_) => metrics.record_message(kind),
        Err(e) => {
            metrics.record_error();
            tracing::warn!(branch = %kind, error = %e, "engine error");
        }
    })
}
