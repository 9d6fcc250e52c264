//! # `LaminarDB` Extract
//!
//! Stream-execution routing for extraction jobs. A job names a catalog of
//! streams; some of them can be read by a concurrent engine, the rest go
//! through the sequential engine. This crate decides which is which, binds
//! cursors before streams are handed over, and merges both outputs into a
//! single message stream.
//!
//! - [`binder`] - Cursor binding and concurrent-capable facades
//! - [`classifier`] - Catalog classification
//! - [`router`] - Planning and the merged read
//! - [`registry`] - Factory pattern for stream declarations
//! - [`testing`] - Mock engines and test utilities
//!
//! ## Architecture
//!
//! ```text
//! StreamRegistry ──> DeclaredStream::{Plain, Concurrent(StreamFacade)}
//!                                  │
//! ConfiguredCatalog ──> StreamClassifier ──> ExecutionPlan
//!                                              │          │
//!                                   ConcurrentEngine  SequentialEngine
//!                                              └── chain ─┘
//!                                                   │
//!                                             MessageStream
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Common test patterns that are acceptable
#![cfg_attr(
    test,
    allow(
        clippy::float_cmp,
        clippy::manual_let_else,
        clippy::unreadable_literal,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::no_effect_underscore_binding,
        unused_mut
    )
)]

// ── Data model ──

/// Extraction error types.
pub mod error;

/// Source and router configuration types.
pub mod config;

/// Stream identity and configured catalogs.
pub mod catalog;

/// Messages produced by an extraction.
pub mod message;

/// Incremental state and the state manager.
pub mod state;

// ── Streams and cursors ──

/// Cursor implementations and the cursor contract.
pub mod cursor;

/// Source streams, facades and declarations.
pub mod stream;

/// Cursor binding.
pub mod binder;

// ── Routing ──

/// Stream classification.
pub mod classifier;

/// Engine and provider traits.
pub mod engine;

/// Stream registry with factory pattern.
pub mod registry;

/// Extraction router.
pub mod router;

/// Router metrics.
pub mod metrics;

/// Testing utilities (mock engines, helpers).
pub mod testing;

pub use binder::CursorBinder;
pub use catalog::{ConfiguredCatalog, ConfiguredStream, StreamDescriptor, SyncMode};
pub use classifier::{Classification, StreamClassifier};
pub use config::{RouterConfig, SourceConfig, UnknownStreamPolicy};
pub use cursor::{Cursor, CursorKind, FinalStateCursor, IncrementalCursor, SharedCursor};
pub use engine::{ConcurrentEngine, SequentialEngine, StreamProvider};
pub use error::ExtractError;
pub use message::{Message, MessageSink, MessageStream};
pub use registry::StreamRegistry;
pub use router::{ExecutionBranch, ExecutionPlan, ExtractRouter};
pub use state::{SourceState, StateManager, StreamState};
pub use stream::{AbstractStream, DeclaredStream, SourceStream, StreamFacade};
