//! Stream classification.
//!
//! Partitions the streams requested by a catalog into concurrent-capable
//! streams (unwrapped to their [`AbstractStream`]) and everything else,
//! which stays with the sequential path.

use std::collections::{HashMap, HashSet};

use crate::catalog::{ConfiguredCatalog, StreamDescriptor};
use crate::config::UnknownStreamPolicy;
use crate::error::ExtractError;
use crate::stream::{AbstractStream, DeclaredStream};

/// Result of classifying a catalog.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Concurrent-capable streams, unique by identity, in first-seen catalog order.
    pub concurrent: Vec<AbstractStream>,

    /// Catalog names with no declared stream, in catalog order.
    pub unknown: Vec<String>,
}

impl Classification {
    /// Returns the names of the concurrent-capable streams.
    #[must_use]
    pub fn concurrent_names(&self) -> HashSet<String> {
        self.concurrent
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }
}

/// Decides which catalog entries run on the concurrent engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamClassifier {
    policy: UnknownStreamPolicy,
}

impl StreamClassifier {
    /// Creates a classifier with the given unknown-stream policy.
    #[must_use]
    pub fn new(policy: UnknownStreamPolicy) -> Self {
        Self { policy }
    }

    /// Classifies `catalog` against the declared streams.
    ///
    /// Declared streams are looked up by name; when two share a name the
    /// later one wins. Declared streams are only read, never modified.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::UnknownStream` for the first undeclared
    /// catalog entry when the policy is [`UnknownStreamPolicy::Fail`].
    pub fn classify(
        &self,
        catalog: &ConfiguredCatalog,
        declared: &[DeclaredStream],
    ) -> Result<Classification, ExtractError> {
        let by_name: HashMap<&str, &DeclaredStream> =
            declared.iter().map(|s| (s.name(), s)).collect();

        let mut seen: HashSet<StreamDescriptor> = HashSet::new();
        let mut result = Classification::default();

        for entry in &catalog.streams {
            let Some(stream) = by_name.get(entry.name()) else {
                match self.policy {
                    UnknownStreamPolicy::Skip => {
                        tracing::debug!(stream = entry.name(), "skipping undeclared stream");
                        result.unknown.push(entry.name().to_string());
                        continue;
                    }
                    UnknownStreamPolicy::Fail => {
                        tracing::warn!(stream = entry.name(), "catalog references undeclared stream");
                        return Err(ExtractError::UnknownStream {
                            name: entry.name().to_string(),
                        });
                    }
                }
            };

            if let Some(facade) = stream.as_facade() {
                let underlying = facade.underlying_stream();
                if seen.insert(underlying.descriptor().clone()) {
                    result.concurrent.push(underlying.clone());
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::CursorBinder;
    use crate::catalog::ConfiguredStream;
    use crate::stream::SourceStream;
    use std::sync::Arc;

    fn concurrent(name: &str) -> DeclaredStream {
        CursorBinder::default().bind_declared(Arc::new(SourceStream::builder(name).build()), None)
    }

    fn plain(name: &str) -> DeclaredStream {
        DeclaredStream::from(SourceStream::builder(name).build())
    }

    fn catalog(names: &[&str]) -> ConfiguredCatalog {
        ConfiguredCatalog::new(names.iter().map(|n| ConfiguredStream::full_refresh(*n)).collect())
    }

    fn names(streams: &[AbstractStream]) -> Vec<&str> {
        streams.iter().map(AbstractStream::name).collect()
    }

    #[test]
    fn test_partition_by_capability() {
        let declared = vec![concurrent("a"), plain("b"), concurrent("c")];
        let result = StreamClassifier::default()
            .classify(&catalog(&["c", "b", "a"]), &declared)
            .unwrap();

        assert_eq!(names(&result.concurrent), vec!["c", "a"]);
        assert!(result.unknown.is_empty());
        assert_eq!(result.concurrent_names().len(), 2);
    }

    #[test]
    fn test_unknown_streams_skipped() {
        let declared = vec![concurrent("a"), plain("b")];
        let result = StreamClassifier::new(UnknownStreamPolicy::Skip)
            .classify(&catalog(&["a", "b", "c"]), &declared)
            .unwrap();

        assert_eq!(names(&result.concurrent), vec!["a"]);
        assert_eq!(result.unknown, vec!["c".to_string()]);
    }

    #[test]
    fn test_unknown_streams_rejected() {
        let declared = vec![concurrent("a")];
        let err = StreamClassifier::new(UnknownStreamPolicy::Fail)
            .classify(&catalog(&["a", "ghost"]), &declared)
            .unwrap_err();

        assert!(matches!(err, ExtractError::UnknownStream { name } if name == "ghost"));
    }

    #[test]
    fn test_last_declaration_wins() {
        // Same name twice: the later plain declaration shadows the facade
        let declared = vec![concurrent("a"), plain("a")];
        let result = StreamClassifier::default()
            .classify(&catalog(&["a"]), &declared)
            .unwrap();
        assert!(result.concurrent.is_empty());

        let declared = vec![plain("a"), concurrent("a")];
        let result = StreamClassifier::default()
            .classify(&catalog(&["a"]), &declared)
            .unwrap();
        assert_eq!(names(&result.concurrent), vec!["a"]);
    }

    #[test]
    fn test_duplicate_catalog_entries_collapse() {
        let declared = vec![concurrent("a")];
        let result = StreamClassifier::default()
            .classify(&catalog(&["a", "a"]), &declared)
            .unwrap();
        assert_eq!(result.concurrent.len(), 1);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let declared = vec![concurrent("a"), plain("b"), concurrent("c")];
        let catalog = catalog(&["a", "b", "c", "d"]);
        let classifier = StreamClassifier::default();

        let first = classifier.classify(&catalog, &declared).unwrap();
        let second = classifier.classify(&catalog, &declared).unwrap();

        assert_eq!(first.concurrent_names(), second.concurrent_names());
        assert_eq!(first.unknown, second.unknown);
        for (a, b) in first.concurrent.iter().zip(&second.concurrent) {
            assert!(Arc::ptr_eq(a.cursor(), b.cursor()));
            assert!(Arc::ptr_eq(a.source(), b.source()));
        }
    }

    #[test]
    fn test_empty_catalog() {
        let result = StreamClassifier::default()
            .classify(&ConfiguredCatalog::default(), &[concurrent("a")])
            .unwrap();
        assert!(result.concurrent.is_empty());
        assert!(result.unknown.is_empty());
    }
}
