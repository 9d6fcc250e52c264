//! Configured catalog types and the residual-catalog split.
//!
//! The [`ConfiguredCatalog`] is the caller's request: which streams to
//! extract and how. It is never mutated by the router, only filtered into
//! subsets with [`split_residual`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Identity of a stream: its name plus an optional namespace.
///
/// The `(name, namespace)` pair is unique within one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream name.
    pub name: String,

    /// Namespace (schema, database, ...), if the source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl StreamDescriptor {
    /// Creates a descriptor without a namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Creates a descriptor with a namespace.
    #[must_use]
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// How a stream is read from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Read everything on every job.
    #[default]
    FullRefresh,

    /// Read only what changed since the last checkpointed cursor value.
    Incremental,
}

/// How the destination applies the extracted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSyncMode {
    /// Append records.
    #[default]
    Append,

    /// Replace previous contents.
    Overwrite,

    /// Append, then deduplicate by primary key.
    AppendDedup,
}

/// One entry of a [`ConfiguredCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    /// The referenced stream.
    pub stream: StreamDescriptor,

    /// Requested read mode.
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Cursor field path for incremental reads. Empty when unused.
    #[serde(default)]
    pub cursor_field: Vec<String>,

    /// Requested destination behaviour.
    #[serde(default)]
    pub destination_sync_mode: DestinationSyncMode,
}

impl ConfiguredStream {
    /// Creates a full-refresh entry for the named stream.
    #[must_use]
    pub fn full_refresh(name: impl Into<String>) -> Self {
        Self {
            stream: StreamDescriptor::new(name),
            sync_mode: SyncMode::FullRefresh,
            cursor_field: Vec::new(),
            destination_sync_mode: DestinationSyncMode::Overwrite,
        }
    }

    /// Creates an incremental entry for the named stream.
    #[must_use]
    pub fn incremental(name: impl Into<String>, cursor_field: impl Into<String>) -> Self {
        Self {
            stream: StreamDescriptor::new(name),
            sync_mode: SyncMode::Incremental,
            cursor_field: vec![cursor_field.into()],
            destination_sync_mode: DestinationSyncMode::Append,
        }
    }

    /// Sets the namespace of the referenced stream.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.stream.namespace = Some(namespace.into());
        self
    }

    /// Returns the referenced stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.stream.name
    }
}

/// The ordered set of streams requested for one extraction job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    /// Catalog entries in request order.
    pub streams: Vec<ConfiguredStream>,
}

impl ConfiguredCatalog {
    /// Creates a catalog from entries.
    #[must_use]
    pub fn new(streams: Vec<ConfiguredStream>) -> Self {
        Self { streams }
    }

    /// Parses a catalog from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Serde` if the document is not a valid catalog.
    pub fn from_json(json: &str) -> Result<Self, ExtractError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns `true` if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns the referenced stream names in catalog order.
    #[must_use]
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(ConfiguredStream::name).collect()
    }
}

/// Returns the catalog entries left for the sequential path.
///
/// Keeps every entry whose stream name is not in `concurrent_names`,
/// preserving relative order. Only the given names are removed: an entry
/// naming an undeclared stream stays in the result unless its name is
/// passed as well. Callers that drop unknown entries include those names
/// in the set, as [`ExtractRouter::plan`](crate::router::ExtractRouter::plan)
/// does.
#[must_use]
pub fn split_residual(
    catalog: &ConfiguredCatalog,
    concurrent_names: &HashSet<String>,
) -> ConfiguredCatalog {
    ConfiguredCatalog {
        streams: catalog
            .streams
            .iter()
            .filter(|entry| !concurrent_names.contains(entry.name()))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(catalog: &ConfiguredCatalog) -> Vec<&str> {
        catalog.stream_names()
    }

    #[test]
    fn test_descriptor_display() {
        assert_eq!(StreamDescriptor::new("users").to_string(), "users");
        assert_eq!(
            StreamDescriptor::with_namespace("users", "public").to_string(),
            "public.users"
        );
    }

    #[test]
    fn test_split_preserves_order() {
        let catalog = ConfiguredCatalog::new(vec![
            ConfiguredStream::full_refresh("a"),
            ConfiguredStream::full_refresh("b"),
            ConfiguredStream::incremental("c", "updated_at"),
            ConfiguredStream::full_refresh("d"),
        ]);
        let concurrent: HashSet<String> = ["a".to_string(), "c".to_string()].into();

        let residual = split_residual(&catalog, &concurrent);
        assert_eq!(names(&residual), vec!["b", "d"]);
        // Input is untouched
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_split_with_no_concurrent_streams() {
        let catalog = ConfiguredCatalog::new(vec![
            ConfiguredStream::full_refresh("a"),
            ConfiguredStream::full_refresh("b"),
        ]);
        let residual = split_residual(&catalog, &HashSet::new());
        assert_eq!(residual, catalog);
    }

    #[test]
    fn test_split_removes_only_given_names() {
        let catalog = ConfiguredCatalog::new(vec![
            ConfiguredStream::full_refresh("a"),
            ConfiguredStream::full_refresh("b"),
            ConfiguredStream::full_refresh("ghost"),
        ]);
        let concurrent: HashSet<String> = ["a".to_string()].into();
        assert_eq!(names(&split_residual(&catalog, &concurrent)), vec!["b", "ghost"]);

        let mut excluded = concurrent;
        excluded.insert("ghost".to_string());
        assert_eq!(names(&split_residual(&catalog, &excluded)), vec!["b"]);
    }

    #[test]
    fn test_split_everything_concurrent() {
        let catalog = ConfiguredCatalog::new(vec![ConfiguredStream::full_refresh("a")]);
        let concurrent: HashSet<String> = ["a".to_string()].into();
        assert!(split_residual(&catalog, &concurrent).is_empty());
    }

    #[test]
    fn test_catalog_deserialize_defaults() {
        let json = r#"{"streams":[{"stream":{"name":"users"}},
            {"stream":{"name":"events","namespace":"app"},"sync_mode":"incremental",
             "cursor_field":["ts"],"destination_sync_mode":"append_dedup"}]}"#;
        let catalog: ConfiguredCatalog = serde_json::from_str(json).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.streams[0].sync_mode, SyncMode::FullRefresh);
        assert!(catalog.streams[0].cursor_field.is_empty());
        assert_eq!(
            catalog.streams[1].stream,
            StreamDescriptor::with_namespace("events", "app")
        );
        assert_eq!(
            catalog.streams[1].destination_sync_mode,
            DestinationSyncMode::AppendDedup
        );
    }

    #[test]
    fn test_catalog_from_json() {
        let catalog = ConfiguredCatalog::from_json(
            r#"{"streams": [{"stream": {"name": "users"}, "sync_mode": "incremental", "cursor_field": ["updated_at"]}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.stream_names(), vec!["users"]);
        assert_eq!(catalog.streams[0].sync_mode, SyncMode::Incremental);

        assert!(matches!(
            ConfiguredCatalog::from_json("{\"streams\": 3}"),
            Err(ExtractError::Serde(_))
        ));
    }

    #[test]
    fn test_with_namespace() {
        let entry = ConfiguredStream::incremental("orders", "id").with_namespace("shop");
        assert_eq!(entry.name(), "orders");
        assert_eq!(entry.stream.namespace.as_deref(), Some("shop"));
        assert_eq!(entry.cursor_field, vec!["id".to_string()]);
    }
}
