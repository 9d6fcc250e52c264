//! Source and router configuration.
//!
//! A job arrives with a flat string map. Stream providers and the
//! sequential engine read their own keys out of it; the router only looks
//! at keys under [`ROUTER_KEY_PREFIX`] and rejects any it does not know.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ExtractError;

/// Prefix shared by every router key.
pub const ROUTER_KEY_PREFIX: &str = "router.";

/// Key that selects the [`UnknownStreamPolicy`].
pub const UNKNOWN_STREAMS_KEY: &str = "router.unknown_streams";

/// Configuration of one extraction job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceConfig {
    source_type: String,
    properties: HashMap<String, String>,
}

impl SourceConfig {
    /// Creates an empty configuration for a source type such as `"github"`.
    #[must_use]
    pub fn new(source_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            properties: HashMap::new(),
        }
    }

    /// Returns the source type.
    #[must_use]
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// Sets `key` to `value`, replacing any earlier value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Returns the value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns the value of `key`, which providers treat as mandatory.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::MissingConfig` naming the key when it is unset.
    pub fn require(&self, key: &str) -> Result<&str, ExtractError> {
        self.get(key)
            .ok_or_else(|| ExtractError::MissingConfig(key.to_string()))
    }

    /// Parses the value of `key`, if set.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::ConfigurationError` when the value does not
    /// parse as `T`.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ExtractError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|e| {
            ExtractError::ConfigurationError(format!("{key} = '{raw}': {e}"))
        })
    }

    /// Iterates over the keys starting with `prefix`.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.properties
            .keys()
            .map(String::as_str)
            .filter(move |k| k.starts_with(prefix))
    }
}

/// A configuration key accepted by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigKeySpec {
    /// Full key, including [`ROUTER_KEY_PREFIX`].
    pub key: &'static str,

    /// What the key controls.
    pub description: &'static str,

    /// Value used when the key is unset.
    pub default: &'static str,
}

/// What the classifier does with catalog entries that name an undeclared stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownStreamPolicy {
    /// Drop the entry without producing output or an error.
    #[default]
    Skip,

    /// Abort planning with [`ExtractError::UnknownStream`].
    Fail,
}

impl FromStr for UnknownStreamPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(UnknownStreamPolicy::Skip),
            "fail" => Ok(UnknownStreamPolicy::Fail),
            other => Err(format!("expected 'skip' or 'fail', got '{other}'")),
        }
    }
}

impl fmt::Display for UnknownStreamPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownStreamPolicy::Skip => write!(f, "skip"),
            UnknownStreamPolicy::Fail => write!(f, "fail"),
        }
    }
}

/// Configuration for the [`ExtractRouter`](crate::router::ExtractRouter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterConfig {
    /// Handling of catalog entries without a declared stream.
    pub unknown_streams: UnknownStreamPolicy,
}

impl RouterConfig {
    /// Creates a router config that rejects unknown catalog streams.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            unknown_streams: UnknownStreamPolicy::Fail,
        }
    }

    /// Reads the router keys out of a job configuration.
    ///
    /// Keys outside [`ROUTER_KEY_PREFIX`] belong to the source and are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::ConfigurationError` for a router key that is
    /// not listed in [`config_keys`](Self::config_keys), or for a value that
    /// does not parse.
    pub fn from_source_config(config: &SourceConfig) -> Result<Self, ExtractError> {
        let known = Self::config_keys();
        let mut unrecognized: Vec<&str> = config
            .keys_with_prefix(ROUTER_KEY_PREFIX)
            .filter(|key| !known.iter().any(|spec| spec.key == *key))
            .collect();
        if !unrecognized.is_empty() {
            unrecognized.sort_unstable();
            return Err(ExtractError::ConfigurationError(format!(
                "unrecognized router keys: {}",
                unrecognized.join(", ")
            )));
        }

        let unknown_streams = config
            .get_parsed::<UnknownStreamPolicy>(UNKNOWN_STREAMS_KEY)?
            .unwrap_or_default();
        Ok(Self { unknown_streams })
    }

    /// Keys understood by the router.
    #[must_use]
    pub fn config_keys() -> Vec<ConfigKeySpec> {
        vec![ConfigKeySpec {
            key: UNKNOWN_STREAMS_KEY,
            description: "Handling of catalog streams that are not declared (skip | fail)",
            default: "skip",
        }]
    }
}
