//! Engine configuration.
//!
//! [`EngineConfig`] carries the backend and loader priority lists and the
//! prefix of generated unit names. It can be built in code or read from the
//! environment:
//!
//! - `TEXTMODEL_BACKEND`: comma-separated backend priority, e.g. `source,naive`
//! - `TEXTMODEL_LOADER`: comma-separated loader priority, e.g. `threaded`
//! - `TEXTMODEL_NAME_PREFIX`: unit name prefix, an identifier

use crate::backend::BackendId;
use crate::loader::LoaderKind;
use std::str::FromStr;
use thiserror::Error;

pub const BACKEND_VAR: &str = "TEXTMODEL_BACKEND";
pub const LOADER_VAR: &str = "TEXTMODEL_LOADER";
pub const NAME_PREFIX_VAR: &str = "TEXTMODEL_NAME_PREFIX";

/// Prefix of generated unit names.
pub const DEFAULT_NAME_PREFIX: &str = "TextModel$";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown backend `{0}`")]
    UnknownBackend(String),

    #[error("unknown loader `{0}`")]
    UnknownLoader(String),

    #[error("invalid unit name prefix `{0}`")]
    InvalidPrefix(String),

    #[error("{0} priority list is empty")]
    EmptyList(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub backends: Vec<BackendId>,
    pub loaders: Vec<LoaderKind>,
    pub name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backends: BackendId::PRIORITY.to_vec(),
            loaders: LoaderKind::ALL.to_vec(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

fn parse_list<K: FromStr<Err = String>>(
    value: &str,
    what: &'static str,
    unknown: fn(String) -> ConfigError,
) -> Result<Vec<K>, ConfigError> {
    let items = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(unknown))
        .collect::<Result<Vec<K>, _>>()?;
    if items.is_empty() {
        return Err(ConfigError::EmptyList(what));
    }
    Ok(items)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl EngineConfig {
    /// Backend priority list.
    pub fn backends(mut self, backends: impl IntoIterator<Item = BackendId>) -> Self {
        self.backends = backends.into_iter().collect();
        self
    }

    /// Use exactly one backend, with no fallback.
    pub fn backend(self, backend: BackendId) -> Self {
        self.backends([backend])
    }

    /// Loader strategy priority list.
    pub fn loaders(mut self, loaders: impl IntoIterator<Item = LoaderKind>) -> Self {
        self.loaders = loaders.into_iter().collect();
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Parse backend and loader lists from their comma-separated forms.
    pub fn parse_backends(value: &str) -> Result<Vec<BackendId>, ConfigError> {
        parse_list(value, "backend", ConfigError::UnknownBackend)
    }

    pub fn parse_loaders(value: &str) -> Result<Vec<LoaderKind>, ConfigError> {
        parse_list(value, "loader", ConfigError::UnknownLoader)
    }

    /// Configuration from `TEXTMODEL_*` variables, defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(BACKEND_VAR) {
            config.backends = Self::parse_backends(&value)?;
        }
        if let Some(value) = lookup(LOADER_VAR) {
            config.loaders = Self::parse_loaders(&value)?;
        }
        if let Some(value) = lookup(NAME_PREFIX_VAR) {
            config.name_prefix = value;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.is_empty() {
            return Err(ConfigError::EmptyList("backend"));
        }
        if self.loaders.is_empty() {
            return Err(ConfigError::EmptyList("loader"));
        }
        if !is_identifier(&self.name_prefix) {
            return Err(ConfigError::InvalidPrefix(self.name_prefix.clone()));
        }
        Ok(())
    }
}
