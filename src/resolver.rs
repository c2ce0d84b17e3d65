//! Mapping from a record's discovered locator to its direct media URL
//!
//! Scrapers record whatever page they found a session on; some origins serve
//! the media file from a different, predictable location.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::config::{ResolverConfig, SourcesConfig};
use crate::error::{Error, Result, TransferError};
use crate::types::Record;

/// Turns a record into the URL its media should be fetched from
pub trait MediaResolver: Send + Sync {
    /// Direct media URL for `record`
    fn resolve(&self, record: &Record) -> std::result::Result<String, TransferError>;
}

/// Uses `origin_url` unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughResolver;

impl MediaResolver for PassthroughResolver {
    fn resolve(&self, record: &Record) -> std::result::Result<String, TransferError> {
        Url::parse(&record.origin_url).map_err(|e| {
            TransferError::Validation(format!(
                "invalid origin URL '{}': {}",
                record.origin_url, e
            ))
        })?;
        Ok(record.origin_url.clone())
    }
}

/// House archive: `<base>/ArchiveVideoFiles/<external_id>.mp4`
#[derive(Debug, Clone)]
pub struct HouseArchiveResolver {
    base: Url,
}

impl HouseArchiveResolver {
    /// Create a resolver rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            Error::config(format!("invalid archive base URL '{}': {}", base_url, e), "base_url")
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::config(
                format!("'{}' cannot be used as a base URL", base_url),
                "base_url",
            ));
        }
        Ok(Self { base })
    }
}

impl MediaResolver for HouseArchiveResolver {
    fn resolve(&self, record: &Record) -> std::result::Result<String, TransferError> {
        let id = record.key.external_id.trim();
        if id.is_empty() {
            return Err(TransferError::Validation("empty external_id".to_string()));
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransferError::Validation(format!("bad base URL {}", self.base)))?
            .pop_if_empty()
            .push("ArchiveVideoFiles")
            .push(&format!("{}.mp4", id));
        Ok(url.into())
    }
}

/// Resolver lookup by source name, falling back to [`PassthroughResolver`]
#[derive(Clone)]
pub struct ResolverRegistry {
    by_source: HashMap<String, Arc<dyn MediaResolver>>,
    fallback: Arc<dyn MediaResolver>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self {
            by_source: HashMap::new(),
            fallback: Arc::new(PassthroughResolver),
        }
    }
}

impl ResolverRegistry {
    /// Build resolvers for every configured source
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        let mut registry = Self::default();
        for (source, resolver) in &config.resolvers {
            let resolver: Arc<dyn MediaResolver> = match resolver {
                ResolverConfig::Passthrough => Arc::new(PassthroughResolver),
                ResolverConfig::HouseArchive { base_url } => {
                    Arc::new(HouseArchiveResolver::new(base_url)?)
                }
            };
            registry.by_source.insert(source.clone(), resolver);
        }
        Ok(registry)
    }

    /// Install or replace the resolver for `source`
    pub fn register(&mut self, source: impl Into<String>, resolver: Arc<dyn MediaResolver>) {
        self.by_source.insert(source.into(), resolver);
    }

    /// Resolve through the source's resolver, or the fallback
    pub fn resolve(&self, record: &Record) -> std::result::Result<String, TransferError> {
        self.by_source
            .get(&record.key.source)
            .unwrap_or(&self.fallback)
            .resolve(record)
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sources: Vec<_> = self.by_source.keys().collect();
        sources.sort();
        f.debug_struct("ResolverRegistry")
            .field("sources", &sources)
            .finish_non_exhaustive()
    }
}
