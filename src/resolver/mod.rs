//! Turning user-supplied links into downloadable items.
//!
//! A [`Resolver`] maps one link to zero or more [`DownloadableItem`]s:
//! - [`platform`] - Recognises platform pages; needs an API-backed resolver
//! - [`direct`] - Plain `http(s)` links to audio files
//! - [`manifest`] - Local JSON manifests with per-quality sources
//!
//! [`ChainResolver`] combines them and [`resolve_all`] resolves a whole
//! command line, collecting per-link errors instead of stopping at the first.

pub mod direct;
pub mod manifest;
pub mod platform;

pub use direct::DirectResolver;
pub use manifest::ManifestResolver;
pub use platform::PlatformResolver;

use futures::future::join_all;

use crate::config::DownloadConfig;
use crate::error::ResolutionError;
use crate::types::DownloadableItem;

/// Turns a link into downloadable items
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether this resolver handles `url`
    fn accepts(&self, url: &str) -> bool;

    /// Resolve `url` into items, in playback order
    async fn resolve(&self, url: &str) -> Result<Vec<DownloadableItem>, ResolutionError>;

    /// Resolve `url`, also reporting tracks that were listed but cannot be
    /// downloaded
    ///
    /// Resolvers that only ever yield whole links keep the default.
    async fn resolve_detailed(&self, url: &str) -> Result<Resolved, ResolutionError> {
        Ok(Resolved {
            items: self.resolve(url).await?,
            unavailable: Vec::new(),
        })
    }
}

/// Outcome of resolving one link
#[derive(Debug, Default)]
pub struct Resolved {
    /// Downloadable items, in playback order
    pub items: Vec<DownloadableItem>,
    /// Tracks the link lists that have no usable source
    pub unavailable: Vec<ResolutionError>,
}

/// Tries resolvers in order; the first one that accepts a link answers for it
#[derive(Default)]
pub struct ChainResolver {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ChainResolver {
    /// Empty chain (accepts nothing)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver at the lowest priority
    pub fn with(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Resolvers available without the platform API: platform links are
    /// recognised (and rejected), then manifests, then direct file links.
    pub fn standard(config: &DownloadConfig) -> Self {
        Self::new()
            .with(PlatformResolver)
            .with(ManifestResolver::new(&config.output_dir, config.quality))
            .with(DirectResolver::new(&config.output_dir))
    }

    fn pick(&self, url: &str) -> Result<&dyn Resolver, ResolutionError> {
        let Some(resolver) = self.resolvers.iter().find(|r| r.accepts(url)) else {
            return Err(ResolutionError::Unsupported {
                url: url.to_string(),
            });
        };
        tracing::debug!(url = url, resolver = resolver.name(), "Resolving link");
        Ok(&**resolver)
    }
}

#[async_trait::async_trait]
impl Resolver for ChainResolver {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn accepts(&self, url: &str) -> bool {
        self.resolvers.iter().any(|r| r.accepts(url))
    }

    async fn resolve(&self, url: &str) -> Result<Vec<DownloadableItem>, ResolutionError> {
        self.pick(url)?.resolve(url).await
    }

    async fn resolve_detailed(&self, url: &str) -> Result<Resolved, ResolutionError> {
        self.pick(url)?.resolve_detailed(url).await
    }
}

/// Items and per-link failures from resolving a whole command line
#[derive(Debug, Default)]
pub struct Resolution {
    /// Every resolved item, in link order
    pub items: Vec<DownloadableItem>,
    /// Links that failed, and tracks without a usable source, each with the
    /// link they came from
    pub errors: Vec<(String, ResolutionError)>,
}

/// Resolve every link concurrently, keeping link order
///
/// One link failing never prevents the others from resolving. Tracks a
/// link lists but cannot deliver are recorded as errors alongside it.
pub async fn resolve_all<R>(resolver: &R, urls: &[String]) -> Resolution
where
    R: Resolver + ?Sized,
{
    let outcomes = join_all(urls.iter().map(|url| resolver.resolve_detailed(url))).await;

    let mut resolution = Resolution::default();
    for (url, outcome) in urls.iter().zip(outcomes) {
        match outcome {
            Ok(resolved) => {
                tracing::info!(
                    url = %url,
                    items = resolved.items.len(),
                    unavailable = resolved.unavailable.len(),
                    "Resolved link"
                );
                resolution.items.extend(resolved.items);
                resolution
                    .errors
                    .extend(resolved.unavailable.into_iter().map(|e| (url.clone(), e)));
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to resolve link");
                resolution.errors.push((url.clone(), e));
            }
        }
    }
    resolution
}
