//! Platform page links.

use crate::error::ResolutionError;
use crate::link::LinkKind;
use crate::types::DownloadableItem;

use super::Resolver;

/// Recognises platform links so they fail with a clear error
///
/// Turning a song, album or playlist page into media URLs needs the
/// platform's private API. Without an API-backed resolver in front of it in
/// the chain, every recognised link resolves to
/// [`ResolutionError::Unsupported`] instead of falling through to the
/// direct-link resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlatformResolver;

#[async_trait::async_trait]
impl Resolver for PlatformResolver {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn accepts(&self, url: &str) -> bool {
        matches!(LinkKind::parse(url), Ok(Some(_)))
    }

    async fn resolve(&self, url: &str) -> Result<Vec<DownloadableItem>, ResolutionError> {
        match LinkKind::parse(url)? {
            Some(kind) => {
                tracing::warn!(
                    url = url,
                    kind = kind.label(),
                    "Platform links need an API resolver"
                );
                Err(ResolutionError::Unsupported {
                    url: url.to_string(),
                })
            }
            None => Err(ResolutionError::Unsupported {
                url: url.to_string(),
            }),
        }
    }
}
