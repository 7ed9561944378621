//! Plain links to audio files.

use std::path::{Path, PathBuf};

use crate::error::ResolutionError;
use crate::quality::Quality;
use crate::types::{DownloadableItem, Locator};
use crate::utils::{file_name, name_from_url};

use super::Resolver;

/// Resolves an `http(s)` URL whose last path segment is an audio file
///
/// The item is named after the file stem and saved under the output
/// directory with the same extension. The quality tag is guessed from the
/// extension.
#[derive(Clone, Debug)]
pub struct DirectResolver {
    output_dir: PathBuf,
}

impl DirectResolver {
    /// Resolver saving into `output_dir`
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    fn audio_file(url: &str) -> Option<(String, String, Quality)> {
        let parsed = url::Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let (stem, ext) = name_from_url(url)?;
        let ext = ext?;
        let quality = Quality::from_extension(&ext)?;
        Some((stem, ext, quality))
    }
}

#[async_trait::async_trait]
impl Resolver for DirectResolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn accepts(&self, url: &str) -> bool {
        Self::audio_file(url).is_some()
    }

    async fn resolve(&self, url: &str) -> Result<Vec<DownloadableItem>, ResolutionError> {
        let Some((stem, ext, quality)) = Self::audio_file(url) else {
            return Err(ResolutionError::Unsupported {
                url: url.to_string(),
            });
        };
        let destination = self.output_dir.join(file_name(&stem, &ext));
        let item = DownloadableItem::new(stem, Locator::new(url), destination).with_quality(quality);
        Ok(vec![item])
    }
}
