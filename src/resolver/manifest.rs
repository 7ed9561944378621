//! Local JSON manifests listing tracks with one source per quality tier.
//!
//! ```json
//! {
//!   "tracks": [
//!     {
//!       "title": "Sunny Day",
//!       "artists": ["Jay Chou"],
//!       "sources": {
//!         "flac": { "url": "https://cdn.example.com/a.flac", "size": 31457280 },
//!         "mp3-320": { "url": "https://cdn.example.com/a.mp3", "headers": { "Cookie": "uin=1" } }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Source keys are quality names as accepted by `--quality`. For each track
//! the best source at or below the requested tier is downloaded.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ResolutionError;
use crate::quality::Quality;
use crate::types::{DownloadableItem, Locator};
use crate::utils::{track_file_name, track_name};

use super::{Resolved, Resolver};

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    tracks: Vec<ManifestTrack>,
}

#[derive(Debug, Deserialize)]
struct ManifestTrack {
    title: String,
    #[serde(default)]
    artists: Vec<String>,
    sources: HashMap<String, ManifestSource>,
}

#[derive(Debug, Deserialize)]
struct ManifestSource {
    url: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

/// Resolves a manifest file (plain path or `file://` URL ending in `.json`)
#[derive(Clone, Debug)]
pub struct ManifestResolver {
    output_dir: PathBuf,
    quality: Quality,
}

impl ManifestResolver {
    /// Resolver saving into `output_dir`, preferring `quality`
    pub fn new(output_dir: impl AsRef<Path>, quality: Quality) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            quality,
        }
    }

    fn manifest_path(url: &str) -> Option<PathBuf> {
        let path = if url.starts_with("file://") {
            url::Url::parse(url).ok()?.to_file_path().ok()?
        } else if url.contains("://") {
            return None;
        } else {
            PathBuf::from(url)
        };
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        is_json.then_some(path)
    }

    fn track_item(
        &self,
        path: &Path,
        track: ManifestTrack,
    ) -> Result<Option<DownloadableItem>, ResolutionError> {
        let mut offered = HashMap::with_capacity(track.sources.len());
        for (key, source) in track.sources {
            let quality = key
                .parse::<Quality>()
                .map_err(|_| ResolutionError::InvalidManifest {
                    path: path.to_path_buf(),
                    reason: format!("unknown quality '{key}' for {}", track.title),
                })?;
            offered.insert(quality, source);
        }

        let Some((quality, source)) = self.quality.select(|q| offered.remove(&q)) else {
            return Ok(None);
        };

        let name = track_name(&track.title, &track.artists);
        let destination = self.output_dir.join(track_file_name(
            &track.title,
            &track.artists,
            quality.extension(),
        ));
        let mut locator = Locator::new(source.url);
        locator.headers = source.headers;

        let mut item = DownloadableItem::new(name, locator, destination).with_quality(quality);
        item.expected_size = source.size;
        Ok(Some(item))
    }
}

#[async_trait::async_trait]
impl Resolver for ManifestResolver {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn accepts(&self, url: &str) -> bool {
        Self::manifest_path(url).is_some()
    }

    async fn resolve(&self, url: &str) -> Result<Vec<DownloadableItem>, ResolutionError> {
        Ok(self.resolve_detailed(url).await?.items)
    }

    async fn resolve_detailed(&self, url: &str) -> Result<Resolved, ResolutionError> {
        let Some(path) = Self::manifest_path(url) else {
            return Err(ResolutionError::Unsupported {
                url: url.to_string(),
            });
        };

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResolutionError::NotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(ResolutionError::InvalidManifest {
                    path,
                    reason: e.to_string(),
                });
            }
        };
        let manifest: Manifest =
            serde_json::from_str(&raw).map_err(|e| ResolutionError::InvalidManifest {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if manifest.tracks.is_empty() {
            return Err(ResolutionError::NotFound(format!(
                "{}: manifest lists no tracks",
                path.display()
            )));
        }

        let mut resolved = Resolved::default();
        for track in manifest.tracks {
            let name = track_name(&track.title, &track.artists);
            match self.track_item(&path, track)? {
                Some(item) => {
                    tracing::debug!(
                        name = %item.name,
                        quality = %item.quality.unwrap_or(self.quality),
                        "Selected source"
                    );
                    resolved.items.push(item);
                }
                None => {
                    tracing::warn!(
                        name = %name,
                        requested = %self.quality,
                        "No source at or below requested quality"
                    );
                    resolved.unavailable.push(ResolutionError::NoQualityAvailable {
                        track: name,
                        requested: self.quality,
                    });
                }
            }
        }

        // A manifest with nothing downloadable fails as a whole
        if resolved.items.is_empty() && !resolved.unavailable.is_empty() {
            return Err(resolved.unavailable.swap_remove(0));
        }
        Ok(resolved)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "tracks": [
            {
                "title": "Sunny Day",
                "artists": ["Jay Chou"],
                "sources": {
                    "flac": { "url": "https://cdn.example.com/1.flac", "size": 3000 },
                    "mp3-320": { "url": "https://cdn.example.com/1.mp3", "size": 1000 },
                    "mp3-128": { "url": "https://cdn.example.com/1-128.mp3" }
                }
            },
            {
                "title": "Who/What?",
                "artists": ["A", "B"],
                "sources": {
                    "aac-96": {
                        "url": "https://cdn.example.com/2.m4a",
                        "headers": { "Cookie": "uin=1" }
                    }
                }
            },
            {
                "title": "Hi-Res Only",
                "sources": { "master": { "url": "https://cdn.example.com/3.flac" } }
            }
        ]
    }"#;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn accepts_json_paths_and_file_urls() {
        let resolver = ManifestResolver::new("/music", Quality::Flac);
        assert!(resolver.accepts("album.json"));
        assert!(resolver.accepts("/tmp/Album.JSON"));
        assert!(resolver.accepts("file:///tmp/album.json"));
        assert!(!resolver.accepts("https://cdn.example.com/album.json"));
        assert!(!resolver.accepts("/tmp/album.txt"));
    }

    #[tokio::test]
    async fn picks_best_source_at_or_below_requested_quality() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "album.json", MANIFEST);
        let resolver = ManifestResolver::new("/music", Quality::Mp3_320);

        let items = resolver.resolve(path.to_str().unwrap()).await.unwrap();

        // The master-only track has nothing at or below mp3-320
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].name, "Sunny Day - Jay Chou");
        assert_eq!(items[0].quality, Some(Quality::Mp3_320));
        assert_eq!(items[0].locator.url, "https://cdn.example.com/1.mp3");
        assert_eq!(items[0].expected_size, Some(1000));
        assert_eq!(
            items[0].destination,
            Path::new("/music/Sunny Day - Jay Chou.mp3")
        );

        assert_eq!(items[1].quality, Some(Quality::Aac96));
        assert_eq!(items[1].locator.headers["Cookie"], "uin=1");
        assert_eq!(items[1].destination, Path::new("/music/Who／What？ - A&B.m4a"));
    }

    #[tokio::test]
    async fn tracks_without_a_usable_source_are_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "album.json", MANIFEST);
        let resolver = ManifestResolver::new("/music", Quality::Mp3_320);

        let resolved = resolver.resolve_detailed(path.to_str().unwrap()).await.unwrap();

        assert_eq!(resolved.items.len(), 2);
        assert_eq!(resolved.unavailable.len(), 1);
        match &resolved.unavailable[0] {
            ResolutionError::NoQualityAvailable { track, requested } => {
                assert_eq!(track, "Hi-Res Only");
                assert_eq!(*requested, Quality::Mp3_320);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_url_is_resolved() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "album.json", MANIFEST);
        let url = url::Url::from_file_path(&path).unwrap().to_string();
        let resolver = ManifestResolver::new("/music", Quality::Master);

        let items = resolver.resolve(&url).await.unwrap();
        let qualities: Vec<_> = items.iter().map(|i| i.quality.unwrap()).collect();
        assert_eq!(qualities, vec![Quality::Flac, Quality::Aac96, Quality::Master]);
    }

    #[tokio::test]
    async fn nothing_available_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "hires.json",
            r#"{"tracks": [{"title": "T", "artists": ["X"], "sources": {"flac": {"url": "https://a/b.flac"}}}]}"#,
        );
        let err = ManifestResolver::new("/music", Quality::Aac48)
            .resolve(path.to_str().unwrap())
            .await
            .unwrap_err();
        match err {
            ResolutionError::NoQualityAvailable { track, requested } => {
                assert_eq!(track, "T - X");
                assert_eq!(requested, Quality::Aac48);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_empty_and_malformed_manifests() {
        let dir = TempDir::new().unwrap();
        let resolver = ManifestResolver::new("/music", Quality::Flac);

        let missing = dir.path().join("missing.json");
        let err = resolver.resolve(missing.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));

        let empty = write(&dir, "empty.json", r#"{"tracks": []}"#);
        let err = resolver.resolve(empty.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));

        let broken = write(&dir, "broken.json", "{ not json");
        let err = resolver.resolve(broken.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidManifest { .. }));

        let unknown = write(
            &dir,
            "unknown.json",
            r#"{"tracks": [{"title": "T", "sources": {"wav": {"url": "https://a/b.wav"}}}]}"#,
        );
        let err = resolver.resolve(unknown.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("unknown quality 'wav'"), "got: {err}");
    }
}
