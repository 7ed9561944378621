//! Classification of platform links
//!
//! Recognises the page URLs the web and mobile clients share (song, album,
//! playlist and toplist pages) plus short share links, and extracts the id
//! the platform API expects. Resolving them is left to an API-backed
//! [`Resolver`](crate::resolver::Resolver).

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::ResolutionError;

/// What a platform link points at
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// A single song, by song mid
    Song {
        /// Song mid
        mid: String,
    },
    /// An album, by album mid
    Album {
        /// Album mid
        mid: String,
    },
    /// A user playlist, by numeric id
    Playlist {
        /// Playlist id
        id: u64,
    },
    /// A chart, by numeric id
    Toplist {
        /// Toplist id
        id: u64,
    },
    /// A short share link that must be followed before it can be classified
    Short {
        /// The link as given
        url: String,
    },
}

struct PathPattern {
    regex: Regex,
    build: fn(&str) -> Option<LinkKind>,
}

fn path_patterns() -> &'static [PathPattern] {
    static PATTERNS: OnceLock<Vec<PathPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: [(&str, fn(&str) -> Option<LinkKind>); 4] = [
            (r"^/n/ryqq/songDetail/([0-9A-Za-z]+)/?$", |m| {
                Some(LinkKind::Song { mid: m.to_string() })
            }),
            (r"^/n/ryqq/albumDetail/([0-9A-Za-z]+)/?$", |m| {
                Some(LinkKind::Album { mid: m.to_string() })
            }),
            (r"^/n/ryqq/playlist/([0-9]+)/?$", |m| {
                m.parse().ok().map(|id| LinkKind::Playlist { id })
            }),
            (r"^/n/ryqq/toplist/([0-9]+)/?$", |m| {
                m.parse().ok().map(|id| LinkKind::Toplist { id })
            }),
        ];
        table
            .into_iter()
            .filter_map(|(pattern, build)| match Regex::new(pattern) {
                Ok(regex) => Some(PathPattern { regex, build }),
                Err(e) => {
                    tracing::error!(pattern = pattern, error = %e, "Invalid link pattern");
                    None
                }
            })
            .collect()
    })
}

const SHORT_LINK_HOSTS: &[&str] = &["c.y.qq.com", "c6.y.qq.com", "url.cn"];

impl LinkKind {
    /// Classify `input`
    ///
    /// Returns `Ok(None)` for well-formed URLs that are not platform links,
    /// so other resolvers can try them.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::InvalidUrl`] if `input` is not a URL at all.
    pub fn parse(input: &str) -> Result<Option<LinkKind>, ResolutionError> {
        let url = Url::parse(input.trim()).map_err(|e| ResolutionError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;
        let Some(host) = url.host_str() else {
            return Ok(None);
        };

        if SHORT_LINK_HOSTS.contains(&host) {
            return Ok(Some(LinkKind::Short {
                url: input.trim().to_string(),
            }));
        }
        if host != "y.qq.com" && host != "i.y.qq.com" {
            return Ok(None);
        }

        for pattern in path_patterns() {
            if let Some(caps) = pattern.regex.captures(url.path())
                && let Some(m) = caps.get(1)
            {
                return Ok((pattern.build)(m.as_str()));
            }
        }

        // Mobile pages carry the id in the query string
        let query = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };
        let kind = match url.path() {
            "/v8/playsong.html" => query("songmid").map(|mid| LinkKind::Song { mid }),
            "/n2/m/share/details/album.html" => query("albummid").map(|mid| LinkKind::Album { mid }),
            "/n2/m/share/details/taoge.html" => query("id")
                .and_then(|id| id.parse().ok())
                .map(|id| LinkKind::Playlist { id }),
            "/n2/m/share/details/toplist.html" => query("id")
                .and_then(|id| id.parse().ok())
                .map(|id| LinkKind::Toplist { id }),
            _ => None,
        };
        Ok(kind)
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            LinkKind::Song { .. } => "song",
            LinkKind::Album { .. } => "album",
            LinkKind::Playlist { .. } => "playlist",
            LinkKind::Toplist { .. } => "toplist",
            LinkKind::Short { .. } => "short link",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Option<LinkKind> {
        LinkKind::parse(url).unwrap()
    }

    #[test]
    fn desktop_pages() {
        assert_eq!(
            parse("https://y.qq.com/n/ryqq/songDetail/0039MnYb0qxYhV"),
            Some(LinkKind::Song {
                mid: "0039MnYb0qxYhV".into()
            })
        );
        assert_eq!(
            parse("https://y.qq.com/n/ryqq/albumDetail/002fRO0N4FftzY/"),
            Some(LinkKind::Album {
                mid: "002fRO0N4FftzY".into()
            })
        );
        assert_eq!(
            parse("https://y.qq.com/n/ryqq/playlist/7256912512"),
            Some(LinkKind::Playlist { id: 7256912512 })
        );
        assert_eq!(
            parse("https://y.qq.com/n/ryqq/toplist/26"),
            Some(LinkKind::Toplist { id: 26 })
        );
    }

    #[test]
    fn mobile_pages_use_query_ids() {
        assert_eq!(
            parse("https://i.y.qq.com/v8/playsong.html?ADTAG=share&songmid=0039MnYb0qxYhV"),
            Some(LinkKind::Song {
                mid: "0039MnYb0qxYhV".into()
            })
        );
        assert_eq!(
            parse("https://i.y.qq.com/n2/m/share/details/taoge.html?id=7256912512"),
            Some(LinkKind::Playlist { id: 7256912512 })
        );
        assert_eq!(
            parse("https://i.y.qq.com/n2/m/share/details/toplist.html?id=4"),
            Some(LinkKind::Toplist { id: 4 })
        );
        assert_eq!(parse("https://i.y.qq.com/v8/playsong.html?songmid="), None);
    }

    #[test]
    fn short_links_are_kept_verbatim() {
        let kind = parse("https://c6.y.qq.com/base/fcgi-bin/u?__=abc123").unwrap();
        assert_eq!(kind.label(), "short link");
        assert!(matches!(kind, LinkKind::Short { url } if url.ends_with("__=abc123")));
    }

    #[test]
    fn other_sites_are_not_platform_links() {
        assert_eq!(parse("https://cdn.example.com/a.mp3"), None);
        assert_eq!(parse("https://y.qq.com/n/ryqq/singer/0025NhlN2yWrP4"), None);
        assert_eq!(parse("https://y.qq.com/n/ryqq/playlist/not-a-number"), None);
    }

    #[test]
    fn garbage_is_an_invalid_url() {
        let err = LinkKind::parse("not a url").unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidUrl { .. }));
    }
}
