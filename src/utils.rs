//! Utility functions for file naming and path manipulation

/// Longest file name common filesystems accept, in bytes
const MAX_NAME_BYTES: usize = 255;

/// Suffix of a file still being downloaded
pub(crate) const PART_SUFFIX: &str = ".part";

/// Replace characters that are illegal on common filesystems
///
/// Each offending ASCII character is swapped for its full-width Unicode
/// counterpart, so `AC/DC` stays readable as `AC／DC`. Control characters
/// are dropped, and trailing dots and spaces are trimmed (Windows rejects
/// them). An empty result becomes `_`. The result is capped so that it
/// still fits a filesystem name once `.part` is appended; the cut
/// falls on a character boundary.
///
/// # Examples
///
/// ```
/// use qmdown::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC: Live?"), "AC／DC： Live？");
/// assert_eq!(sanitize_filename("..."), "_");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    sanitize_within(name, MAX_NAME_BYTES - PART_SUFFIX.len())
}

fn sanitize_within(name: &str, max_bytes: usize) -> String {
    let mapped: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' => '／',
            '\\' => '＼',
            ':' => '：',
            '*' => '＊',
            '?' => '？',
            '"' => '＂',
            '<' => '＜',
            '>' => '＞',
            '|' => '｜',
            other => other,
        })
        .collect();

    let mut out = mapped.trim_start().to_string();
    if out.len() > max_bytes {
        let mut cut = max_bytes;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    // Trimmed after the cut, which can expose a new trailing dot or space
    let out = out.trim_end_matches(['.', ' ']);

    if out.is_empty() {
        return "_".to_string();
    }
    out.to_string()
}

/// `{stem}.{ext}` with the stem sanitized and shortened so the whole name,
/// plus `.part`, stays within the filesystem name limit
#[must_use]
pub fn file_name(stem: &str, ext: &str) -> String {
    let budget = MAX_NAME_BYTES.saturating_sub(ext.len() + 1 + PART_SUFFIX.len());
    format!("{}.{ext}", sanitize_within(stem, budget))
}

/// Display name of a track: `"{title} - {artist1}&{artist2}"`
///
/// The artist part is omitted when there are no artists.
#[must_use]
pub fn track_name(title: &str, artists: &[String]) -> String {
    if artists.is_empty() {
        title.to_string()
    } else {
        format!("{} - {}", title, artists.join("&"))
    }
}

/// File name of a track: the sanitized [`track_name`] plus `.{ext}`, see [`file_name`]
///
/// # Examples
///
/// ```
/// use qmdown::utils::track_file_name;
///
/// let artists = vec!["Jay Chou".to_string(), "Lara".to_string()];
/// assert_eq!(track_file_name("Sunny Day", &artists, "flac"), "Sunny Day - Jay Chou&Lara.flac");
/// ```
#[must_use]
pub fn track_file_name(title: &str, artists: &[String], ext: &str) -> String {
    file_name(&track_name(title, artists), ext)
}

/// Derive a display name and extension from the last segment of a URL path
///
/// Percent-encoding is decoded. Returns `None` when the URL has no usable
/// final segment.
pub fn name_from_url(url: &str) -> Option<(String, Option<String>)> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| last.to_string());

    // Split by hand: a decoded `%2F` must not be read as a directory separator
    let (stem, ext) = match decoded.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem.to_string(), Some(ext.to_ascii_lowercase()))
        }
        _ => (decoded.clone(), None),
    };
    Some((stem, ext))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_every_reserved_character() {
        assert_eq!(sanitize_filename(r#"a/b\c:d*e?f"g<h>i|j"#), "a／b＼c：d＊e？f＂g＜h＞i｜j");
    }

    #[test]
    fn sanitize_drops_control_characters_and_trailing_dots() {
        assert_eq!(sanitize_filename("line\nbreak\t. "), "linebreak");
        assert_eq!(sanitize_filename("  leading"), "leading");
        assert_eq!(sanitize_filename(""), "_");
    }

    #[test]
    fn sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("晴天 - 周杰伦"), "晴天 - 周杰伦");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(
            sanitize_filename(&long).len(),
            MAX_NAME_BYTES - PART_SUFFIX.len()
        );
    }

    #[test]
    fn long_cjk_title_fits_in_a_file_name() {
        let title = "晴天".repeat(60);
        let artists = vec!["周杰伦".to_string(), "林俊杰".to_string()];

        let name = track_file_name(&title, &artists, "flac");
        assert!(name.len() + PART_SUFFIX.len() <= MAX_NAME_BYTES, "{} bytes", name.len());
        assert!(name.starts_with("晴天晴天"));
        assert!(name.ends_with(".flac"));
        // 3-byte characters: the stem budget of 245 bytes holds 81 of them
        assert_eq!(name.trim_end_matches(".flac").chars().count(), 81);

        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join(format!("{name}{PART_SUFFIX}"))).unwrap();
        std::fs::rename(
            dir.path().join(format!("{name}{PART_SUFFIX}")),
            dir.path().join(&name),
        )
        .unwrap();
    }

    #[test]
    fn cut_never_leaves_a_trailing_dot() {
        // Stem budget for "mp3" is 255 - 4 - 5 = 246 bytes
        let stem = format!("{}. tail", "a".repeat(245));
        assert_eq!(file_name(&stem, "mp3"), format!("{}.mp3", "a".repeat(245)));
    }

    #[test]
    fn track_names_join_artists() {
        assert_eq!(track_name("Intro", &[]), "Intro");
        assert_eq!(
            track_file_name("What? / Why", &["A".to_string()], "mp3"),
            "What？ ／ Why - A.mp3"
        );
    }

    #[test]
    fn name_from_url_decodes_last_segment() {
        assert_eq!(
            name_from_url("https://cdn.example.com/music/My%20Song.FLAC?vkey=1"),
            Some(("My Song".to_string(), Some("flac".to_string())))
        );
        assert_eq!(
            name_from_url("https://cdn.example.com/stream"),
            Some(("stream".to_string(), None))
        );
        assert_eq!(name_from_url("https://cdn.example.com/"), None);
        assert_eq!(name_from_url("nonsense"), None);
    }
}
