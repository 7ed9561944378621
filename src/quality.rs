//! Audio quality tiers and the fallback policy between them
//!
//! The platform offers each track in a subset of fixed tiers. A user asks for
//! a maximum tier; resolvers walk [`Quality::fallback_chain`] and take the first
//! tier the track is actually offered in.

use serde::{Deserialize, Serialize};

/// Supported audio quality tiers, best first
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    /// Studio master (lossless, hi-res)
    #[value(name = "master")]
    Master,
    /// Dolby Atmos 5.1
    #[serde(rename = "atmos-51")]
    #[value(name = "atmos-51")]
    Atmos51,
    /// Dolby Atmos stereo
    #[serde(rename = "atmos-2")]
    #[value(name = "atmos-2")]
    Atmos2,
    /// Lossless FLAC
    #[value(name = "flac", alias = "sq")]
    Flac,
    /// Ogg Vorbis 640 kbps
    #[serde(rename = "ogg-640")]
    #[value(name = "ogg-640")]
    Ogg640,
    /// Ogg Vorbis 320 kbps
    #[serde(rename = "ogg-320")]
    #[value(name = "ogg-320")]
    Ogg320,
    /// MP3 320 kbps
    #[default]
    #[serde(rename = "mp3-320")]
    #[value(name = "mp3-320", aliases = ["320", "hq"])]
    Mp3_320,
    /// Ogg Vorbis 192 kbps
    #[serde(rename = "ogg-192")]
    #[value(name = "ogg-192")]
    Ogg192,
    /// MP3 128 kbps
    #[serde(rename = "mp3-128")]
    #[value(name = "mp3-128", aliases = ["128", "std"])]
    Mp3_128,
    /// Ogg Vorbis 96 kbps
    #[serde(rename = "ogg-96")]
    #[value(name = "ogg-96")]
    Ogg96,
    /// AAC 192 kbps
    #[serde(rename = "aac-192")]
    #[value(name = "aac-192")]
    Aac192,
    /// AAC 96 kbps
    #[serde(rename = "aac-96")]
    #[value(name = "aac-96")]
    Aac96,
    /// AAC 48 kbps
    #[serde(rename = "aac-48")]
    #[value(name = "aac-48")]
    Aac48,
}

impl Quality {
    /// Every tier, best first. This is also the fallback order.
    pub const ALL: [Quality; 13] = [
        Quality::Master,
        Quality::Atmos51,
        Quality::Atmos2,
        Quality::Flac,
        Quality::Ogg640,
        Quality::Ogg320,
        Quality::Mp3_320,
        Quality::Ogg192,
        Quality::Mp3_128,
        Quality::Ogg96,
        Quality::Aac192,
        Quality::Aac96,
        Quality::Aac48,
    ];

    /// Position in [`Quality::ALL`]; lower is better
    pub fn rank(self) -> usize {
        Self::ALL
            .iter()
            .position(|q| *q == self)
            .unwrap_or(Self::ALL.len())
    }

    /// This tier followed by every lower tier, in order
    pub fn fallback_chain(self) -> impl Iterator<Item = Quality> {
        Self::ALL.into_iter().skip(self.rank())
    }

    /// Pick the best tier not above `self` for which `available` yields a value
    pub fn select<T>(self, mut available: impl FnMut(Quality) -> Option<T>) -> Option<(Quality, T)> {
        self.fallback_chain()
            .find_map(|q| available(q).map(|value| (q, value)))
    }

    /// File extension (without dot) used for files of this tier
    pub fn extension(self) -> &'static str {
        match self {
            Quality::Master | Quality::Atmos51 | Quality::Atmos2 | Quality::Flac => "flac",
            Quality::Ogg640 | Quality::Ogg320 | Quality::Ogg192 | Quality::Ogg96 => "ogg",
            Quality::Mp3_320 | Quality::Mp3_128 => "mp3",
            Quality::Aac192 | Quality::Aac96 | Quality::Aac48 => "m4a",
        }
    }

    /// Nominal bitrate in kbps, `None` for lossless tiers
    pub fn bitrate_kbps(self) -> Option<u32> {
        match self {
            Quality::Master | Quality::Atmos51 | Quality::Atmos2 | Quality::Flac => None,
            Quality::Ogg640 => Some(640),
            Quality::Ogg320 | Quality::Mp3_320 => Some(320),
            Quality::Ogg192 | Quality::Aac192 => Some(192),
            Quality::Mp3_128 => Some(128),
            Quality::Ogg96 | Quality::Aac96 => Some(96),
            Quality::Aac48 => Some(48),
        }
    }

    /// Best-effort guess of the tier behind a file extension
    pub fn from_extension(ext: &str) -> Option<Quality> {
        match ext.to_ascii_lowercase().as_str() {
            "flac" => Some(Quality::Flac),
            "ogg" | "oga" => Some(Quality::Ogg320),
            "mp3" => Some(Quality::Mp3_320),
            "m4a" | "aac" | "mp4" => Some(Quality::Aac192),
            _ => None,
        }
    }

    /// Canonical name, as accepted on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Master => "master",
            Quality::Atmos51 => "atmos-51",
            Quality::Atmos2 => "atmos-2",
            Quality::Flac => "flac",
            Quality::Ogg640 => "ogg-640",
            Quality::Ogg320 => "ogg-320",
            Quality::Mp3_320 => "mp3-320",
            Quality::Ogg192 => "ogg-192",
            Quality::Mp3_128 => "mp3-128",
            Quality::Ogg96 => "ogg-96",
            Quality::Aac192 => "aac-192",
            Quality::Aac96 => "aac-96",
            Quality::Aac48 => "aac-48",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Quality as clap::ValueEnum>::from_str(s, true)
    }
}
