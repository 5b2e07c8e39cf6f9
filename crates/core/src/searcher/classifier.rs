//! Release-title classification.
//!
//! Each field is driven by an ordered table of `(pattern, label)` rules.
//! Tables are listed most specific / highest tier first and the first
//! matching rule wins, so a title carrying both "1080p" and "720p" is
//! classified as 1080p. Classification is a pure function of the title.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{
    info_hash_from_magnet, Codec, NormalizedResult, Quality, Resolution, Source, TorrentCandidate,
};

/// Language reported when no language rule matches.
pub const DEFAULT_LANGUAGE: &str = "English";

const QUALITY_RULES: &[(&str, Quality)] = &[
    (r"\b(8k|4320p)\b", Quality::Uhd8k),
    (r"\b(2160p|4k|uhd|3840x2160)\b", Quality::Uhd4k),
    (r"(1080[pi]|1920x1080)", Quality::P1080),
    (r"(720p|1280x720)", Quality::P720),
    (r"576[pi]", Quality::P576),
    (r"(480p|\bdvd(rip|scr|r)?\b)", Quality::P480),
    (r"360p", Quality::P360),
];

const RESOLUTION_RULES: &[(&str, Resolution)] = &[
    (r"\b(8k|4320p)\b", Resolution::EightK),
    (r"\b(2160p|4k|uhd)\b", Resolution::Uhd),
    (r"1080[pi]", Resolution::Fhd),
    (r"720p", Resolution::Hd),
    (r"(576[pi]|480p|360p|\bdvd)", Resolution::Sd),
];

const CODEC_RULES: &[(&str, Codec)] = &[
    (r"(x\.?265|h\.?265|\bhevc\b)", Codec::H265),
    (r"(x\.?264|h\.?264|\bavc\b)", Codec::H264),
    (r"\bav1\b", Codec::Av1),
    (r"\bvp9\b", Codec::Vp9),
];

const SOURCE_RULES: &[(&str, Source)] = &[
    (r"(blu-?ray|\bbd-?rip\b|\bbr-?rip\b|\bbd-?remux\b|\bremux\b)", Source::BluRay),
    (r"(web[ .-]?dl|\bweb[ .-]?rip\b|\bweb\b)", Source::WebDl),
    (r"\bhdtv\b", Source::Hdtv),
    (r"\bdvd(rip|scr|r|5|9)?\b", Source::Dvd),
    (r"\b(cam|camrip|hdcam|ts|hdts|telesync)\b", Source::Cam),
];

const LANGUAGE_RULES: &[(&str, &str)] = &[
    (r"\b(french|truefrench|vostfr|vff)\b", "French"),
    (r"\b(spanish|espanol|castellano|latino)\b", "Spanish"),
    (r"\b(german|deutsch)\b", "German"),
    (r"\b(japanese|jpn)\b", "Japanese"),
];

const REPACK_RULES: &[(&str, bool)] = &[(r"\b(repack|proper)\b", true)];

static QUALITY_TABLE: Lazy<RuleTable<Quality>> =
    Lazy::new(|| RuleTable::new(QUALITY_RULES).expect("quality rules must compile"));
static RESOLUTION_TABLE: Lazy<RuleTable<Resolution>> =
    Lazy::new(|| RuleTable::new(RESOLUTION_RULES).expect("resolution rules must compile"));
static CODEC_TABLE: Lazy<RuleTable<Codec>> =
    Lazy::new(|| RuleTable::new(CODEC_RULES).expect("codec rules must compile"));
static SOURCE_TABLE: Lazy<RuleTable<Source>> =
    Lazy::new(|| RuleTable::new(SOURCE_RULES).expect("source rules must compile"));
static LANGUAGE_TABLE: Lazy<RuleTable<&'static str>> =
    Lazy::new(|| RuleTable::new(LANGUAGE_RULES).expect("language rules must compile"));
static REPACK_TABLE: Lazy<RuleTable<bool>> =
    Lazy::new(|| RuleTable::new(REPACK_RULES).expect("repack rules must compile"));

/// An ordered list of case-insensitive patterns mapped to labels.
#[derive(Debug)]
pub struct RuleTable<T> {
    rules: Vec<(Regex, T)>,
}

impl<T: Copy> RuleTable<T> {
    /// Compile a rule table. Rule order is preserved.
    pub fn new(rules: &[(&str, T)]) -> Result<Self, regex_lite::Error> {
        let rules = rules
            .iter()
            .map(|(pattern, label)| Ok((Regex::new(&format!("(?i){}", pattern))?, *label)))
            .collect::<Result<Vec<_>, regex_lite::Error>>()?;
        Ok(Self { rules })
    }

    /// Label of the first rule matching `text`.
    pub fn first_match(&self, text: &str) -> Option<T> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, label)| *label)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Tags derived from a release title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub quality: Quality,
    pub resolution: Option<Resolution>,
    pub codec: Codec,
    pub source: Source,
    pub language: &'static str,
    pub is_repack: bool,
}

/// Classify a release title.
pub fn classify(title: &str) -> Classification {
    // '_' is a word character, so it would hide tokens from `\b`.
    let title = title.replace('_', " ");

    Classification {
        quality: QUALITY_TABLE.first_match(&title).unwrap_or(Quality::Unknown),
        resolution: RESOLUTION_TABLE.first_match(&title),
        codec: CODEC_TABLE.first_match(&title).unwrap_or(Codec::Unknown),
        source: SOURCE_TABLE.first_match(&title).unwrap_or(Source::Unknown),
        language: LANGUAGE_TABLE
            .first_match(&title)
            .unwrap_or(DEFAULT_LANGUAGE),
        is_repack: REPACK_TABLE.first_match(&title).unwrap_or(false),
    }
}

/// Attach classification tags and the info hash to a raw candidate.
pub fn normalize(candidate: TorrentCandidate) -> NormalizedResult {
    let tags = classify(&candidate.title);
    let info_hash = info_hash_from_magnet(&candidate.magnet_uri);

    NormalizedResult {
        candidate,
        info_hash,
        quality: tags.quality,
        resolution: tags.resolution,
        codec: tags.codec,
        source: tags.source,
        language: tags.language.to_string(),
        is_repack: tags.is_repack,
    }
}
