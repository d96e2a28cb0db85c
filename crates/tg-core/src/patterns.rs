//! Glob-style URL patterns and the request classifier.
//!
//! Patterns use `*` as "any character sequence" and are anchored at both
//! ends; literal parts match case-sensitively. Each pattern is compiled once
//! at table construction into its literal segments, so the per-request scan
//! does no parsing.

/// Default pattern table: the hand-maintained list of advertising traffic
/// for the target site (ad servers, video-ad playback URLs, tracking
/// endpoints, third-party networks).
pub const DEFAULT_AD_PATTERNS: &[&str] = &[
    // Primary ad servers
    "*://*.doubleclick.net/*",
    "*://*.googleadservices.com/*",
    "*://*.googlesyndication.com/*",
    "*://*.googletagmanager.com/*",
    "*://*.googletagservices.com/*",
    "*://*.google-analytics.com/*",
    "*://*.googleads.g.doubleclick.net/*",
    "*://*.googletraveladservices.com/*",
    "*://*.google.com/ads/*",
    "*://*.google.com/adsense/*",
    "*://*.google.com/dfp/*",
    "*://*.google.com/adx/*",
    // Video ad playback
    "*://*.googlevideo.com/videoplayback*adformat*",
    "*://*.googlevideo.com/videoplayback*ctier*",
    "*://*.googlevideo.com/videoplayback*ad*",
    "*://*.youtube.com/api/stats/ads*",
    "*://*.youtube.com/get_video_info*adformat*",
    "*://*.youtube.com/get_video_info*ad_tag*",
    "*://*.youtube.com/watch?ad_type=*",
    // Ad tracking
    "*://*.youtube.com/pagead/*",
    "*://*.youtube.com/youtubei/v1/player*adformat*",
    "*://*.youtube.com/youtubei/v1/player*ad_tag*",
    "*://*.youtube.com/youtubei/v1/player*ad_modules*",
    "*://*.youtube.com/youtubei/v1/next*adformat*",
    // Third-party ad networks
    "*://*.amazon-adsystem.com/*",
    "*://*.facebook.com/tr*",
    "*://*.connect.facebook.net/*",
    "*://*.adsystem.google.com/*",
    "*://*.adnxs.com/*",
    "*://*.ads.yahoo.com/*",
    "*://*.advertising.com/*",
    "*://*.adsymptotic.com/*",
    "*://*.criteo.com/*",
    "*://*.taboola.com/*",
    "*://*.outbrain.com/*",
];

// =============================================================================
// AdPattern
// =============================================================================

/// A compiled glob-style URL pattern.
///
/// Compilation splits the source into the literal segments between `*`
/// wildcards and records whether the pattern is anchored at either end
/// (i.e. does not start/end with `*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdPattern {
    source: String,
    segments: Vec<String>,
    anchored_start: bool,
    anchored_end: bool,
}

impl AdPattern {
    /// Compile a pattern from its string form.
    ///
    /// Returns `None` for an empty source. A malformed pattern is a
    /// configuration defect, not a runtime failure; callers drop it with a
    /// diagnostic and the table simply never matches it.
    pub fn compile(source: &str) -> Option<Self> {
        let source = source.trim();
        if source.is_empty() {
            return None;
        }

        let segments: Vec<String> = source
            .split('*')
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect();

        if segments.is_empty() && !source.contains('*') {
            return None;
        }

        Some(Self {
            source: source.to_string(),
            segments,
            anchored_start: !source.starts_with('*'),
            anchored_end: !source.ends_with('*'),
        })
    }

    /// The original pattern string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a full request URL against this pattern.
    pub fn matches(&self, url: &str) -> bool {
        if self.segments.is_empty() {
            // Pure-wildcard pattern ("*", "**", ...) matches everything.
            return true;
        }

        let mut pos = 0usize;
        let last = self.segments.len() - 1;

        for (i, segment) in self.segments.iter().enumerate() {
            if i == 0 && self.anchored_start {
                if !url.starts_with(segment.as_str()) {
                    return false;
                }
                pos = segment.len();
                continue;
            }

            if i == last && self.anchored_end {
                // The final segment must close the URL, without overlapping
                // the part already consumed.
                if !url.ends_with(segment.as_str()) {
                    return false;
                }
                if url.len() - segment.len() < pos {
                    return false;
                }
                pos = url.len();
                continue;
            }

            match url[pos..].find(segment.as_str()) {
                Some(offset) => pos += offset + segment.len(),
                None => return false,
            }
        }

        if self.anchored_end {
            pos == url.len()
        } else {
            true
        }
    }
}

// =============================================================================
// PatternTable
// =============================================================================

/// The immutable set of ad patterns, scanned in insertion order.
///
/// Duplicates are harmless; the scan short-circuits on the first match.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    patterns: Vec<AdPattern>,
}

impl PatternTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from pattern sources, skipping entries that do not
    /// compile.
    pub fn from_sources<S: AsRef<str>>(sources: &[S]) -> Self {
        let mut table = Self::new();
        for source in sources {
            table.add(source.as_ref());
        }
        table
    }

    /// The default table for the target site.
    pub fn defaults() -> Self {
        Self::from_sources(DEFAULT_AD_PATTERNS)
    }

    /// Add a single pattern source.
    pub fn add(&mut self, source: &str) {
        match AdPattern::compile(source) {
            Some(pattern) => self.patterns.push(pattern),
            None => log::warn!("dropping malformed ad pattern: {:?}", source),
        }
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if the table holds no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Classify a request URL: the first matching pattern, if any.
    pub fn classify(&self, url: &str) -> Option<&AdPattern> {
        self.patterns.iter().find(|pattern| pattern.matches(url))
    }

    /// True when the URL matches any pattern in the table.
    pub fn is_ad(&self, url: &str) -> bool {
        self.classify(url).is_some()
    }
}
