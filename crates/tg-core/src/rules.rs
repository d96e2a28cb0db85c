//! Typed element selector rules.
//!
//! The original hand-maintained CSS selector list is replaced by a typed
//! rule: `{kind, token, category}`, compiled once at startup. This keeps the
//! sweep free of runtime selector validation; the host renders each rule to
//! a query string exactly once.
//!
//! Rules come in two strengths, mirroring specific vs generic cosmetic
//! selectors: *specific* rules name a known ad container and block on match,
//! *generic* rules (substring catch-alls like `ad-`) only nominate a node
//! for the scored heuristic.

use thiserror::Error;

use crate::types::ElementFeatures;

/// Why a rule string failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("empty rule")]
    Empty,
    #[error("unknown category prefix: {0:?}")]
    UnknownCategory(String),
    #[error("unterminated attribute rule")]
    UnterminatedAttribute,
    #[error("invalid token: {0:?}")]
    InvalidToken(String),
}

// =============================================================================
// Rule types
// =============================================================================

/// What advertising surface a rule targets. Each category can be toggled
/// independently in the runtime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdCategory {
    /// In-player video ad UI.
    Video,
    /// Display/banner placements.
    Banner,
    /// Sponsored/promoted content.
    Sponsored,
}

/// How the rule token is matched against a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Tag name equals the token.
    Tag,
    /// Some class token contains the token.
    Class,
    /// Element id contains the token.
    Id,
    /// An attribute with the token as its name is present.
    Attribute,
}

/// One compiled selector rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRule {
    pub kind: RuleKind,
    pub token: String,
    pub category: AdCategory,
    /// Generic rules nominate candidates for the scored heuristic instead
    /// of blocking directly.
    pub generic: bool,
}

impl SelectorRule {
    pub fn new(kind: RuleKind, token: &str, category: AdCategory) -> Self {
        Self {
            kind,
            token: token.to_ascii_lowercase(),
            category,
            generic: false,
        }
    }

    fn generic(mut self) -> Self {
        self.generic = true;
        self
    }

    /// Parse a user rule string.
    ///
    /// Accepted forms: `.class-token`, `#id-token`, `[attribute-name]`, or a
    /// bare tag name, optionally prefixed with `video:`, `banner:` or
    /// `sponsored:` to pick the category (default banner). Invalid entries
    /// are skipped by the compiler with a diagnostic.
    pub fn parse(spec: &str) -> Result<Self, RuleParseError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(RuleParseError::Empty);
        }

        let (category, body) = match spec.split_once(':') {
            Some(("video", rest)) => (AdCategory::Video, rest),
            Some(("banner", rest)) => (AdCategory::Banner, rest),
            Some(("sponsored", rest)) => (AdCategory::Sponsored, rest),
            Some((prefix, _)) => {
                return Err(RuleParseError::UnknownCategory(prefix.to_string()))
            }
            None => (AdCategory::Banner, spec),
        };

        let body = body.trim();
        let (kind, token) = if let Some(rest) = body.strip_prefix('.') {
            (RuleKind::Class, rest)
        } else if let Some(rest) = body.strip_prefix('#') {
            (RuleKind::Id, rest)
        } else if let Some(rest) = body.strip_prefix('[') {
            match rest.strip_suffix(']') {
                Some(name) => (RuleKind::Attribute, name),
                None => return Err(RuleParseError::UnterminatedAttribute),
            }
        } else {
            (RuleKind::Tag, body)
        };

        if token.is_empty() || !is_valid_token(token) {
            return Err(RuleParseError::InvalidToken(token.to_string()));
        }

        Ok(Self::new(kind, token, category))
    }

    /// Match the rule against an extracted feature record.
    ///
    /// Attribute rules match through `matched_attributes`, which is enough
    /// in practice: every attribute rule token carries "ad", so the
    /// extractor's ad/sponsor filter retains the pair.
    pub fn matches(&self, features: &ElementFeatures) -> bool {
        match self.kind {
            RuleKind::Tag => features.tag_name == self.token,
            RuleKind::Class => features.class_contains(&self.token),
            RuleKind::Id => features.id.contains(&self.token),
            RuleKind::Attribute => features
                .matched_attributes
                .iter()
                .any(|(name, _)| name == &self.token),
        }
    }

    /// Render the rule as a host query selector.
    pub fn css(&self) -> String {
        match self.kind {
            RuleKind::Tag => self.token.clone(),
            RuleKind::Class => format!("[class*=\"{}\"]", self.token),
            RuleKind::Id => format!("[id*=\"{}\"]", self.token),
            RuleKind::Attribute => format!("[{}]", self.token),
        }
    }
}

fn is_valid_token(token: &str) -> bool {
    token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// =============================================================================
// RuleSet
// =============================================================================

/// The compiled rule list, scanned in insertion order.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<SelectorRule>,
}

impl RuleSet {
    /// The built-in rule list for the target site.
    pub fn defaults() -> Self {
        Self { rules: default_rules() }
    }

    /// Defaults plus user rules; entries that do not parse are skipped with
    /// a diagnostic.
    pub fn with_custom_rules(custom: &[String]) -> Self {
        let mut set = Self::defaults();
        for spec in custom {
            match SelectorRule::parse(spec) {
                Ok(rule) => set.rules.push(rule),
                Err(e) => log::warn!("skipping invalid custom rule {:?}: {}", spec, e),
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectorRule> {
        self.rules.iter()
    }

    /// First rule matching the feature record, in insertion order.
    pub fn first_match(&self, features: &ElementFeatures) -> Option<&SelectorRule> {
        self.rules.iter().find(|rule| rule.matches(features))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::defaults()
    }
}

fn default_rules() -> Vec<SelectorRule> {
    use AdCategory::*;
    use RuleKind::*;

    vec![
        // In-player video ad UI
        SelectorRule::new(Class, "video-ads", Video),
        SelectorRule::new(Class, "ytp-ad-module", Video),
        SelectorRule::new(Class, "ytp-ad-overlay-slot", Video),
        SelectorRule::new(Class, "ytp-ad-player-overlay", Video),
        SelectorRule::new(Class, "ytp-ad-preview-container", Video),
        SelectorRule::new(Class, "ytp-ad-text", Video),
        SelectorRule::new(Class, "ytp-ad-overlay-container", Video),
        SelectorRule::new(Class, "ytp-ad-image-overlay", Video),
        SelectorRule::new(Class, "ytp-ad-action-interstitial-overlay-container", Video),
        // Feed and sidebar placements
        SelectorRule::new(Class, "ytd-display-ad-renderer", Banner),
        SelectorRule::new(Tag, "ytd-display-ad-renderer", Banner),
        SelectorRule::new(Tag, "ytd-ad-slot-renderer", Banner),
        SelectorRule::new(Class, "ytd-in-feed-ad-layout-renderer", Banner),
        SelectorRule::new(Class, "ytd-action-companion-ad-renderer", Banner),
        SelectorRule::new(Class, "ytd-masthead-ad-renderer", Banner),
        SelectorRule::new(Class, "ytd-banner-promo-renderer", Banner),
        SelectorRule::new(Id, "masthead-ad", Banner),
        // Music surface
        SelectorRule::new(Class, "ytmusic-ad-slot-renderer", Banner),
        // Sponsored content markers
        SelectorRule::new(Attribute, "data-ad-type", Sponsored),
        SelectorRule::new(Attribute, "data-ad-impression", Sponsored),
        SelectorRule::new(Class, "adsbygoogle", Sponsored),
        SelectorRule::new(Class, "google_ads", Sponsored),
        SelectorRule::new(Class, "ad_creative", Sponsored),
        SelectorRule::new(Class, "ad_wrapper", Sponsored),
        SelectorRule::new(Class, "companion-ad-container", Sponsored),
        // Generic catch-alls, scored rather than blocked outright
        SelectorRule::new(Class, "ad-", Banner).generic(),
        SelectorRule::new(Id, "ad-", Banner).generic(),
        SelectorRule::new(Class, "ads", Banner).generic(),
        SelectorRule::new(Id, "ads", Banner).generic(),
        SelectorRule::new(Class, "sponsor", Sponsored).generic(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features_with_class(class: &str) -> ElementFeatures {
        ElementFeatures {
            tag_name: "div".into(),
            class_names: vec![class.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_forms() {
        let rule = SelectorRule::parse(".ytp-ad-module").unwrap();
        assert_eq!(rule.kind, RuleKind::Class);
        assert_eq!(rule.token, "ytp-ad-module");
        assert_eq!(rule.category, AdCategory::Banner);

        let rule = SelectorRule::parse("#masthead-ad").unwrap();
        assert_eq!(rule.kind, RuleKind::Id);

        let rule = SelectorRule::parse("[data-ad-type]").unwrap();
        assert_eq!(rule.kind, RuleKind::Attribute);

        let rule = SelectorRule::parse("video:.ytp-ad-text").unwrap();
        assert_eq!(rule.category, AdCategory::Video);

        let rule = SelectorRule::parse("ytd-ad-slot-renderer").unwrap();
        assert_eq!(rule.kind, RuleKind::Tag);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(SelectorRule::parse(""), Err(RuleParseError::Empty));
        assert!(matches!(
            SelectorRule::parse("."),
            Err(RuleParseError::InvalidToken(_))
        ));
        assert!(matches!(
            SelectorRule::parse("div > span"),
            Err(RuleParseError::InvalidToken(_))
        ));
        assert_eq!(
            SelectorRule::parse("[unterminated"),
            Err(RuleParseError::UnterminatedAttribute)
        );
        assert!(matches!(
            SelectorRule::parse("weird:.x"),
            Err(RuleParseError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_matches_class_substring() {
        let rule = SelectorRule::new(RuleKind::Class, "ad-", AdCategory::Banner);
        assert!(rule.matches(&features_with_class("ad-container")));
        assert!(rule.matches(&features_with_class("ytp-ad-module")));
        assert!(!rule.matches(&features_with_class("header")));
    }

    #[test]
    fn test_matches_attribute_via_matched_pairs() {
        let rule = SelectorRule::new(RuleKind::Attribute, "data-ad-type", AdCategory::Sponsored);
        let features = ElementFeatures {
            matched_attributes: vec![("data-ad-type".into(), "display".into())],
            ..Default::default()
        };
        assert!(rule.matches(&features));
        assert!(!rule.matches(&ElementFeatures::default()));
    }

    #[test]
    fn test_css_rendering() {
        assert_eq!(
            SelectorRule::new(RuleKind::Class, "ytp-ad-module", AdCategory::Video).css(),
            "[class*=\"ytp-ad-module\"]"
        );
        assert_eq!(
            SelectorRule::new(RuleKind::Tag, "ytd-ad-slot-renderer", AdCategory::Banner).css(),
            "ytd-ad-slot-renderer"
        );
        assert_eq!(
            SelectorRule::new(RuleKind::Attribute, "data-ad-type", AdCategory::Sponsored).css(),
            "[data-ad-type]"
        );
    }

    #[test]
    fn test_ruleset_first_match_order() {
        let set = RuleSet::defaults();
        let hit = set.first_match(&features_with_class("ytp-ad-module")).unwrap();
        assert_eq!(hit.token, "ytp-ad-module");
        assert!(!hit.generic);
    }

    #[test]
    fn test_custom_rules_skip_invalid() {
        let set = RuleSet::with_custom_rules(&[
            ".promo-banner".to_string(),
            "not a selector!!".to_string(),
        ]);
        assert_eq!(set.len(), RuleSet::defaults().len() + 1);
    }
}
