//! Scored element classifier and protection gate.
//!
//! Scoring is an additive heuristic: each signal contributes an independent
//! positive weight and the total is clipped to [0, 1]. Before any scoring,
//! the protection gate runs and unconditionally vetoes blocking for player,
//! video and core-UI infrastructure. The final policy deliberately biases
//! toward false negatives: an ad slipping through is recoverable, a hidden
//! player is not.

use crate::rules::{AdCategory, SelectorRule};
use crate::settings::RuntimeSettings;
use crate::types::{Decision, DecisionReason, ElementFeatures, ProtectedBy, ScoreSignals};

/// Score above which an element counts as a probable ad.
pub const AD_SCORE_THRESHOLD: f32 = 0.7;

/// Id substrings denoting player/container/core-UI infrastructure.
const PROTECTED_ID_TOKENS: &[&str] = &[
    "movie_player",
    "player",
    "container",
    "watch7",
    "primary",
    "secondary",
    "content",
    "main",
    "video",
    "ytd",
];

/// Class substrings denoting player or video containers.
const PROTECTED_CLASS_TOKENS: &[&str] = &["player", "video"];

// =============================================================================
// Context
// =============================================================================

/// Page-level context for a classification call.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Hostname of the page the element lives on.
    pub hostname: &'a str,
    pub settings: &'a RuntimeSettings,
}

// =============================================================================
// Scoring
// =============================================================================

/// Signal set present in a feature record, for diagnostics.
pub fn signals(features: &ElementFeatures) -> ScoreSignals {
    let mut set = ScoreSignals::empty();

    if features.text.contains("ad") || features.text.contains("sponsored") {
        set |= ScoreSignals::TEXT_AD;
    }
    if features.text.contains("skip") || features.text.contains("advertisement") {
        set |= ScoreSignals::TEXT_SKIP;
    }
    if features.class_contains("ad") || features.id.contains("ad") {
        set |= ScoreSignals::NAME_AD;
    }
    if features.class_contains("sponsor") || features.id.contains("sponsor") {
        set |= ScoreSignals::NAME_SPONSOR;
    }
    for (name, value) in &features.matched_attributes {
        if name.contains("ad") || value.contains("ad") {
            set |= ScoreSignals::ATTR_AD;
        }
        if name.contains("sponsor") || value.contains("sponsor") {
            set |= ScoreSignals::ATTR_SPONSOR;
        }
    }
    let rect = &features.bounding_box;
    if rect.y < 100.0 && rect.width > 300.0 {
        set |= ScoreSignals::TOP_BANNER;
    }
    if rect.area() > 50_000.0 && rect.height < 200.0 {
        set |= ScoreSignals::FLAT_BLOCK;
    }
    if features.child_count > 5 {
        set |= ScoreSignals::COMPLEX;
    }
    if features.parent_class_contains("ad") || features.parent_class_contains("sponsor") {
        set |= ScoreSignals::PARENT_AD;
    }

    set
}

/// Ad-probability score in [0, 1]. Every weight is positive, so adding a
/// signal to a fixed feature set never lowers the score.
pub fn score(features: &ElementFeatures) -> f32 {
    let mut total = 0.0f32;
    let set = signals(features);

    if set.contains(ScoreSignals::TEXT_AD) {
        total += 0.3;
    }
    if set.contains(ScoreSignals::TEXT_SKIP) {
        total += 0.2;
    }
    if set.contains(ScoreSignals::NAME_AD) {
        total += 0.4;
    }
    if set.contains(ScoreSignals::NAME_SPONSOR) {
        total += 0.3;
    }
    // Attribute weights apply per matched pair.
    for (name, value) in &features.matched_attributes {
        if name.contains("ad") || value.contains("ad") {
            total += 0.2;
        }
        if name.contains("sponsor") || value.contains("sponsor") {
            total += 0.15;
        }
    }
    if set.contains(ScoreSignals::TOP_BANNER) {
        total += 0.1;
    }
    if set.contains(ScoreSignals::FLAT_BLOCK) {
        total += 0.1;
    }
    if set.contains(ScoreSignals::COMPLEX) {
        total += 0.05;
    }
    if set.contains(ScoreSignals::PARENT_AD) {
        total += 0.2;
    }

    total.clamp(0.0, 1.0)
}

// =============================================================================
// Protection gate
// =============================================================================

/// The hard veto. Returns the rule that protects this element, if any.
pub fn protection_veto(features: &ElementFeatures) -> Option<ProtectedBy> {
    if features.tag_name == "video" {
        return Some(ProtectedBy::VideoElement);
    }
    // Canvas elements are assumed video rendering surfaces.
    if features.tag_name == "canvas" {
        return Some(ProtectedBy::Canvas);
    }
    if PROTECTED_ID_TOKENS.iter().any(|token| features.id.contains(token)) {
        return Some(ProtectedBy::InfrastructureId);
    }
    if features.tag_name == "iframe" {
        // An iframe passes only when its class signals advertising rather
        // than player/video embedding.
        let advertising =
            features.class_contains("ad") || features.class_contains("sponsor");
        let playerish = PROTECTED_CLASS_TOKENS
            .iter()
            .any(|token| features.class_contains(token));
        if advertising && !playerish {
            return None;
        }
        return Some(ProtectedBy::Iframe);
    }
    if PROTECTED_CLASS_TOKENS
        .iter()
        .any(|token| features.class_contains(token))
    {
        return Some(ProtectedBy::PlayerClass);
    }
    None
}

/// "Looks like an ad container": tag, id or some class token contains "ad"
/// or "banner" without also containing "player" or "video".
pub fn structural_ad_signal(features: &ElementFeatures) -> bool {
    fn ad_token(token: &str) -> bool {
        (token.contains("ad") || token.contains("banner"))
            && !token.contains("player")
            && !token.contains("video")
    }

    ad_token(&features.tag_name)
        || ad_token(&features.id)
        || features.class_names.iter().any(|class| ad_token(class))
}

fn infer_category(features: &ElementFeatures) -> AdCategory {
    let set = signals(features);
    if set.intersects(ScoreSignals::NAME_SPONSOR | ScoreSignals::ATTR_SPONSOR) {
        AdCategory::Sponsored
    } else {
        AdCategory::Banner
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Classify one element.
///
/// `rule` is the compiled selector rule that nominated the node, when one
/// did. Specific rules block on structural agreement; generic rules and
/// rule-less nodes go through the scored heuristic. The protection gate and
/// the site lists run first and are absolute.
pub fn decide(
    features: &ElementFeatures,
    rule: Option<&SelectorRule>,
    ctx: &ClassifyContext<'_>,
) -> Decision {
    let score = score(features);
    let settings = ctx.settings;

    if settings.is_paused {
        return Decision::allow(score, DecisionReason::Paused);
    }
    if settings.is_whitelisted(ctx.hostname) {
        return Decision::allow(score, DecisionReason::Whitelisted);
    }
    if let Some(by) = protection_veto(features) {
        return Decision::allow(score, DecisionReason::Protected(by));
    }
    if settings.is_blacklisted(ctx.hostname) {
        return Decision::block(score, DecisionReason::Blacklisted);
    }

    let structural = structural_ad_signal(features);
    let category = rule
        .map(|rule| rule.category)
        .unwrap_or_else(|| infer_category(features));

    if !settings.category_enabled(category) {
        return Decision::allow(score, DecisionReason::CategoryDisabled(category));
    }

    if let Some(rule) = rule {
        if !rule.generic && structural {
            return Decision::block(score, DecisionReason::MatchedRule(rule.category));
        }
    }

    if settings.enable_heuristics && structural && score > AD_SCORE_THRESHOLD {
        return Decision::block(score, DecisionReason::Heuristic(category));
    }

    Decision::allow(score, DecisionReason::NotAnAd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;
    use crate::types::BoundingBox;

    fn ad_features() -> ElementFeatures {
        ElementFeatures {
            text: "sponsored · shop the deal".into(),
            class_names: vec!["ad-banner".into()],
            id: "feed-ad".into(),
            tag_name: "div".into(),
            matched_attributes: vec![("data-ad-type".into(), "display".into())],
            bounding_box: BoundingBox::new(0.0, 20.0, 728.0, 90.0),
            is_visible: true,
            child_count: 7,
            parent_class_names: vec!["ad-slot".into()],
        }
    }

    fn ctx<'a>(settings: &'a RuntimeSettings) -> ClassifyContext<'a> {
        ClassifyContext { hostname: "www.youtube.com", settings }
    }

    #[test]
    fn test_score_threshold() {
        let features = ad_features();
        assert!(score(&features) > AD_SCORE_THRESHOLD);
        assert!(score(&ElementFeatures::default()) < f32::EPSILON);
    }

    #[test]
    fn test_score_monotone_under_added_signal() {
        let mut features = ElementFeatures {
            class_names: vec!["promo".into()],
            tag_name: "div".into(),
            ..Default::default()
        };
        let before = score(&features);
        features.text = "sponsored".into();
        assert!(score(&features) >= before);

        // And again from an already-signalled record.
        let before = score(&features);
        features.child_count = 8;
        assert!(score(&features) >= before);
    }

    #[test]
    fn test_score_clipped_to_one() {
        let mut features = ad_features();
        features
            .matched_attributes
            .extend((0..10).map(|i| (format!("data-ad-{i}"), "sponsor".to_string())));
        assert_eq!(score(&features), 1.0);
    }

    #[test]
    fn test_protection_gate_is_absolute() {
        let settings = RuntimeSettings::default();

        let mut features = ad_features();
        features.id = "movie_player".into();
        let decision = decide(&features, None, &ctx(&settings));
        assert!(!decision.should_block);
        assert!(matches!(decision.reason, DecisionReason::Protected(_)));

        let mut features = ad_features();
        features.tag_name = "video".into();
        let decision = decide(&features, None, &ctx(&settings));
        assert!(!decision.should_block);
        assert_eq!(
            decision.reason,
            DecisionReason::Protected(ProtectedBy::VideoElement)
        );

        let mut features = ad_features();
        features.tag_name = "canvas".into();
        assert!(!decide(&features, None, &ctx(&settings)).should_block);
    }

    #[test]
    fn test_iframe_gate() {
        let settings = RuntimeSettings::default();

        let mut frame = ElementFeatures {
            tag_name: "iframe".into(),
            class_names: vec!["embedded-video".into()],
            ..Default::default()
        };
        assert_eq!(protection_veto(&frame), Some(ProtectedBy::Iframe));

        frame.class_names = vec!["ad-frame".into()];
        assert_eq!(protection_veto(&frame), None);

        // Advertising class does not override a player class.
        frame.class_names = vec!["ad-frame".into(), "player-embed".into()];
        assert_eq!(protection_veto(&frame), Some(ProtectedBy::Iframe));

        let mut features = ad_features();
        features.tag_name = "iframe".into();
        features.class_names = vec!["ad-frame".into()];
        assert!(decide(&features, None, &ctx(&settings)).should_block);
    }

    #[test]
    fn test_whitelist_overrides_high_score() {
        let mut settings = RuntimeSettings::default();
        settings.whitelisted_sites.insert("www.youtube.com".into());
        let decision = decide(&ad_features(), None, &ctx(&settings));
        assert!(!decision.should_block);
        assert_eq!(decision.reason, DecisionReason::Whitelisted);
    }

    #[test]
    fn test_blacklist_overrides_zero_score() {
        let mut settings = RuntimeSettings::default();
        settings.blacklisted_sites.insert("www.youtube.com".into());
        let features = ElementFeatures {
            tag_name: "div".into(),
            ..Default::default()
        };
        assert_eq!(score(&features), 0.0);
        let decision = decide(&features, None, &ctx(&settings));
        assert!(decision.should_block);
        assert_eq!(decision.reason, DecisionReason::Blacklisted);
    }

    #[test]
    fn test_specific_rule_blocks_on_structural_agreement() {
        let settings = RuntimeSettings::default();
        let rules = RuleSet::defaults();
        let features = ElementFeatures {
            tag_name: "div".into(),
            class_names: vec!["ytp-ad-module".into()],
            is_visible: true,
            ..Default::default()
        };
        let rule = rules.first_match(&features).unwrap();
        let decision = decide(&features, Some(rule), &ctx(&settings));
        assert!(decision.should_block);
        assert_eq!(decision.reason, DecisionReason::MatchedRule(AdCategory::Video));
    }

    #[test]
    fn test_generic_rule_needs_score() {
        let settings = RuntimeSettings::default();
        let generic = SelectorRule::parse(".ad-").map(|mut rule| {
            rule.generic = true;
            rule
        });
        let generic = generic.unwrap();

        // Structural signal alone is not sufficient on the generic path.
        let weak = ElementFeatures {
            tag_name: "div".into(),
            class_names: vec!["ad-roadster".into()],
            ..Default::default()
        };
        assert!(!decide(&weak, Some(&generic), &ctx(&settings)).should_block);

        let strong = ad_features();
        let decision = decide(&strong, Some(&generic), &ctx(&settings));
        assert!(decision.should_block);
    }

    #[test]
    fn test_heuristics_toggle() {
        let mut settings = RuntimeSettings::default();
        settings.enable_heuristics = false;

        // Scored path off: a strong generic candidate is left alone...
        assert!(!decide(&ad_features(), None, &ctx(&settings)).should_block);

        // ...but specific rule matches still apply.
        let rules = RuleSet::defaults();
        let features = ElementFeatures {
            tag_name: "div".into(),
            class_names: vec!["ytp-ad-module".into()],
            ..Default::default()
        };
        let rule = rules.first_match(&features).unwrap();
        assert!(decide(&features, Some(rule), &ctx(&settings)).should_block);
    }

    #[test]
    fn test_category_toggle() {
        let mut settings = RuntimeSettings::default();
        settings.block_video_ads = false;
        let rules = RuleSet::defaults();
        let features = ElementFeatures {
            tag_name: "div".into(),
            class_names: vec!["ytp-ad-module".into()],
            ..Default::default()
        };
        let rule = rules.first_match(&features).unwrap();
        let decision = decide(&features, Some(rule), &ctx(&settings));
        assert!(!decision.should_block);
        assert_eq!(
            decision.reason,
            DecisionReason::CategoryDisabled(AdCategory::Video)
        );
    }

    #[test]
    fn test_paused_suspends_blocking() {
        let mut settings = RuntimeSettings::default();
        settings.is_paused = true;
        let decision = decide(&ad_features(), None, &ctx(&settings));
        assert!(!decision.should_block);
        assert_eq!(decision.reason, DecisionReason::Paused);
    }

    #[test]
    fn test_structural_signal_excludes_player_tokens() {
        let features = ElementFeatures {
            tag_name: "div".into(),
            class_names: vec!["video-ads".into()],
            ..Default::default()
        };
        // "video-ads" contains "video", so it is not a structural ad token.
        assert!(!structural_ad_signal(&features));

        let features = ElementFeatures {
            tag_name: "div".into(),
            class_names: vec!["masthead-ad".into()],
            ..Default::default()
        };
        assert!(structural_ad_signal(&features));
    }
}
