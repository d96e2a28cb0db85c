//! Shared type definitions for TubeGuard.
//!
//! These are the fixed-shape records passed between the feature extractor,
//! the classifier and the actuator. None of them is persisted; features and
//! decisions live only for the classification call that produced them.

use bitflags::bitflags;

// =============================================================================
// Geometry
// =============================================================================

/// Rendered bounding box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rendered area in square pixels.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

// =============================================================================
// Element Features
// =============================================================================

/// Feature record computed for a DOM node, recomputed fresh per
/// classification.
///
/// All text is lowercased at extraction. Absent DOM fields extract to
/// empty/zero defaults rather than failing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementFeatures {
    /// Lowercased text content sample.
    pub text: String,
    /// Lowercased class tokens.
    pub class_names: Vec<String>,
    /// Lowercased element id.
    pub id: String,
    /// Lowercased tag name.
    pub tag_name: String,
    /// Attribute name/value pairs whose name or value contains
    /// "ad" or "sponsor", lowercased.
    pub matched_attributes: Vec<(String, String)>,
    /// Current rendered box.
    pub bounding_box: BoundingBox,
    /// Whether the element is currently visible (computed style and layout
    /// participation combined).
    pub is_visible: bool,
    /// Number of child elements.
    pub child_count: usize,
    /// Lowercased class tokens of the parent element.
    pub parent_class_names: Vec<String>,
}

impl ElementFeatures {
    /// True when any class token contains the given substring.
    pub fn class_contains(&self, token: &str) -> bool {
        self.class_names.iter().any(|class| class.contains(token))
    }

    /// True when any parent class token contains the given substring.
    pub fn parent_class_contains(&self, token: &str) -> bool {
        self.parent_class_names.iter().any(|class| class.contains(token))
    }
}

// =============================================================================
// Score Signals
// =============================================================================

bitflags! {
    /// Independent signals contributing to the ad score.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScoreSignals: u16 {
        /// Text contains "ad" or "sponsored".
        const TEXT_AD = 1 << 0;
        /// Text contains "skip" or "advertisement".
        const TEXT_SKIP = 1 << 1;
        /// Class or id contains "ad".
        const NAME_AD = 1 << 2;
        /// Class or id contains "sponsor".
        const NAME_SPONSOR = 1 << 3;
        /// At least one matched attribute contains "ad".
        const ATTR_AD = 1 << 4;
        /// At least one matched attribute contains "sponsor".
        const ATTR_SPONSOR = 1 << 5;
        /// Wide element at the top of the viewport.
        const TOP_BANNER = 1 << 6;
        /// Large flat horizontal block.
        const FLAT_BLOCK = 1 << 7;
        /// More than 5 child elements.
        const COMPLEX = 1 << 8;
        /// Parent class contains "ad" or "sponsor".
        const PARENT_AD = 1 << 9;
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReason {
    /// Blocking is suspended by the pause toggle.
    Paused,
    /// Page hostname is whitelisted.
    Whitelisted,
    /// Hard veto from the protection gate.
    Protected(ProtectedBy),
    /// Page hostname is blacklisted.
    Blacklisted,
    /// Matched a compiled selector rule.
    MatchedRule(crate::rules::AdCategory),
    /// Scored heuristic above the threshold.
    Heuristic(crate::rules::AdCategory),
    /// The matched category is disabled in settings.
    CategoryDisabled(crate::rules::AdCategory),
    /// No blocking signal.
    NotAnAd,
}

/// Which protection-gate rule vetoed a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedBy {
    /// The video element itself.
    VideoElement,
    /// Id denotes player/container/core-UI infrastructure.
    InfrastructureId,
    /// Class denotes a player or video container.
    PlayerClass,
    /// Iframe without an advertising class.
    Iframe,
    /// Canvas elements are assumed video rendering surfaces.
    Canvas,
}

/// Outcome of classifying one element. Produced per node, consumed
/// immediately by the actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub should_block: bool,
    /// Ad-probability score in [0, 1].
    pub score: f32,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn allow(score: f32, reason: DecisionReason) -> Self {
        Self { should_block: false, score, reason }
    }

    pub fn block(score: f32, reason: DecisionReason) -> Self {
        Self { should_block: true, score, reason }
    }
}

// =============================================================================
// Blocked Marker
// =============================================================================

/// State stamped onto a DOM node when it is blocked.
///
/// Created at block time, read for idempotence checks and potential
/// restoration, destroyed with the node on navigation/unload.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedMarker {
    /// Rule or signal that caused the block.
    pub reason: String,
    /// Block timestamp in milliseconds.
    pub blocked_at_ms: f64,
    /// Inline `display` value before blocking.
    pub original_display: String,
    /// Inline `visibility` value before blocking.
    pub original_visibility: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_area() {
        let rect = BoundingBox::new(0.0, 0.0, 400.0, 150.0);
        assert_eq!(rect.area(), 60000.0);
    }

    #[test]
    fn test_class_contains() {
        let features = ElementFeatures {
            class_names: vec!["ytp-ad-module".into(), "style-scope".into()],
            ..Default::default()
        };
        assert!(features.class_contains("ad"));
        assert!(!features.class_contains("sponsor"));
    }
}
