//! Suppression actions.
//!
//! Every operation here is best-effort: a node that vanished mid-action, a
//! missing capability or a host refusal degrades to a logged no-op.
//! Suppression must never be fatal to the page.

use tg_core::rules::{AdCategory, RuleKind, SelectorRule};
use tg_core::types::BlockedMarker;

use crate::dom::{Dom, DomNode};

/// Videos at or above this duration are regular content and are never
/// seeked, muted or sped up.
pub const MAX_AD_DURATION_SECS: f64 = 300.0;

/// Durations under this are a strong ad signal on their own.
pub const SHORT_AD_SIGNAL_SECS: f64 = 90.0;

/// Leave the seek alone when playback is already this close to the end.
pub const SEEK_END_GUARD_SECS: f64 = 0.5;

/// Playback rate applied while an ad is active.
pub const AD_PLAYBACK_RATE: f64 = 16.0;

/// Skip controls, most specific first.
pub fn skip_control_rules() -> Vec<SelectorRule> {
    [
        "ytp-ad-skip-button",
        "ytp-ad-skip-button-modern",
        "ytp-skip-ad-button",
        "ytp-ad-skip-button-container",
    ]
    .iter()
    .map(|token| SelectorRule::new(RuleKind::Class, token, AdCategory::Video))
    .collect()
}

/// Markers whose visible presence means an ad is playing.
pub fn ad_indicator_rules() -> Vec<SelectorRule> {
    [
        "ad-showing",
        "ad-interrupting",
        "ytp-ad-module",
        "ytp-ad-preview-container",
        "ytp-ad-player-overlay",
    ]
    .iter()
    .map(|token| SelectorRule::new(RuleKind::Class, token, AdCategory::Video))
    .collect()
}

/// Ad segment markers inside the scrubber/progress element.
pub fn timeline_marker_rules() -> Vec<SelectorRule> {
    ["ytp-ad-progress-list", "ytp-ad-progress"]
        .iter()
        .map(|token| SelectorRule::new(RuleKind::Class, token, AdCategory::Video))
        .collect()
}

// =============================================================================
// Element hiding
// =============================================================================

/// Hide an element and stamp the blocked marker.
///
/// Sets both `display:none` and `visibility:hidden`, since either alone can
/// be reverted by site script. Returns true when the element was hidden by
/// this call; an already-marked or detached node is a no-op.
pub fn hide_element<D: Dom>(
    dom: &D,
    node: &D::Node,
    reason: &str,
    now_ms: f64,
    notify: bool,
) -> bool {
    if node.marker().is_some() {
        return false;
    }
    if !node.is_connected() {
        return false;
    }

    let marker = BlockedMarker {
        reason: reason.to_string(),
        blocked_at_ms: now_ms,
        original_display: node.style_value("display"),
        original_visibility: node.style_value("visibility"),
    };

    if let Err(e) = node.set_style("display", "none") {
        log::debug!("hide failed for {:?}: {}", reason, e);
        return false;
    }
    if let Err(e) = node.set_style("visibility", "hidden") {
        log::debug!("hide (visibility) failed for {:?}: {}", reason, e);
    }
    if let Err(e) = node.set_marker(&marker) {
        log::debug!("marker stamp failed for {:?}: {}", reason, e);
    }

    if notify {
        dom.notify("TubeGuard blocked an ad");
    }

    true
}

// =============================================================================
// Video skipping
// =============================================================================

/// What `skip_video` managed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkipOutcome {
    pub clicked_skip: bool,
    pub seeked_to_end: bool,
    pub muted: bool,
}

impl SkipOutcome {
    /// True when the ad was actively skipped rather than just damped.
    pub fn skipped(&self) -> bool {
        self.clicked_skip || self.seeked_to_end
    }
}

/// Try to end the currently playing ad.
///
/// In order: activate a skip control; failing that, jump a short video to
/// its end; and mute/speed up playback as long as the duration still
/// classifies it as an ad. A video of content length is never touched.
pub fn skip_video<D: Dom>(dom: &D, skip_rules: &[SelectorRule]) -> SkipOutcome {
    let mut outcome = SkipOutcome::default();

    let Some(state) = dom.video_state() else {
        return outcome;
    };

    // (a) Activate a skip control. The control is often kept hidden until
    // the offset timer fires; force it interactive before clicking.
    'controls: for rule in skip_rules {
        let nodes = match dom.select(rule) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::debug!("skip control lookup failed: {}", e);
                continue;
            }
        };
        for node in nodes {
            if !node.is_connected() {
                continue;
            }
            let _ = node.set_style("display", "block");
            let _ = node.set_style("visibility", "visible");
            let _ = node.set_style("opacity", "1");
            let _ = node.set_style("pointer-events", "auto");
            match node.click() {
                Ok(()) => {
                    log::debug!("clicked skip control {:?}", rule.token);
                    outcome.clicked_skip = true;
                    break 'controls;
                }
                Err(e) => log::debug!("skip click failed: {}", e),
            }
        }
    }

    let ad_length =
        state.duration.is_finite() && state.duration > 0.0 && state.duration < MAX_AD_DURATION_SECS;

    // (b) No control: force a short ad to completion.
    if !outcome.clicked_skip
        && ad_length
        && state.current_time < state.duration - SEEK_END_GUARD_SECS
    {
        match dom.seek_video(state.duration) {
            Ok(()) => {
                log::debug!("seeked ad to end ({}s)", state.duration);
                outcome.seeked_to_end = true;
            }
            Err(e) => log::debug!("seek failed: {}", e),
        }
    }

    // (c) Damp whatever is left of it.
    if ad_length {
        match dom.set_video_muted(true) {
            Ok(()) => outcome.muted = true,
            Err(e) => log::debug!("mute failed: {}", e),
        }
        if let Err(e) = dom.set_video_playback_rate(AD_PLAYBACK_RATE) {
            log::debug!("playback rate change failed: {}", e);
        }
    }

    outcome
}

/// Undo the ad damping once playback returns to content.
pub fn restore_playback<D: Dom>(dom: &D) {
    if let Err(e) = dom.set_video_muted(false) {
        log::debug!("unmute failed: {}", e);
    }
    if let Err(e) = dom.set_video_playback_rate(1.0) {
        log::debug!("playback rate restore failed: {}", e);
    }
}

// =============================================================================
// Timeline cleanup
// =============================================================================

/// Remove ad-segment markers from the scrubber. Idempotent: removing an
/// already-absent marker is a no-op.
pub fn strip_timeline_markers<D: Dom>(dom: &D, rules: &[SelectorRule]) -> usize {
    let mut removed = 0;
    for rule in rules {
        let nodes = match dom.select(rule) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::debug!("timeline marker lookup failed: {}", e);
                continue;
            }
        };
        for node in nodes {
            if !node.is_connected() {
                continue;
            }
            match node.remove() {
                Ok(()) => removed += 1,
                Err(e) => log::debug!("timeline marker removal failed: {}", e),
            }
        }
    }
    removed
}
