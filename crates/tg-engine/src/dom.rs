//! Host page surface traits.
//!
//! The engine never holds browser types; it sees the page through `Dom` and
//! `DomNode`. The wasm crate implements these over the live document, the
//! session tests over an in-memory mock. Every fallible operation returns a
//! `DomError` that callers contain locally; a failing node or selector must
//! never stop a sweep.

use thiserror::Error;

use tg_core::rules::SelectorRule;
use tg_core::types::{BlockedMarker, BoundingBox};

/// Errors surfaced by the host adapter.
#[derive(Debug, Error)]
pub enum DomError {
    /// The node is no longer attached to the document. Treated as
    /// already-satisfied by callers.
    #[error("node is no longer attached to the document")]
    NodeGone,

    /// The host rejected a query expression.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// A required host capability is absent or denied.
    #[error("host API unavailable: {0}")]
    ApiUnavailable(&'static str),

    /// Any other host-side failure.
    #[error("host error: {0}")]
    Host(String),
}

/// Playback state of the page's video element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoState {
    /// Duration in seconds; may be NaN/infinite while metadata loads.
    pub duration: f64,
    /// Playback position in seconds.
    pub current_time: f64,
    pub paused: bool,
    pub muted: bool,
    pub playback_rate: f64,
}

/// One element of the live document.
///
/// Clones are cheap handles onto the same underlying node. Getters are
/// defensive: an absent field reads as an empty/zero default, never an
/// error.
pub trait DomNode: Clone {
    /// Tag name, lowercased.
    fn tag_name(&self) -> String;

    /// Element id, or empty.
    fn id(&self) -> String;

    /// Class tokens, or empty.
    fn class_names(&self) -> Vec<String>;

    /// Text content, truncated to at most `max_len` characters.
    fn text(&self, max_len: usize) -> String;

    /// All attribute name/value pairs.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Current rendered box.
    fn bounding_box(&self) -> BoundingBox;

    /// Combined computed-style and layout-participation visibility.
    fn is_visible(&self) -> bool;

    /// Number of child elements.
    fn child_count(&self) -> usize;

    /// Class tokens of the parent element, or empty.
    fn parent_class_names(&self) -> Vec<String>;

    /// Whether the node is still attached to the document.
    fn is_connected(&self) -> bool;

    /// The blocked marker stamped on this node, if any.
    fn marker(&self) -> Option<BlockedMarker>;

    /// Stamp a blocked marker onto the node.
    fn set_marker(&self, marker: &BlockedMarker) -> Result<(), DomError>;

    /// Current inline style value for a property, or empty.
    fn style_value(&self, property: &str) -> String;

    /// Set an inline style property.
    fn set_style(&self, property: &str, value: &str) -> Result<(), DomError>;

    /// Dispatch a click to the element.
    fn click(&self) -> Result<(), DomError>;

    /// Detach the node from the document.
    fn remove(&self) -> Result<(), DomError>;
}

/// The live document of the single target site.
pub trait Dom {
    type Node: DomNode;

    /// Full page URL.
    fn page_url(&self) -> String;

    /// Page hostname, lowercased.
    fn hostname(&self) -> String;

    /// All current elements matching a compiled rule.
    fn select(&self, rule: &SelectorRule) -> Result<Vec<Self::Node>, DomError>;

    /// State of the page's video element, if one exists.
    fn video_state(&self) -> Option<VideoState>;

    /// Jump the video playback position, in seconds.
    fn seek_video(&self, position: f64) -> Result<(), DomError>;

    fn set_video_muted(&self, muted: bool) -> Result<(), DomError>;

    fn set_video_playback_rate(&self, rate: f64) -> Result<(), DomError>;

    /// Raise an ephemeral on-page notification. Best-effort; the default
    /// does nothing.
    fn notify(&self, _message: &str) {}
}
