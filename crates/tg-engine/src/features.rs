//! Feature extraction from a DOM node.
//!
//! Recomputed fresh on every classification call; the DOM mutates
//! continuously, so nothing here is cached.

use tg_core::types::ElementFeatures;

use crate::dom::DomNode;

/// Text content sample length, enough for the text signals without hauling
/// whole article bodies through the classifier.
pub const TEXT_SAMPLE_LEN: usize = 200;

/// Compute the feature record for a node.
///
/// Every field is read defensively: missing attributes, a detached parent
/// or an unlaid-out box all extract to empty/zero defaults.
pub fn extract<N: DomNode>(node: &N) -> ElementFeatures {
    let matched_attributes = node
        .attributes()
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_ascii_lowercase()))
        .filter(|(name, value)| {
            name.contains("ad")
                || name.contains("sponsor")
                || value.contains("ad")
                || value.contains("sponsor")
        })
        .collect();

    ElementFeatures {
        text: node.text(TEXT_SAMPLE_LEN).to_lowercase(),
        class_names: node
            .class_names()
            .into_iter()
            .map(|class| class.to_ascii_lowercase())
            .collect(),
        id: node.id().to_ascii_lowercase(),
        tag_name: node.tag_name().to_ascii_lowercase(),
        matched_attributes,
        bounding_box: node.bounding_box(),
        is_visible: node.is_visible(),
        child_count: node.child_count(),
        parent_class_names: node
            .parent_class_names()
            .into_iter()
            .map(|class| class.to_ascii_lowercase())
            .collect(),
    }
}
