//! Runtime settings.
//!
//! Owned by the settings store collaborator and mutated from the popup; the
//! core only ever reads them. Changes arrive through the message protocol
//! (`UpdateSettings` / `TogglePause`), never by polling. Field names on the
//! wire are the camelCase keys the popup stores in the sync scope.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::rules::AdCategory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    pub block_video_ads: bool,
    pub block_banner_ads: bool,
    pub block_sponsored_content: bool,
    pub auto_skip_ads: bool,
    pub show_notifications: bool,
    /// Gates the scored heuristic path; compiled rules still apply when off.
    #[serde(rename = "enableAI")]
    pub enable_heuristics: bool,
    pub custom_rules: Vec<String>,
    pub whitelisted_sites: HashSet<String>,
    pub blacklisted_sites: HashSet<String>,
    pub is_paused: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            block_video_ads: true,
            block_banner_ads: true,
            block_sponsored_content: true,
            auto_skip_ads: true,
            show_notifications: true,
            enable_heuristics: true,
            custom_rules: Vec::new(),
            whitelisted_sites: HashSet::new(),
            blacklisted_sites: HashSet::new(),
            is_paused: false,
        }
    }
}

impl RuntimeSettings {
    /// Whether blocking is enabled for the given ad category.
    pub fn category_enabled(&self, category: AdCategory) -> bool {
        match category {
            AdCategory::Video => self.block_video_ads,
            AdCategory::Banner => self.block_banner_ads,
            AdCategory::Sponsored => self.block_sponsored_content,
        }
    }

    pub fn is_whitelisted(&self, hostname: &str) -> bool {
        self.whitelisted_sites.contains(&hostname.to_ascii_lowercase())
    }

    pub fn is_blacklisted(&self, hostname: &str) -> bool {
        self.blacklisted_sites.contains(&hostname.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let settings = RuntimeSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"blockVideoAds\":true"));
        assert!(json.contains("\"enableAI\":true"));
        assert!(json.contains("\"isPaused\":false"));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let settings: RuntimeSettings =
            serde_json::from_str(r#"{"blockVideoAds":false}"#).unwrap();
        assert!(!settings.block_video_ads);
        assert!(settings.block_banner_ads);
        assert!(!settings.is_paused);
    }

    #[test]
    fn test_site_lists() {
        let mut settings = RuntimeSettings::default();
        settings.whitelisted_sites.insert("example.com".to_string());
        assert!(settings.is_whitelisted("EXAMPLE.com"));
        assert!(!settings.is_blacklisted("example.com"));
    }
}
