//! Player-response payload sanitizer.
//!
//! The player API response embeds its ad schedule alongside the stream
//! metadata. Stripping those fields before the page script sees the body
//! prevents ad slots from being scheduled at all, complementing the DOM and
//! request layers.

use serde_json::Value;

/// Ad schedule fields removed from player payloads.
const AD_FIELDS: &[&str] = &["adPlacements", "playerAds", "adSlots"];

/// Substrings identifying player API endpoints whose responses carry an ad
/// schedule.
const PLAYER_API_MARKERS: &[&str] = &["youtubei/v1/player", "get_video_info"];

/// True when the URL addresses a player API endpoint.
pub fn is_player_api_url(url: &str) -> bool {
    PLAYER_API_MARKERS.iter().any(|marker| url.contains(marker))
}

/// Strip ad schedule fields from a player response body.
///
/// Fields are removed at the top level and under `playerResponse`. Returns
/// the rewritten body, or `None` when the body is not JSON or carried no ad
/// fields (the caller forwards the original untouched).
pub fn sanitize_player_payload(body: &str) -> Option<String> {
    let mut value: Value = serde_json::from_str(body).ok()?;

    let mut changed = strip_ad_fields(&mut value);
    if let Some(player_response) = value.get_mut("playerResponse") {
        changed |= strip_ad_fields(player_response);
    }

    if changed {
        serde_json::to_string(&value).ok()
    } else {
        None
    }
}

fn strip_ad_fields(value: &mut Value) -> bool {
    let Some(object) = value.as_object_mut() else {
        return false;
    };

    let mut changed = false;
    for field in AD_FIELDS {
        if object.remove(*field).is_some() {
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_api_urls() {
        assert!(is_player_api_url("https://www.youtube.com/youtubei/v1/player?key=x"));
        assert!(is_player_api_url("https://www.youtube.com/get_video_info?v=abc"));
        assert!(!is_player_api_url("https://www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_strips_top_level_and_nested() {
        let body = r#"{
            "adPlacements": [1, 2],
            "playerAds": {},
            "playerResponse": {
                "adSlots": [],
                "videoDetails": {"videoId": "abc"}
            },
            "streamingData": {"formats": []}
        }"#;
        let cleaned = sanitize_player_payload(body).unwrap();
        let value: Value = serde_json::from_str(&cleaned).unwrap();

        assert!(value.get("adPlacements").is_none());
        assert!(value.get("playerAds").is_none());
        assert!(value["playerResponse"].get("adSlots").is_none());
        assert_eq!(value["playerResponse"]["videoDetails"]["videoId"], "abc");
        assert!(value.get("streamingData").is_some());
    }

    #[test]
    fn test_clean_payload_left_untouched() {
        assert!(sanitize_player_payload(r#"{"streamingData":{}}"#).is_none());
    }

    #[test]
    fn test_non_json_left_untouched() {
        assert!(sanitize_player_payload("<!doctype html>").is_none());
    }
}
