//! Message protocol shared with the popup and background collaborators.
//!
//! Requests are JSON objects tagged by an `action` field; replies are plain
//! JSON objects. Statistics updates are fire-and-forget; settings changes
//! are pushed to the core, never polled.

use serde::{Deserialize, Serialize};

use crate::settings::RuntimeSettings;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Liveness probe; answered with `{status: "ok"}`.
    Ping,
    /// Read the session counters.
    GetStats,
    /// Fire-and-forget increment from a collaborator.
    AdBlocked,
    /// Replace the runtime settings.
    UpdateSettings { settings: RuntimeSettings },
    /// Suspend or resume all blocking actions.
    TogglePause { paused: bool },
}

// =============================================================================
// Replies
// =============================================================================

/// Counter snapshot returned by `GetStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub blocked_ads: u64,
    pub total_ads: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today_blocked: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Stats(StatsSnapshot),
    Status { status: String },
    Ack { success: bool },
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status { status: "ok".to_string() }
    }

    pub fn error() -> Self {
        Reply::Status { status: "error".to_string() }
    }

    pub fn ack() -> Self {
        Reply::Ack { success: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(request, Request::Ping);

        let request: Request = serde_json::from_str(r#"{"action":"getStats"}"#).unwrap();
        assert_eq!(request, Request::GetStats);

        let request: Request =
            serde_json::from_str(r#"{"action":"togglePause","paused":true}"#).unwrap();
        assert_eq!(request, Request::TogglePause { paused: true });

        let request: Request = serde_json::from_str(
            r#"{"action":"updateSettings","settings":{"isPaused":true}}"#,
        )
        .unwrap();
        match request {
            Request::UpdateSettings { settings } => assert!(settings.is_paused),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_action_is_an_error() {
        assert!(serde_json::from_str::<Request>(r#"{"action":"selfDestruct"}"#).is_err());
    }

    #[test]
    fn test_reply_wire_format() {
        assert_eq!(serde_json::to_string(&Reply::ok()).unwrap(), r#"{"status":"ok"}"#);
        assert_eq!(serde_json::to_string(&Reply::ack()).unwrap(), r#"{"success":true}"#);

        let stats = Reply::Stats(StatsSnapshot {
            blocked_ads: 3,
            total_ads: 5,
            today_blocked: None,
        });
        assert_eq!(
            serde_json::to_string(&stats).unwrap(),
            r#"{"blockedAds":3,"totalAds":5}"#
        );
    }
}
