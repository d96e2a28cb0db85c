//! Key-value storage schema shared with the statistics sink and the
//! settings store.
//!
//! Two scopes: the device-local scope holds counters and history, the
//! sync-replicated scope holds the runtime settings and site lists. The
//! core never writes these directly; the key names and record shapes here
//! are the contract with the collaborators that do.

use serde::{Deserialize, Serialize};

use crate::protocol::StatsSnapshot;

// Local-scope keys.
pub const KEY_BLOCKED_ADS: &str = "blockedAds";
pub const KEY_TOTAL_ADS: &str = "totalAds";
pub const KEY_TODAY_BLOCKED: &str = "todayBlocked";
pub const KEY_STATS_HISTORY: &str = "statsHistory";
pub const KEY_INSTALL_DATE: &str = "installDate";
pub const KEY_LAST_UPDATED: &str = "lastUpdated";
pub const KEY_AD_REPORTS: &str = "adReports";

// Sync-scope key.
pub const KEY_SETTINGS: &str = "settings";

/// Daily history entries kept in the local scope.
pub const STATS_HISTORY_CAP: usize = 30;
/// User ad reports kept in the local scope.
pub const AD_REPORTS_CAP: usize = 10;

/// One day of blocking history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStat {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub blocked: u64,
}

/// A user-submitted report of an ad that slipped through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdReport {
    pub url: String,
    pub reason: String,
    pub reported_at: String,
}

/// The local-scope record as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalStats {
    pub blocked_ads: u64,
    pub total_ads: u64,
    pub today_blocked: u64,
    pub stats_history: Vec<DayStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub ad_reports: Vec<AdReport>,
}

impl LocalStats {
    /// Record one blocked ad on the given calendar date.
    ///
    /// Rolls the daily counter over on a date change and keeps the history
    /// capped to [`STATS_HISTORY_CAP`] entries, oldest first out.
    pub fn record_block(&mut self, date: &str) {
        self.blocked_ads += 1;
        self.total_ads += 1;

        let same_day = self
            .stats_history
            .last()
            .is_some_and(|entry| entry.date == date);
        if same_day {
            if let Some(entry) = self.stats_history.last_mut() {
                entry.blocked += 1;
            }
            self.today_blocked += 1;
        } else {
            self.today_blocked = 1;
            push_capped(
                &mut self.stats_history,
                DayStat { date: date.to_string(), blocked: 1 },
                STATS_HISTORY_CAP,
            );
        }
    }

    /// Add a user report, keeping the list capped.
    pub fn record_report(&mut self, report: AdReport) {
        push_capped(&mut self.ad_reports, report, AD_REPORTS_CAP);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocked_ads: self.blocked_ads,
            total_ads: self.total_ads,
            today_blocked: Some(self.today_blocked),
        }
    }
}

/// Append to a capped list, dropping the oldest entries.
pub fn push_capped<T>(list: &mut Vec<T>, item: T, cap: usize) {
    list.push(item);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_block_rolls_days() {
        let mut stats = LocalStats::default();
        stats.record_block("2024-05-01");
        stats.record_block("2024-05-01");
        stats.record_block("2024-05-02");

        assert_eq!(stats.blocked_ads, 3);
        assert_eq!(stats.total_ads, 3);
        assert_eq!(stats.today_blocked, 1);
        assert_eq!(stats.stats_history.len(), 2);
        assert_eq!(stats.stats_history[0].blocked, 2);
    }

    #[test]
    fn test_history_cap() {
        let mut stats = LocalStats::default();
        for day in 0..40 {
            stats.record_block(&format!("2024-01-{day:02}"));
        }
        assert_eq!(stats.stats_history.len(), STATS_HISTORY_CAP);
        assert_eq!(stats.stats_history.last().unwrap().date, "2024-01-39");
    }

    #[test]
    fn test_report_cap() {
        let mut stats = LocalStats::default();
        for i in 0..15 {
            stats.record_report(AdReport {
                url: format!("https://example.com/{i}"),
                reason: "banner".to_string(),
                reported_at: "2024-05-01T00:00:00Z".to_string(),
            });
        }
        assert_eq!(stats.ad_reports.len(), AD_REPORTS_CAP);
        assert!(stats.ad_reports[0].url.ends_with("/5"));
    }

    #[test]
    fn test_local_record_wire_names() {
        let stats = LocalStats::default();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"blockedAds\""));
        assert!(json.contains("\"statsHistory\""));
        assert!(json.contains("\"adReports\""));
    }
}
