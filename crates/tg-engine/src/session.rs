//! The observation-loop session.
//!
//! One `Session` owns everything the loop needs: settings, compiled rules,
//! the pattern table, the interception chain, the injected statistics sink
//! and the loop timing state. There is no ambient global; the host
//! constructs the session at startup and drives it with clock values, which
//! keeps every timing path testable.
//!
//! Two interleaved drivers feed the pipeline: a mutation-driven pass,
//! throttled to bound cost under bursty DOM churn, and a periodic polling
//! pass that catches ads appearing without an observed mutation and retries
//! skip/mute while an ad is active. A navigation watcher resets the
//! ad-active latch on page changes and holds both passes back for a short
//! settle delay so the loop never operates against stale DOM state.

use tg_core::classify::{decide, ClassifyContext};
use tg_core::patterns::PatternTable;
use tg_core::protocol::{Reply, Request, StatsSnapshot};
use tg_core::rules::{RuleSet, SelectorRule};
use tg_core::settings::RuntimeSettings;

use crate::actuate;
use crate::dom::{Dom, DomNode};
use crate::features::extract;
use crate::intercept::{InterceptorChain, PatternMiddleware, RequestOutcome};
use crate::stats::StatsSink;

// =============================================================================
// Loop configuration
// =============================================================================

/// Timing knobs for the observation loop, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    /// Minimum interval between mutation-driven sweeps.
    pub mutation_throttle_ms: f64,
    /// Period the host should drive `poll` at.
    pub poll_interval_ms: f64,
    /// How often the polling pass re-checks the page address.
    pub nav_check_interval_ms: f64,
    /// How long both passes hold back after a detected navigation.
    pub settle_delay_ms: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            mutation_throttle_ms: 100.0,
            poll_interval_ms: 500.0,
            nav_check_interval_ms: 1000.0,
            settle_delay_ms: 500.0,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// The observation-loop session object.
pub struct Session {
    settings: RuntimeSettings,
    config: LoopConfig,
    rules: RuleSet,
    skip_rules: Vec<SelectorRule>,
    indicator_rules: Vec<SelectorRule>,
    timeline_rules: Vec<SelectorRule>,
    chain: InterceptorChain,
    sink: Box<dyn StatsSink>,
    session_blocked: u64,
    session_total: u64,
    last_mutation_sweep_ms: Option<f64>,
    last_nav_check_ms: Option<f64>,
    last_url: String,
    settle_until_ms: Option<f64>,
    ad_active: bool,
    torn_down: bool,
}

impl Session {
    /// Create a session with the default loop timing and pattern table.
    pub fn new(settings: RuntimeSettings, sink: Box<dyn StatsSink>) -> Self {
        Self::with_config(settings, sink, LoopConfig::default(), PatternTable::defaults())
    }

    pub fn with_config(
        settings: RuntimeSettings,
        sink: Box<dyn StatsSink>,
        config: LoopConfig,
        patterns: PatternTable,
    ) -> Self {
        let rules = RuleSet::with_custom_rules(&settings.custom_rules);

        let mut chain = InterceptorChain::new();
        chain.register(Box::new(PatternMiddleware::new(patterns)));

        Self {
            settings,
            config,
            rules,
            skip_rules: actuate::skip_control_rules(),
            indicator_rules: actuate::ad_indicator_rules(),
            timeline_rules: actuate::timeline_marker_rules(),
            chain,
            sink,
            session_blocked: 0,
            session_total: 0,
            last_mutation_sweep_ms: None,
            last_nav_check_ms: None,
            last_url: String::new(),
            settle_until_ms: None,
            ad_active: false,
            torn_down: false,
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// The interception chain, for the host to claim the request wrapping.
    pub fn chain_mut(&mut self) -> &mut InterceptorChain {
        &mut self.chain
    }

    pub fn ad_active(&self) -> bool {
        self.ad_active
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Counters accumulated by this session.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocked_ads: self.session_blocked,
            total_ads: self.session_total,
            today_blocked: None,
        }
    }

    // =========================================================================
    // Drivers
    // =========================================================================

    /// Mutation-driven pass. At most one sweep per throttle window,
    /// whatever the mutation volume.
    pub fn on_mutation<D: Dom>(&mut self, dom: &D, now_ms: f64) -> usize {
        if self.torn_down {
            return 0;
        }
        if let Some(last) = self.last_mutation_sweep_ms {
            if now_ms - last < self.config.mutation_throttle_ms {
                return 0;
            }
        }
        self.last_mutation_sweep_ms = Some(now_ms);
        self.sweep(dom, now_ms)
    }

    /// Polling pass: navigation watch, full sweep, and video ad handling.
    pub fn poll<D: Dom>(&mut self, dom: &D, now_ms: f64) -> usize {
        if self.torn_down {
            return 0;
        }
        self.watch_navigation(dom, now_ms);
        if self.settling(now_ms) {
            return 0;
        }
        let blocked = self.sweep(dom, now_ms);
        self.drive_video(dom);
        blocked
    }

    /// Consult the interception chain for an outgoing request.
    pub fn handle_request(&mut self, url: &str) -> RequestOutcome {
        if self.torn_down || self.settings.is_paused {
            return RequestOutcome::PassThrough;
        }
        match self.chain.dispatch(url) {
            RequestOutcome::ShortCircuit => {
                self.count_blocked(1);
                RequestOutcome::ShortCircuit
            }
            RequestOutcome::PassThrough => RequestOutcome::PassThrough,
        }
    }

    /// Handle a protocol message. Returns the reply, when the message has
    /// one.
    pub fn handle_message(&mut self, request: Request) -> Option<Reply> {
        match request {
            Request::Ping => Some(Reply::ok()),
            Request::GetStats => Some(Reply::Stats(self.stats_snapshot())),
            Request::AdBlocked => {
                self.sink.ad_blocked();
                Some(Reply::ack())
            }
            Request::UpdateSettings { settings } => {
                self.rules = RuleSet::with_custom_rules(&settings.custom_rules);
                self.settings = settings;
                None
            }
            Request::TogglePause { paused } => {
                self.settings.is_paused = paused;
                None
            }
        }
    }

    /// Stop both passes. The host detaches observers and timers; already
    /// applied markers are left in place and die with the document.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.ad_active = false;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn settling(&self, now_ms: f64) -> bool {
        self.settle_until_ms.is_some_and(|until| now_ms < until)
    }

    fn count_blocked(&mut self, blocked: usize) {
        for _ in 0..blocked {
            self.sink.ad_blocked();
        }
        self.session_blocked += blocked as u64;
        self.session_total += blocked as u64;
    }

    /// One full classification sweep over the rule set.
    ///
    /// Idempotent per node: anything already carrying a blocked marker is
    /// skipped, so a second sweep over an unchanged DOM blocks nothing.
    fn sweep<D: Dom>(&mut self, dom: &D, now_ms: f64) -> usize {
        if self.torn_down || self.settings.is_paused || self.settling(now_ms) {
            return 0;
        }

        let hostname = dom.hostname();
        let mut blocked = 0usize;

        for rule in self.rules.iter() {
            let nodes = match dom.select(rule) {
                Ok(nodes) => nodes,
                Err(e) => {
                    log::warn!("selector {:?} failed, skipping rule: {}", rule.css(), e);
                    continue;
                }
            };

            for node in nodes {
                if !node.is_connected() || node.marker().is_some() {
                    continue;
                }

                let features = extract(&node);
                let ctx = ClassifyContext { hostname: &hostname, settings: &self.settings };
                let decision = decide(&features, Some(rule), &ctx);
                if !decision.should_block {
                    continue;
                }

                if actuate::hide_element(
                    dom,
                    &node,
                    &rule.css(),
                    now_ms,
                    self.settings.show_notifications,
                ) {
                    blocked += 1;
                }
            }
        }

        actuate::strip_timeline_markers(dom, &self.timeline_rules);

        self.count_blocked(blocked);
        blocked
    }

    /// Retry skip/mute while an ad is judged active, restore playback once
    /// it no longer is.
    fn drive_video<D: Dom>(&mut self, dom: &D) {
        if self.settings.is_paused {
            return;
        }

        let active = self.ad_is_active(dom);
        if active {
            if self.settings.auto_skip_ads && self.settings.block_video_ads {
                let outcome = actuate::skip_video(dom, &self.skip_rules);
                // Count once per ad, at latch onset.
                if outcome.skipped() && !self.ad_active {
                    self.count_blocked(1);
                }
            }
        } else if self.ad_active {
            actuate::restore_playback(dom);
        }
        self.ad_active = active;
    }

    /// Union of the ad-active indicators: a visible indicator element, ad
    /// markers in the page address, or a playing video short enough to be
    /// an ad on its own.
    fn ad_is_active<D: Dom>(&self, dom: &D) -> bool {
        for rule in &self.indicator_rules {
            match dom.select(rule) {
                Ok(nodes) => {
                    if nodes.iter().any(|node| node.is_connected() && node.is_visible()) {
                        return true;
                    }
                }
                Err(e) => log::debug!("indicator lookup failed: {}", e),
            }
        }

        let url = dom.page_url();
        if url.contains("ad_format=") || url.contains("ad_type=") {
            return true;
        }

        if let Some(state) = dom.video_state() {
            if state.duration.is_finite()
                && state.duration > 0.0
                && state.duration < actuate::SHORT_AD_SIGNAL_SECS
            {
                return true;
            }
        }

        false
    }

    fn watch_navigation<D: Dom>(&mut self, dom: &D, now_ms: f64) {
        if let Some(last) = self.last_nav_check_ms {
            if now_ms - last < self.config.nav_check_interval_ms {
                return;
            }
        }
        self.last_nav_check_ms = Some(now_ms);

        let url = dom.page_url();
        if self.last_url.is_empty() {
            self.last_url = url;
            return;
        }
        if url != self.last_url {
            log::debug!("navigation detected: {}", url);
            self.last_url = url;
            self.ad_active = false;
            self.settle_until_ms = Some(now_ms + self.config.settle_delay_ms);
        }
    }
}
