//! WebAssembly bindings for TubeGuard
//!
//! The extension's JS glue calls the flat function surface exported here:
//! `init` builds the session and wires the mutation observer and the poll
//! timer, `handle_request` backs the request wrapper, `handle_message`
//! answers popup/background messages, `teardown` detaches everything.
//! Page DOM access goes through `PageDom`, the `web-sys` implementation of
//! the engine's `Dom` trait.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use tg_core::patterns::PatternTable;
use tg_core::payload;
use tg_core::protocol::{Reply, Request};
use tg_core::rules::SelectorRule;
use tg_core::settings::RuntimeSettings;
use tg_core::types::{BlockedMarker, BoundingBox};
use tg_engine::dom::{Dom, DomError, DomNode, VideoState};
use tg_engine::intercept::RequestOutcome;
use tg_engine::session::{LoopConfig, Session};
use tg_engine::stats::{NullSink, StatsSink};

// Marker attributes stamped on blocked nodes.
const MARKER_FLAG_ATTR: &str = "data-tg-blocked";
const MARKER_REASON_ATTR: &str = "data-tg-reason";
const MARKER_AT_ATTR: &str = "data-tg-blocked-at";
const MARKER_DISPLAY_ATTR: &str = "data-tg-display";
const MARKER_VISIBILITY_ATTR: &str = "data-tg-visibility";

const NOTIFICATION_DISMISS_MS: i32 = 3000;

// =============================================================================
// Page state
// =============================================================================

struct PageState {
    session: Session,
    dom: PageDom,
    observer: Option<web_sys::MutationObserver>,
    interval_id: Option<i32>,
    // Callbacks stay alive for the page lifetime.
    _mutation_cb: Option<Closure<dyn FnMut()>>,
    _poll_cb: Option<Closure<dyn FnMut()>>,
}

thread_local! {
    static STATE: RefCell<Option<PageState>> = const { RefCell::new(None) };
}

fn with_state<R>(f: impl FnOnce(&mut PageState) -> R) -> Option<R> {
    STATE.with(|slot| slot.borrow_mut().as_mut().map(f))
}

// =============================================================================
// Exports
// =============================================================================

/// Build the session and start both observation drivers.
///
/// `config` is an optional object: `{settings?: object, patterns?:
/// string[], sendMessage?: function}`. Absent fields fall back to defaults;
/// `sendMessage` receives fire-and-forget statistics messages.
#[wasm_bindgen]
pub fn init(config: JsValue) -> Result<(), JsValue> {
    init_logging();

    if STATE.with(|slot| slot.borrow().is_some()) {
        return Err(JsValue::from_str("Already initialized. Call teardown() first."));
    }

    let dom = PageDom::new().map_err(|e| JsValue::from_str(&e.to_string()))?;

    let settings_value =
        js_sys::Reflect::get(&config, &"settings".into()).unwrap_or(JsValue::UNDEFINED);
    let settings: RuntimeSettings = if settings_value.is_undefined() || settings_value.is_null() {
        RuntimeSettings::default()
    } else {
        let json: String = js_sys::JSON::stringify(&settings_value)
            .map(String::from)
            .map_err(|_| JsValue::from_str("settings must be a plain object"))?;
        serde_json::from_str(&json)
            .map_err(|e| JsValue::from_str(&format!("invalid settings: {e}")))?
    };

    let patterns_value =
        js_sys::Reflect::get(&config, &"patterns".into()).unwrap_or(JsValue::UNDEFINED);
    let patterns = if js_sys::Array::is_array(&patterns_value) {
        let sources: Vec<String> = js_sys::Array::from(&patterns_value)
            .iter()
            .filter_map(|value| value.as_string())
            .collect();
        PatternTable::from_sources(&sources)
    } else {
        PatternTable::defaults()
    };

    let sink: Box<dyn StatsSink> = match js_sys::Reflect::get(&config, &"sendMessage".into())
        .ok()
        .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
    {
        Some(function) => Box::new(MessageSink { send: function }),
        None => Box::new(NullSink),
    };

    let mut session = Session::with_config(settings, sink, LoopConfig::default(), patterns);
    // Claim the request wrapping. init() refuses to run twice, so the page
    // primitive is wrapped at most once per lifetime.
    let _ = session.chain_mut().try_install();

    let mut state = PageState {
        session,
        dom,
        observer: None,
        interval_id: None,
        _mutation_cb: None,
        _poll_cb: None,
    };
    install_observer(&mut state)?;
    install_poll_timer(&mut state)?;

    STATE.with(|slot| *slot.borrow_mut() = Some(state));
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    STATE.with(|slot| slot.borrow().is_some())
}

/// Consult the interception chain for an outgoing request. Returns true
/// when the request must be terminated with an empty success response.
#[wasm_bindgen]
pub fn handle_request(url: &str) -> bool {
    with_state(|state| state.session.handle_request(url) == RequestOutcome::ShortCircuit)
        .unwrap_or(false)
}

/// Handle a protocol message (JSON in, JSON out; null when the message has
/// no reply). Unparseable messages answer with an error status.
#[wasm_bindgen]
pub fn handle_message(message: &str) -> JsValue {
    let request: Request = match serde_json::from_str(message) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("unparseable message: {}", e);
            return reply_to_js(&Reply::error());
        }
    };

    match with_state(|state| state.session.handle_message(request)).flatten() {
        Some(reply) => reply_to_js(&reply),
        None => JsValue::NULL,
    }
}

/// Run one polling pass immediately. Returns the number of elements
/// blocked by the pass.
#[wasm_bindgen]
pub fn run_sweep() -> u32 {
    with_state(|state| {
        let now = js_sys::Date::now();
        state.session.poll(&state.dom, now) as u32
    })
    .unwrap_or(0)
}

/// True when the URL addresses a player API endpoint whose response body
/// should be passed to [`sanitize_player_response`].
#[wasm_bindgen]
pub fn is_player_api_url(url: &str) -> bool {
    payload::is_player_api_url(url)
}

/// Strip the ad schedule from a player response body. Returns the
/// rewritten body, or null when the original should be forwarded as-is.
#[wasm_bindgen]
pub fn sanitize_player_response(body: &str) -> JsValue {
    match payload::sanitize_player_payload(body) {
        Some(clean) => JsValue::from_str(&clean),
        None => JsValue::NULL,
    }
}

/// Detach observers and timers and drop the session. Markers already
/// stamped on the page are left to die with the document.
#[wasm_bindgen]
pub fn teardown() {
    STATE.with(|slot| {
        let Some(mut state) = slot.borrow_mut().take() else {
            return;
        };
        state.session.teardown();
        if let Some(observer) = state.observer.take() {
            observer.disconnect();
        }
        if let (Some(id), Some(window)) = (state.interval_id.take(), web_sys::window()) {
            window.clear_interval_with_handle(id);
        }
    });
}

fn reply_to_js(reply: &Reply) -> JsValue {
    match serde_json::to_string(reply) {
        Ok(json) => JsValue::from_str(&json),
        Err(_) => JsValue::NULL,
    }
}

// =============================================================================
// Loop wiring
// =============================================================================

fn install_observer(state: &mut PageState) -> Result<(), JsValue> {
    let callback = Closure::wrap(Box::new(|| {
        let _ = with_state(|state| {
            let now = js_sys::Date::now();
            state.session.on_mutation(&state.dom, now)
        });
    }) as Box<dyn FnMut()>);

    let observer = web_sys::MutationObserver::new(callback.as_ref().unchecked_ref())?;
    if let Some(root) = state.dom.document_element() {
        let options = web_sys::MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        observer.observe_with_options(&root, &options)?;
    }

    state.observer = Some(observer);
    state._mutation_cb = Some(callback);
    Ok(())
}

fn install_poll_timer(state: &mut PageState) -> Result<(), JsValue> {
    let callback = Closure::wrap(Box::new(|| {
        let _ = with_state(|state| {
            let now = js_sys::Date::now();
            state.session.poll(&state.dom, now)
        });
    }) as Box<dyn FnMut()>);

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let interval_ms = state.session.config().poll_interval_ms as i32;
    let id = window.set_interval_with_callback_and_timeout_and_arguments_0(
        callback.as_ref().unchecked_ref(),
        interval_ms,
    )?;

    state.interval_id = Some(id);
    state._poll_cb = Some(callback);
    Ok(())
}

// =============================================================================
// Statistics sink
// =============================================================================

/// Forwards blocked-ad events to the extension messaging glue. Errors are
/// swallowed: the background side being unreachable mid-reload must never
/// surface into the loop.
struct MessageSink {
    send: js_sys::Function,
}

impl StatsSink for MessageSink {
    fn ad_blocked(&self) {
        let message = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&message, &"action".into(), &"adBlocked".into());
        let _ = self.send.call1(&JsValue::NULL, &message);
    }
}

// =============================================================================
// Page DOM adapter
// =============================================================================

fn host_err(value: JsValue) -> DomError {
    DomError::Host(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

/// One element of the live page.
#[derive(Clone)]
pub struct PageNode {
    element: web_sys::Element,
}

impl PageNode {
    fn html(&self) -> Option<&web_sys::HtmlElement> {
        self.element.dyn_ref::<web_sys::HtmlElement>()
    }
}

impl DomNode for PageNode {
    fn tag_name(&self) -> String {
        self.element.tag_name().to_ascii_lowercase()
    }

    fn id(&self) -> String {
        self.element.id()
    }

    fn class_names(&self) -> Vec<String> {
        let list = self.element.class_list();
        (0..list.length()).filter_map(|i| list.get(i)).collect()
    }

    fn text(&self, max_len: usize) -> String {
        self.element
            .text_content()
            .unwrap_or_default()
            .chars()
            .take(max_len)
            .collect()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.element
            .get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .filter_map(|name| {
                self.element
                    .get_attribute(&name)
                    .map(|value| (name, value))
            })
            .collect()
    }

    fn bounding_box(&self) -> BoundingBox {
        let rect = self.element.get_bounding_client_rect();
        BoundingBox::new(
            rect.x() as f32,
            rect.y() as f32,
            rect.width() as f32,
            rect.height() as f32,
        )
    }

    fn is_visible(&self) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };

        if let Ok(Some(style)) = window.get_computed_style(&self.element) {
            let display = style.get_property_value("display").unwrap_or_default();
            let visibility = style.get_property_value("visibility").unwrap_or_default();
            let opacity = style.get_property_value("opacity").unwrap_or_default();
            if display == "none" || visibility == "hidden" {
                return false;
            }
            if opacity.parse::<f32>().map(|o| o <= 0.0).unwrap_or(false) {
                return false;
            }
            // Layout participation: a render parent, or fixed positioning
            // (which never has an offsetParent).
            if let Some(html) = self.html() {
                let position = style.get_property_value("position").unwrap_or_default();
                return html.offset_parent().is_some() || position == "fixed";
            }
        }

        self.element.is_connected()
    }

    fn child_count(&self) -> usize {
        self.element.child_element_count() as usize
    }

    fn parent_class_names(&self) -> Vec<String> {
        match self.element.parent_element() {
            Some(parent) => {
                let list = parent.class_list();
                (0..list.length()).filter_map(|i| list.get(i)).collect()
            }
            None => Vec::new(),
        }
    }

    fn is_connected(&self) -> bool {
        self.element.is_connected()
    }

    fn marker(&self) -> Option<BlockedMarker> {
        self.element.get_attribute(MARKER_FLAG_ATTR)?;
        Some(BlockedMarker {
            reason: self.element.get_attribute(MARKER_REASON_ATTR).unwrap_or_default(),
            blocked_at_ms: self
                .element
                .get_attribute(MARKER_AT_ATTR)
                .and_then(|value| value.parse().ok())
                .unwrap_or(0.0),
            original_display: self
                .element
                .get_attribute(MARKER_DISPLAY_ATTR)
                .unwrap_or_default(),
            original_visibility: self
                .element
                .get_attribute(MARKER_VISIBILITY_ATTR)
                .unwrap_or_default(),
        })
    }

    fn set_marker(&self, marker: &BlockedMarker) -> Result<(), DomError> {
        self.element
            .set_attribute(MARKER_FLAG_ATTR, "1")
            .map_err(host_err)?;
        self.element
            .set_attribute(MARKER_REASON_ATTR, &marker.reason)
            .map_err(host_err)?;
        self.element
            .set_attribute(MARKER_AT_ATTR, &marker.blocked_at_ms.to_string())
            .map_err(host_err)?;
        self.element
            .set_attribute(MARKER_DISPLAY_ATTR, &marker.original_display)
            .map_err(host_err)?;
        self.element
            .set_attribute(MARKER_VISIBILITY_ATTR, &marker.original_visibility)
            .map_err(host_err)?;
        Ok(())
    }

    fn style_value(&self, property: &str) -> String {
        match self.html() {
            Some(html) => html.style().get_property_value(property).unwrap_or_default(),
            None => String::new(),
        }
    }

    fn set_style(&self, property: &str, value: &str) -> Result<(), DomError> {
        let html = self
            .html()
            .ok_or(DomError::ApiUnavailable("inline style"))?;
        // Important priority: either plain value alone can be reverted by
        // site script.
        html.style()
            .set_property_with_priority(property, value, "important")
            .map_err(host_err)
    }

    fn click(&self) -> Result<(), DomError> {
        match self.html() {
            Some(html) => {
                html.click();
                Ok(())
            }
            None => Err(DomError::ApiUnavailable("click")),
        }
    }

    fn remove(&self) -> Result<(), DomError> {
        self.element.remove();
        Ok(())
    }
}

/// The live document of the target site.
pub struct PageDom {
    window: web_sys::Window,
    document: web_sys::Document,
}

impl PageDom {
    fn new() -> Result<Self, DomError> {
        let window = web_sys::window().ok_or(DomError::ApiUnavailable("window"))?;
        let document = window.document().ok_or(DomError::ApiUnavailable("document"))?;
        Ok(Self { window, document })
    }

    fn document_element(&self) -> Option<web_sys::Element> {
        self.document.document_element()
    }

    fn video_element(&self) -> Option<web_sys::HtmlMediaElement> {
        self.document
            .query_selector("video")
            .ok()
            .flatten()?
            .dyn_into::<web_sys::HtmlMediaElement>()
            .ok()
    }
}

impl Dom for PageDom {
    type Node = PageNode;

    fn page_url(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn hostname(&self) -> String {
        self.window
            .location()
            .hostname()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    fn select(&self, rule: &SelectorRule) -> Result<Vec<PageNode>, DomError> {
        let selector = rule.css();
        let list = self
            .document
            .query_selector_all(&selector)
            .map_err(|_| DomError::InvalidSelector(selector))?;

        let mut nodes = Vec::with_capacity(list.length() as usize);
        for i in 0..list.length() {
            if let Some(node) = list.get(i) {
                if let Ok(element) = node.dyn_into::<web_sys::Element>() {
                    nodes.push(PageNode { element });
                }
            }
        }
        Ok(nodes)
    }

    fn video_state(&self) -> Option<VideoState> {
        let video = self.video_element()?;
        Some(VideoState {
            duration: video.duration(),
            current_time: video.current_time(),
            paused: video.paused(),
            muted: video.muted(),
            playback_rate: video.playback_rate(),
        })
    }

    fn seek_video(&self, position: f64) -> Result<(), DomError> {
        let video = self.video_element().ok_or(DomError::NodeGone)?;
        video.set_current_time(position);
        Ok(())
    }

    fn set_video_muted(&self, muted: bool) -> Result<(), DomError> {
        let video = self.video_element().ok_or(DomError::NodeGone)?;
        video.set_muted(muted);
        Ok(())
    }

    fn set_video_playback_rate(&self, rate: f64) -> Result<(), DomError> {
        let video = self.video_element().ok_or(DomError::NodeGone)?;
        video.set_playback_rate(rate);
        Ok(())
    }

    fn notify(&self, message: &str) {
        let Ok(toast) = self.document.create_element("div") else {
            return;
        };
        toast.set_text_content(Some(message));
        let _ = toast.set_attribute(
            "style",
            "position:fixed;top:16px;right:16px;z-index:999999;\
             background:#202124;color:#fff;padding:8px 14px;border-radius:6px;\
             font:13px sans-serif;opacity:.92;",
        );

        let Some(body) = self.document.body() else {
            return;
        };
        if body.append_child(&toast).is_err() {
            return;
        }

        let node = toast.clone();
        let dismiss = Closure::once_into_js(move || {
            node.remove();
        });
        let _ = self.window.set_timeout_with_callback_and_timeout_and_arguments_0(
            dismiss.unchecked_ref(),
            NOTIFICATION_DISMISS_MS,
        );
    }
}

// =============================================================================
// Logging
// =============================================================================

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let message = JsValue::from_str(&format!("[tubeguard] {}", record.args()));
        if record.level() <= log::Level::Warn {
            web_sys::console::warn_1(&message);
        } else {
            web_sys::console::log_1(&message);
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn init_logging() {
    // Fails when already installed; that is fine.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
}
