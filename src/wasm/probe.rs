//! `RangeProbe`: the exported browser surface.
//!
//! Wrapped primitives are plain JS functions handed back to the embedder,
//! which installs them wherever it wants (interface substitution, not
//! global patching). The scan driver owns exactly one `setTimeout` handle
//! and one `MutationObserver`, reconciled with the controller after every
//! event.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use tracing::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Element, MessageEvent, MutationObserver, MutationObserverInit, Request};

use super::describe_js;
use super::payload::JsPayload;
use super::storage::WebSessionStorage;
use crate::config::ProbeConfig;
use crate::dom::{RangeScanController, ScanReport};
use crate::error::ProbeError;
use crate::intercept::{Channel, InstrumentationFacade, NetworkInterceptor, Observation, OutboundRequest, RequestBody};
use crate::session::{MemoryStorage, SessionContext, SessionHandle, SessionStorage, SystemClock};

#[wasm_bindgen(inline_js = "export function withReceiver(observe, real) {
  return function (...args) {
    try { observe(this, args); } catch (_) {}
    return real.apply(this, args);
  };
}")]
extern "C" {
    /// A function that hands its receiver and arguments to `observe`, then
    /// forwards both to `real` and returns its result.
    #[wasm_bindgen(js_name = withReceiver)]
    fn with_receiver(observe: &JsValue, real: &js_sys::Function) -> js_sys::Function;
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_error(err: ProbeError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn page() -> Option<(Element, String)> {
    let window = web_sys::window()?;
    let root = window.document()?.document_element()?;
    let href = window.location().href().ok()?;
    Some((root, href))
}

fn present(value: &JsValue) -> bool {
    !value.is_undefined() && !value.is_null()
}

fn field(object: &JsValue, name: &str) -> Option<JsValue> {
    if !object.is_object() {
        return None;
    }
    js_sys::Reflect::get(object, &JsValue::from_str(name))
        .ok()
        .filter(present)
}

/// Name of the value's constructor, `"Object"` when it has none
/// (null-prototype objects) or reading it throws.
fn constructor_name(value: &JsValue) -> String {
    field(value, "constructor")
        .and_then(|c| c.dyn_into::<js_sys::Function>().ok())
        .and_then(|c| js_sys::Reflect::get(&c, &JsValue::from_str("name")).ok())
        .and_then(|n| n.as_string())
        .unwrap_or_else(|| "Object".to_string())
}

/// `String(value)` through the value's own `toString`, `None` if it throws.
fn stringify(value: &JsValue) -> Option<String> {
    field(value, "toString")
        .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
        .and_then(|f| f.call0(value).ok())
        .and_then(|s| s.as_string())
}

/// Map a JS body onto what the interceptor can decode. Plain objects and
/// arrays go through `JSON.stringify`, so cyclic ones come back opaque.
fn body_from_js(value: &JsValue) -> Option<RequestBody> {
    if !present(value) {
        return None;
    }
    if let Some(text) = value.as_string() {
        return Some(RequestBody::Text(text));
    }
    if !value.is_object() {
        return Some(RequestBody::Opaque);
    }
    let body = match constructor_name(value).as_str() {
        "URLSearchParams" => stringify(value).map(RequestBody::Text),
        "Object" | "Array" => js_sys::JSON::stringify(value)
            .ok()
            .and_then(|s| s.as_string())
            .map(RequestBody::Text),
        _ => None,
    };
    Some(body.unwrap_or(RequestBody::Opaque))
}

/// Observe one `fetch(input, init)` call. Bodies of `Request` inputs are
/// read from a copy on a separate task so the caller's request is never
/// consumed or delayed.
fn observe_fetch(interceptor: &Rc<NetworkInterceptor>, input: &JsValue, init: &JsValue) {
    if let Some(request) = input.dyn_ref::<Request>() {
        let method = request.method();
        let url = request.url();
        if OutboundRequest::new(&method, &url, None).is_retrieval() {
            interceptor.observe_request(&OutboundRequest::new(&method, &url, None));
            return;
        }
        let copy: Result<Request, JsValue> = request.clone();
        let Some(text) = copy.ok().and_then(|c| c.text().ok()) else {
            interceptor.observe_request(&OutboundRequest::new(&method, &url, Some(RequestBody::Opaque)));
            return;
        };
        let interceptor = Rc::clone(interceptor);
        spawn_local(async move {
            let body = JsFuture::from(text).await.ok().and_then(|t| t.as_string()).map(RequestBody::Text);
            interceptor.observe_request(&OutboundRequest::new(&method, &url, body));
        });
        return;
    }

    let Some(url) = input.as_string().or_else(|| stringify(input)) else {
        return;
    };
    let method = field(init, "method")
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| "GET".to_string());
    let body = field(init, "body").and_then(|b| body_from_js(&b));
    interceptor.observe_request(&OutboundRequest::new(&method, &url, body));
}

// =============================================================================
// Scan driver
// =============================================================================

struct ScanRuntime {
    controller: RefCell<RangeScanController>,
    observer: RefCell<Option<MutationObserver>>,
    timer: Cell<Option<i32>>,
    on_timer: RefCell<Option<Closure<dyn FnMut()>>>,
    on_mutation: RefCell<Option<Closure<dyn FnMut(js_sys::Array, MutationObserver)>>>,
}

impl ScanRuntime {
    fn new(controller: RangeScanController) -> Rc<Self> {
        let runtime = Rc::new(Self {
            controller: RefCell::new(controller),
            observer: RefCell::new(None),
            timer: Cell::new(None),
            on_timer: RefCell::new(None),
            on_mutation: RefCell::new(None),
        });

        let weak = Rc::downgrade(&runtime);
        let on_timer = Closure::wrap(Box::new(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.fire_timer();
            }
        }) as Box<dyn FnMut()>);

        let weak = Rc::downgrade(&runtime);
        let on_mutation = Closure::wrap(Box::new(move |_records: js_sys::Array, _observer: MutationObserver| {
            if let Some(runtime) = weak.upgrade() {
                runtime.structure_changed();
            }
        }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        *runtime.on_timer.borrow_mut() = Some(on_timer);
        *runtime.on_mutation.borrow_mut() = Some(on_mutation);
        runtime
    }

    fn activate(&self) -> Result<ScanReport, ProbeError> {
        let (root, href) = page().ok_or_else(|| ProbeError::internal("no document to scan"))?;
        let report = self.controller.borrow_mut().activate(&root, &href);
        self.sync();
        Ok(report)
    }

    fn fire_timer(&self) {
        self.timer.set(None);
        match page() {
            Some((root, href)) => {
                self.controller.borrow_mut().on_timer(&root, &href);
            }
            None => self.controller.borrow_mut().cancel(),
        }
        self.sync();
    }

    fn structure_changed(&self) {
        self.controller.borrow_mut().on_structure_change();
        self.sync();
    }

    /// Bring the observer and timer in line with the controller.
    fn sync(&self) {
        let (watching, wakeup) = {
            let controller = self.controller.borrow();
            (controller.is_watching(), controller.next_wakeup())
        };
        if !watching {
            self.teardown();
            return;
        }
        if let Err(e) = self.ensure_observer() {
            warn!(reason = %describe_js(&e), "mutation watch unavailable, relying on seed rescans");
        }
        self.schedule(wakeup);
    }

    fn ensure_observer(&self) -> Result<(), JsValue> {
        if self.observer.borrow().is_some() {
            return Ok(());
        }
        let Some((root, _)) = page() else {
            return Ok(());
        };
        let callback = self.on_mutation.borrow();
        let Some(callback) = callback.as_ref() else {
            return Ok(());
        };
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let options = MutationObserverInit::new();
        options.set_subtree(true);
        options.set_child_list(true);
        options.set_attributes(true);
        observer.observe_with_options(&root, &options)?;
        *self.observer.borrow_mut() = Some(observer);
        Ok(())
    }

    fn schedule(&self, wakeup: Option<f64>) {
        self.clear_timer();
        let (Some(at), Some(window)) = (wakeup, web_sys::window()) else {
            return;
        };
        let delay = (at - js_sys::Date::now()).max(0.0).ceil() as i32;
        let callback = self.on_timer.borrow();
        let Some(callback) = callback.as_ref() else {
            return;
        };
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), delay) {
            Ok(handle) => self.timer.set(Some(handle)),
            Err(e) => warn!(reason = %describe_js(&e), "could not schedule rescan"),
        }
    }

    fn clear_timer(&self) {
        if let Some(handle) = self.timer.take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(handle);
            }
        }
    }

    fn teardown(&self) {
        self.clear_timer();
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
    }
}

// =============================================================================
// RangeProbe
// =============================================================================

#[wasm_bindgen]
pub struct RangeProbe {
    session: SessionHandle,
    interceptor: Rc<NetworkInterceptor>,
    facade: InstrumentationFacade,
    scans: Rc<ScanRuntime>,
    /// `XMLHttpRequest` object -> `[method, url]` from its last `open`.
    xhr_targets: js_sys::WeakMap,
}

#[wasm_bindgen]
impl RangeProbe {
    /// `config` is a partial `ProbeConfig` object; missing fields default.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<RangeProbe, JsValue> {
        let config = if present(&config) {
            serde_wasm_bindgen::from_value::<ProbeConfig>(config)
                .map_err(|e| js_error(ProbeError::config(e.to_string())))?
        } else {
            ProbeConfig::default()
        };
        config.validate().map_err(js_error)?;

        let storage: Box<dyn SessionStorage> = match WebSessionStorage::session() {
            Some(storage) => Box::new(storage),
            None => {
                warn!("sessionStorage unavailable, state will not survive navigation");
                Box::new(MemoryStorage::new())
            }
        };
        let page_url = web_sys::window().and_then(|w| w.location().href().ok());

        let session = SessionContext::start(config, storage, SystemClock).into_handle();
        let interceptor = Rc::new(NetworkInterceptor::new(session.clone(), page_url.as_deref()).map_err(js_error)?);
        let controller = RangeScanController::new(session.clone()).map_err(js_error)?;

        info!(page = ?page_url, armed = session.borrow().is_armed(), "range probe ready");
        Ok(RangeProbe {
            facade: InstrumentationFacade::new(Rc::clone(&interceptor)),
            session,
            interceptor,
            scans: ScanRuntime::new(controller),
            xhr_targets: js_sys::WeakMap::new(),
        })
    }

    pub fn arm(&self, duration_ms: Option<f64>) {
        self.session.borrow_mut().arm(duration_ms);
    }

    pub fn reset(&self) {
        self.session.borrow_mut().reset_learning();
    }

    #[wasm_bindgen(js_name = isArmed)]
    pub fn is_armed(&self) -> bool {
        self.session.borrow().is_armed()
    }

    /// Wrap a `fetch`-compatible function. Anything else comes back
    /// unchanged and the request channel stays inactive.
    #[wasm_bindgen(js_name = wrapFetch)]
    pub fn wrap_fetch(&mut self, fetch: JsValue) -> JsValue {
        let Some(real) = fetch.dyn_ref::<js_sys::Function>().cloned() else {
            self.facade.mark_unavailable(Channel::Request, "fetch is not a function");
            return fetch;
        };
        self.facade.mark_active(Channel::Request);

        let interceptor = Rc::clone(&self.interceptor);
        let observe = Closure::wrap(Box::new(move |_this: JsValue, args: js_sys::Array| {
            observe_fetch(&interceptor, &args.get(0), &args.get(1));
        }) as Box<dyn FnMut(JsValue, js_sys::Array)>);
        with_receiver(&observe.into_js_value(), &real).into()
    }

    /// Wrap a `postMessage`-compatible function.
    #[wasm_bindgen(js_name = wrapPostMessage)]
    pub fn wrap_post_message(&mut self, post: JsValue) -> JsValue {
        let Some(real) = post.dyn_ref::<js_sys::Function>().cloned() else {
            self.facade.mark_unavailable(Channel::OutboundMessage, "postMessage is not a function");
            return post;
        };
        self.facade.mark_active(Channel::OutboundMessage);

        let interceptor = Rc::clone(&self.interceptor);
        let observe = Closure::wrap(Box::new(move |_this: JsValue, args: js_sys::Array| {
            let target = args.get(1).as_string().unwrap_or_default();
            interceptor.observe_outbound_message(&JsPayload::new(args.get(0)), &target);
        }) as Box<dyn FnMut(JsValue, js_sys::Array)>);
        with_receiver(&observe.into_js_value(), &real).into()
    }

    /// Wrap `XMLHttpRequest.prototype.open`. The target is remembered per
    /// request object for the matching `send`.
    #[wasm_bindgen(js_name = wrapXhrOpen)]
    pub fn wrap_xhr_open(&mut self, open: JsValue) -> JsValue {
        let Some(real) = open.dyn_ref::<js_sys::Function>().cloned() else {
            self.facade.mark_unavailable(Channel::CallbackRequest, "XMLHttpRequest.open is not a function");
            return open;
        };

        let targets = self.xhr_targets.clone();
        let observe = Closure::wrap(Box::new(move |this: JsValue, args: js_sys::Array| {
            let Some(xhr) = this.dyn_ref::<js_sys::Object>() else {
                return;
            };
            let method = args.get(0).as_string().unwrap_or_else(|| "GET".to_string());
            let url = args.get(1);
            if let Some(url) = url.as_string().or_else(|| stringify(&url)) {
                let target = js_sys::Array::of2(&JsValue::from_str(&method), &JsValue::from_str(&url));
                targets.set(xhr, &target);
            }
        }) as Box<dyn FnMut(JsValue, js_sys::Array)>);
        with_receiver(&observe.into_js_value(), &real).into()
    }

    /// Wrap `XMLHttpRequest.prototype.send`; inspects the target recorded by
    /// the wrapped `open` together with the body.
    #[wasm_bindgen(js_name = wrapXhrSend)]
    pub fn wrap_xhr_send(&mut self, send: JsValue) -> JsValue {
        let Some(real) = send.dyn_ref::<js_sys::Function>().cloned() else {
            self.facade.mark_unavailable(Channel::CallbackRequest, "XMLHttpRequest.send is not a function");
            return send;
        };
        self.facade.mark_active(Channel::CallbackRequest);

        let targets = self.xhr_targets.clone();
        let interceptor = Rc::clone(&self.interceptor);
        let observe = Closure::wrap(Box::new(move |this: JsValue, args: js_sys::Array| {
            let Some(xhr) = this.dyn_ref::<js_sys::Object>() else {
                return;
            };
            let target = targets.get(xhr);
            let (Some(method), Some(url)) = (
                js_sys::Reflect::get_u32(&target, 0).ok().and_then(|m| m.as_string()),
                js_sys::Reflect::get_u32(&target, 1).ok().and_then(|u| u.as_string()),
            ) else {
                return;
            };
            let body = body_from_js(&args.get(0));
            interceptor.observe_request(&OutboundRequest::new(&method, &url, body));
        }) as Box<dyn FnMut(JsValue, js_sys::Array)>);
        with_receiver(&observe.into_js_value(), &real).into()
    }

    /// Listener for `message` events: applies directives, inspects the rest.
    #[wasm_bindgen(js_name = messageListener)]
    pub fn message_listener(&mut self) -> JsValue {
        self.facade.mark_active(Channel::InboundMessage);
        let interceptor = Rc::clone(&self.interceptor);
        let listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            interceptor.observe_inbound_message(&JsPayload::new(event.data()), &event.origin());
        }) as Box<dyn FnMut(MessageEvent)>);
        listener.into_js_value()
    }

    /// Observe a request issued through some other channel. Returns the
    /// number of hits it produced.
    #[wasm_bindgen(js_name = observeRequest)]
    pub fn observe_request(&self, method: &str, url: &str, body: JsValue) -> u32 {
        let request = OutboundRequest::new(method, url, body_from_js(&body));
        match self.interceptor.observe_request(&request) {
            Observation::Inspected { hits } => hits as u32,
            _ => 0,
        }
    }

    /// One-shot sniff of `localStorage` and `sessionStorage`, skipping this
    /// probe's own keys.
    #[wasm_bindgen(js_name = snapshotStorage)]
    pub fn snapshot_storage(&self) -> u32 {
        let prefix = format!("{}.", self.session.borrow().config().storage.key_prefix);
        let mut entries = Vec::new();
        for area in [WebSessionStorage::local(), WebSessionStorage::session()].into_iter().flatten() {
            entries.extend(area.entries().into_iter().filter(|(k, _)| !k.starts_with(&prefix)));
        }
        self.interceptor.snapshot_storage(&entries) as u32
    }

    /// Start a scan activation; returns the first-pass report.
    pub fn scan(&self) -> Result<JsValue, JsValue> {
        let report = self.scans.activate().map_err(js_error)?;
        to_js(&report)
    }

    /// Watchdog: the summary of a window that just closed, else `null`.
    pub fn tick(&self) -> Result<JsValue, JsValue> {
        to_js(&self.interceptor.tick())
    }

    pub fn hits(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.borrow().sink().hits())
    }

    #[wasm_bindgen(js_name = scanResults)]
    pub fn scan_results(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.borrow().sink().scan())
    }

    pub fn learned(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.borrow().learned())
    }

    pub fn channels(&self) -> Result<JsValue, JsValue> {
        to_js(self.facade.channels())
    }
}

impl Drop for RangeProbe {
    fn drop(&mut self) {
        self.scans.controller.borrow_mut().cancel();
        self.scans.teardown();
    }
}
