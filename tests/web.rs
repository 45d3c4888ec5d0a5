//! Browser-only checks for the wasm bindings. Run with
//! `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use rangetap::wasm::{JsPayload, RangeProbe};
use rangetap::{DateExtractor, KeyClassifier};
use js_sys::Function;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn cyclic_js_object_terminates() {
    let obj = js_sys::Object::new();
    js_sys::Reflect::set(&obj, &"checkIn".into(), &"2024-03-01".into()).unwrap();
    js_sys::Reflect::set(&obj, &"self".into(), &obj).unwrap();

    let classifier = KeyClassifier::default();
    let hits = DateExtractor::new(&classifier, &[], 3).extract(&JsPayload::new(obj.into()));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "checkIn");
}

#[wasm_bindgen_test]
fn js_dates_and_arrays() {
    let payload = js_sys::JSON::parse(r#"{"stay": {"checkOut": [1700259200]}}"#).unwrap();
    let classifier = KeyClassifier::default();
    let hits = DateExtractor::new(&classifier, &[], 3).extract(&JsPayload::new(payload));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].iso, "2023-11-17T22:13:20.000Z");
}

#[wasm_bindgen_test]
fn pinned_endpoint_observed() {
    let tap = armed_on_pricing();
    assert!(tap.is_armed());

    let body = JsValue::from_str(r#"{"checkInDate": 1700000000, "checkOutDate": 1700259200}"#);
    assert_eq!(tap.observe_request("POST", "https://api.example.com/pricing", body), 2);
    assert_eq!(tap.observe_request("GET", "https://api.example.com/search?checkIn=2024-03-01", JsValue::NULL), 0);
}

#[wasm_bindgen_test]
fn js_dates_before_2001_normalize() {
    let stay = js_sys::Object::new();
    let check_in = js_sys::Date::new(&JsValue::from_f64(947_894_400_000.0));
    js_sys::Reflect::set(&stay, &"checkIn".into(), &check_in).unwrap();

    let classifier = KeyClassifier::default();
    let hits = DateExtractor::new(&classifier, &[], 3).extract(&JsPayload::new(stay.into()));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].iso, "2000-01-15T00:00:00.000Z");
}

fn armed_on_pricing() -> RangeProbe {
    let config = js_sys::JSON::parse(r#"{"endpoints": {"pinnedPath": "/pricing"}}"#).unwrap();
    let tap = RangeProbe::new(config).unwrap();
    tap.reset();
    tap.arm(Some(10_000.0));
    tap
}

fn hit_count(tap: &RangeProbe) -> u32 {
    js_sys::Array::from(&tap.hits().unwrap()).length()
}

#[wasm_bindgen_test]
fn callback_requests_observed_and_forwarded() {
    let mut tap = armed_on_pricing();
    let real_open = Function::new_with_args("method, url", "this.opened = method + ' ' + url;");
    let real_send = Function::new_with_args("body", "this.sent = body; return 'sent';");
    let open: Function = tap.wrap_xhr_open(real_open.into()).unchecked_into();
    let send: Function = tap.wrap_xhr_send(real_send.into()).unchecked_into();

    let xhr = web_sys::XmlHttpRequest::new().unwrap();
    open.call2(&xhr, &"POST".into(), &"https://api.example.com/pricing".into()).unwrap();
    let body = JsValue::from_str(r#"{"checkInDate": 1700000000, "checkOutDate": 1700259200}"#);
    let out = send.call1(&xhr, &body).unwrap();

    assert_eq!(out.as_string().as_deref(), Some("sent"));
    assert_eq!(
        js_sys::Reflect::get(&xhr, &"opened".into()).unwrap().as_string().as_deref(),
        Some("POST https://api.example.com/pricing")
    );
    assert_eq!(js_sys::Reflect::get(&xhr, &"sent".into()).unwrap(), body);
    assert_eq!(hit_count(&tap), 2);
}

#[wasm_bindgen_test]
fn hostile_payloads_still_forward() {
    let mut tap = armed_on_pricing();

    // proxy whose key enumeration throws
    let handler = js_sys::Object::new();
    let trap = Function::new_no_args("throw new Error('ownKeys trap');");
    js_sys::Reflect::set(&handler, &"ownKeys".into(), &trap).unwrap();
    let hostile = js_sys::Proxy::new(&js_sys::Object::new(), &handler);

    let real_post = Function::new_with_args("message, origin", "return 'posted';");
    let post: Function = tap.wrap_post_message(real_post.into()).unchecked_into();
    let out = post.call2(&JsValue::UNDEFINED, &hostile, &"*".into()).unwrap();
    assert_eq!(out.as_string().as_deref(), Some("posted"));

    // body without a prototype
    let body = js_sys::Object::create(JsValue::NULL.unchecked_ref());
    js_sys::Reflect::set(&body, &"checkInDate".into(), &"2024-03-01".into()).unwrap();
    let init = js_sys::Object::new();
    js_sys::Reflect::set(&init, &"method".into(), &"POST".into()).unwrap();
    js_sys::Reflect::set(&init, &"body".into(), &body).unwrap();

    let real_fetch = Function::new_with_args("input, init", "return 'fetched';");
    let fetch: Function = tap.wrap_fetch(real_fetch.into()).unchecked_into();
    let out = fetch
        .call2(&JsValue::UNDEFINED, &"https://api.example.com/pricing".into(), &init)
        .unwrap();
    assert_eq!(out.as_string().as_deref(), Some("fetched"));
    assert_eq!(hit_count(&tap), 1);
}
