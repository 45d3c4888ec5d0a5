//! Browser bindings
//!
//! - `storage`: `sessionStorage` / `localStorage` as `SessionStorage`
//! - `dom`: `DomElement` over `web_sys::Element`
//! - `payload`: `PayloadNode` over arbitrary `JsValue` graphs
//! - `probe`: the exported `RangeProbe` class and its scan driver

pub mod storage;
pub mod dom;
pub mod payload;
pub mod probe;

pub use storage::WebSessionStorage;
pub use payload::JsPayload;
pub use probe::RangeProbe;

use wasm_bindgen::{JsCast, JsValue};

/// Best-effort text for a thrown JS value.
pub(crate) fn describe_js(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", String::from(err.name()), String::from(err.message()));
    }
    format!("{:?}", value)
}
