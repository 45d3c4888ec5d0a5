//! `PayloadNode` over live JS values, walked in place.
//!
//! Object identity for cycle detection comes from a thread-local `WeakMap`
//! assigning each object a number the first time it is seen.
//!
//! Every property access goes through `Reflect`, whose bindings catch, so a
//! throwing getter or proxy trap drops that entry instead of unwinding into
//! the wrapped call.

use std::borrow::Cow;
use std::cell::Cell;

use js_sys::{Array, Object, Reflect, WeakMap};
use wasm_bindgen::{JsCast, JsValue};

use crate::extract::{PayloadNode, Scalar};

thread_local! {
    static IDENTITIES: WeakMap = WeakMap::new();
    static NEXT_IDENTITY: Cell<usize> = const { Cell::new(1) };
}

fn identity_of(object: &Object) -> usize {
    IDENTITIES.with(|ids| {
        if let Some(id) = ids.get(object).as_f64() {
            return id as usize;
        }
        let id = NEXT_IDENTITY.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        ids.set(object, &JsValue::from_f64(id as f64));
        id
    })
}

pub struct JsPayload(JsValue);

impl JsPayload {
    pub fn new(value: JsValue) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &JsValue {
        &self.0
    }
}

impl PayloadNode for JsPayload {
    fn scalar(&self) -> Option<Scalar<'_>> {
        let v = &self.0;
        if v.is_null() || v.is_undefined() {
            Some(Scalar::Null)
        } else if let Some(b) = v.as_bool() {
            Some(Scalar::Bool(b))
        } else if let Some(n) = v.as_f64() {
            Some(Scalar::Number(n))
        } else if let Some(s) = v.as_string() {
            Some(Scalar::Text(Cow::Owned(s)))
        } else if let Some(date) = v.dyn_ref::<js_sys::Date>() {
            if date.get_time().is_nan() {
                Some(Scalar::Null)
            } else {
                Some(Scalar::Text(Cow::Owned(String::from(date.to_iso_string()))))
            }
        } else if v.is_object() {
            None
        } else {
            // functions, symbols, bigints
            Some(Scalar::Null)
        }
    }

    fn identity(&self) -> Option<usize> {
        if self.scalar().is_some() {
            return None;
        }
        self.0.dyn_ref::<Object>().map(identity_of)
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(Option<&str>, &Self)) {
        let Some(object) = self.0.dyn_ref::<Object>() else {
            return;
        };
        if Array::is_array(&self.0) {
            let len = Reflect::get(object, &JsValue::from_str("length"))
                .ok()
                .and_then(|l| l.as_f64())
                .unwrap_or(0.0) as u32;
            for index in 0..len {
                if let Ok(item) = Reflect::get_u32(object, index) {
                    visit(None, &JsPayload(item));
                }
            }
            return;
        }
        let Ok(keys) = Reflect::own_keys(object) else {
            return;
        };
        for key in keys.iter() {
            // symbols
            let Some(name) = key.as_string() else { continue };
            if !is_enumerable(object, &key) {
                continue;
            }
            if let Ok(value) = Reflect::get(object, &key) {
                visit(Some(&name), &JsPayload(value));
            }
        }
    }
}

fn is_enumerable(object: &Object, key: &JsValue) -> bool {
    Reflect::get_own_property_descriptor(object, key)
        .ok()
        .filter(|d| d.is_object())
        .and_then(|d| Reflect::get(&d, &JsValue::from_str("enumerable")).ok())
        .and_then(|e| e.as_bool())
        .unwrap_or(false)
}
