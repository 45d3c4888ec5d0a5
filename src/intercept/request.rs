//! Outbound request model and payload decoding.
//!
//! Query strings decode to a flat object (last value wins for repeated
//! names). Bodies decode as JSON first, then as form-urlencoded text when
//! the text contains `=`. Binary or otherwise opaque bodies are skipped.

use serde_json::{Map, Value};
use url::Url;

/// Request body as handed to the request primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    /// Pre-parsed form pairs (URLSearchParams, FormData text entries).
    Form(Vec<(String, String)>),
    Json(Value),
    /// Blob, ArrayBuffer, stream: never inspected.
    Opaque,
}

impl RequestBody {
    pub fn decode(&self) -> Option<Value> {
        match self {
            RequestBody::Json(value) => Some(value.clone()),
            RequestBody::Form(pairs) => Some(pairs_object(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))),
            RequestBody::Text(text) => decode_text(text),
            RequestBody::Opaque => None,
        }
    }
}

fn decode_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if trimmed.contains('=') {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(trimmed.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        return Some(pairs_object(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))));
    }
    None
}

fn pairs_object<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    Value::Object(map)
}

/// Query parameters of `url` as a flat object, `None` when there are none.
pub fn query_object(url: &Url) -> Option<Value> {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    Some(pairs_object(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))))
}

/// One outbound request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub body: Option<RequestBody>,
}

impl OutboundRequest {
    pub fn new(method: &str, url: &str, body: Option<RequestBody>) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            body,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url, None)
    }

    pub fn post(url: &str, body: RequestBody) -> Self {
        Self::new("POST", url, Some(body))
    }

    /// GET and HEAD carry no inspectable body.
    pub fn is_retrieval(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET") || self.method.eq_ignore_ascii_case("HEAD")
    }
}
