//! NetworkInterceptor: the observe-only side of every wrapped primitive.
//!
//! Each `observe_*` call decides, from the session's capture window and
//! learned filter, whether to look at the traffic at all. Nothing here can
//! alter, delay or fail the call being observed; the facade forwards to the
//! real primitive regardless of the returned `Observation`.

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::directive::Directive;
use super::endpoint::{endpoint_of, EndpointClassifier};
use super::request::{query_object, OutboundRequest};
use crate::error::Result;
use crate::extract::{DateExtractor, KeyClassifier, PayloadNode};
use crate::session::{CaptureSummary, DateHit, HitSource, LearnedFilter, NetworkReport, SessionHandle};

/// What the interceptor did with one observed call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Capture window closed; nothing inspected.
    Disarmed,
    /// Inbound control message, applied and not inspected.
    Directive(Directive),
    /// Armed, but the target is outside the allowed traffic.
    Disallowed,
    Inspected { hits: usize },
}

pub struct NetworkInterceptor {
    session: SessionHandle,
    keys: KeyClassifier,
    endpoints: EndpointClassifier,
    max_depth: usize,
}

impl NetworkInterceptor {
    /// `page_url` is the URL of the hosting document, used to resolve
    /// relative request targets and to derive the trusted domain family.
    pub fn new(session: SessionHandle, page_url: Option<&str>) -> Result<Self> {
        let (keys, endpoints, max_depth) = {
            let ctx = session.borrow();
            let config = ctx.config();
            (
                KeyClassifier::new(&config.keys)?,
                EndpointClassifier::new(&config.endpoints, page_url),
                config.walker.max_depth,
            )
        };
        Ok(Self {
            session,
            keys,
            endpoints,
            max_depth,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn endpoints(&self) -> &EndpointClassifier {
        &self.endpoints
    }

    /// Watchdog tick: closes a lapsed window and returns its summary once.
    pub fn tick(&self) -> Option<CaptureSummary> {
        self.session.borrow_mut().poll_expiry()
    }

    /// Snapshot of the learned filter if the window is open.
    fn armed_filter(&self) -> Option<LearnedFilter> {
        let mut ctx = self.session.borrow_mut();
        ctx.poll_expiry();
        if ctx.is_armed() {
            Some(ctx.learned().clone())
        } else {
            None
        }
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    pub fn observe_request(&self, request: &OutboundRequest) -> Observation {
        let Some(learned) = self.armed_filter() else {
            return Observation::Disarmed;
        };
        let Some(url) = self.endpoints.resolve(&request.url) else {
            debug!(url = %request.url, "request target not a URL");
            return Observation::Disallowed;
        };

        let learned_endpoint = learned.endpoint.as_deref();
        let discovery = self.endpoints.is_discovery_mode(learned_endpoint);
        if !self.endpoints.classify(&url, learned_endpoint).is_allowed() {
            if discovery {
                self.note_discovery(&url);
            }
            return Observation::Disallowed;
        }

        let extractor = DateExtractor::new(&self.keys, &learned.keys, self.max_depth);
        let mut reports = Vec::with_capacity(2);

        if let Some(query) = query_object(&url) {
            reports.push(NetworkReport::new(HitSource::RequestQuery, url.as_str(), extractor.extract(&query)));
        }

        if !request.is_retrieval() {
            if let Some(body) = request.body.as_ref().and_then(|b| b.decode()) {
                reports.push(NetworkReport::new(HitSource::RequestBody, url.as_str(), extractor.extract(&body)));
            }
        }

        let endpoint = endpoint_of(&url);
        let hits = self.session.borrow_mut().report_call(reports, Some(&endpoint));

        if hits == 0 && discovery {
            self.note_discovery(&url);
        }
        Observation::Inspected { hits }
    }

    fn note_discovery(&self, url: &Url) {
        debug!(path = url.path(), "discovery: candidate path");
        self.session.borrow_mut().discovery_mut().note(url.path());
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    pub fn observe_outbound_message<N: PayloadNode>(&self, message: &N, target_origin: &str) -> Observation {
        self.inspect_message(message, HitSource::MessageOut, target_origin)
    }

    pub fn observe_inbound_message<N: PayloadNode>(&self, data: &N, origin: &str) -> Observation {
        if let Some(directive) = Directive::parse(data) {
            info!(origin, directive = ?directive, "directive received");
            self.session.borrow_mut().apply_directive(directive);
            return Observation::Directive(directive);
        }
        self.inspect_message(data, HitSource::MessageIn, origin)
    }

    /// Message payloads are inspected directly, without endpoint
    /// classification, and learn keys only.
    fn inspect_message<N: PayloadNode>(&self, payload: &N, source: HitSource, origin: &str) -> Observation {
        let Some(learned) = self.armed_filter() else {
            return Observation::Disarmed;
        };
        let dates = DateExtractor::new(&self.keys, &learned.keys, self.max_depth).extract(payload);
        let hits = self
            .session
            .borrow_mut()
            .report_call(vec![NetworkReport::new(source, origin, dates)], None);
        Observation::Inspected { hits }
    }

    // -------------------------------------------------------------------------
    // Storage snapshot
    // -------------------------------------------------------------------------

    /// One-shot sniff of key/value storage entries. Values holding JSON
    /// containers are walked under their storage key. Hits go straight to
    /// the sink: no learning, no match counted, no arming required.
    pub fn snapshot_storage(&self, entries: &[(String, String)]) -> usize {
        let no_learned: [String; 0] = [];
        let extractor = DateExtractor::new(&self.keys, &no_learned, self.max_depth);

        let mut found = Vec::new();
        for (key, raw) in entries {
            let value = match serde_json::from_str::<Value>(raw) {
                Ok(v @ (Value::Object(_) | Value::Array(_))) => v,
                _ => Value::String(raw.clone()),
            };
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(key.clone(), value);
            for date in extractor.extract(&Value::Object(wrapper)) {
                found.push(DateHit::from_extracted(date, HitSource::StorageSnapshot, key));
            }
        }

        let count = found.len();
        if count > 0 {
            let mut ctx = self.session.borrow_mut();
            found.into_iter().for_each(|hit| ctx.sink_mut().push_hit(hit));
            info!(entries = entries.len(), hits = count, "storage snapshot");
        }
        count
    }
}
