//! InstrumentationFacade: wrapped equivalents of the host's primitives.
//!
//! The facade owns the real request, callback-request and messaging
//! primitives and hands out wrappers implementing the same traits. Callers
//! are pointed at the wrappers instead of having globals patched. Every
//! wrapper observes first and then forwards the original arguments, and
//! returns whatever the real primitive returned.

use std::rc::Rc;

use serde::Serialize;
use tracing::{info, warn};

use super::interceptor::NetworkInterceptor;
use super::request::{OutboundRequest, RequestBody};
use crate::error::ProbeError;
use crate::extract::SharedPayload;

// =============================================================================
// Primitive seams
// =============================================================================

/// Promise-style request issuance. `Output` is whatever the real primitive
/// hands back (a future, a promise handle).
pub trait RequestIssuer {
    type Output;
    fn issue(&self, request: OutboundRequest) -> Self::Output;
}

/// Callback/event-style request: target set by `open`, body by `send`.
pub trait CallbackRequest {
    fn open(&mut self, method: &str, url: &str);
    fn send(&mut self, body: Option<RequestBody>);
}

pub trait MessagePoster {
    fn post_message(&self, message: &SharedPayload, target_origin: &str);
}

pub trait MessageHandler {
    fn handle_message(&self, data: &SharedPayload, origin: &str);
}

// =============================================================================
// Wrappers
// =============================================================================

pub struct InstrumentedIssuer<R> {
    inner: R,
    interceptor: Rc<NetworkInterceptor>,
}

impl<R: RequestIssuer> RequestIssuer for InstrumentedIssuer<R> {
    type Output = R::Output;

    fn issue(&self, request: OutboundRequest) -> R::Output {
        self.interceptor.observe_request(&request);
        self.inner.issue(request)
    }
}

pub struct InstrumentedCallbackRequest<C> {
    inner: C,
    interceptor: Rc<NetworkInterceptor>,
    target: Option<(String, String)>,
}

impl<C> InstrumentedCallbackRequest<C> {
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: CallbackRequest> CallbackRequest for InstrumentedCallbackRequest<C> {
    fn open(&mut self, method: &str, url: &str) {
        self.target = Some((method.to_string(), url.to_string()));
        self.inner.open(method, url);
    }

    fn send(&mut self, body: Option<RequestBody>) {
        // send without open: nothing to classify, forward untouched
        if let Some((method, url)) = &self.target {
            let request = OutboundRequest::new(method, url, body.clone());
            self.interceptor.observe_request(&request);
        }
        self.inner.send(body);
    }
}

pub struct InstrumentedPoster<P> {
    inner: P,
    interceptor: Rc<NetworkInterceptor>,
}

impl<P: MessagePoster> MessagePoster for InstrumentedPoster<P> {
    fn post_message(&self, message: &SharedPayload, target_origin: &str) {
        self.interceptor.observe_outbound_message(message, target_origin);
        self.inner.post_message(message, target_origin);
    }
}

pub struct InstrumentedHandler<H> {
    inner: H,
    interceptor: Rc<NetworkInterceptor>,
}

impl<H: MessageHandler> MessageHandler for InstrumentedHandler<H> {
    fn handle_message(&self, data: &SharedPayload, origin: &str) {
        self.interceptor.observe_inbound_message(data, origin);
        self.inner.handle_message(data, origin);
    }
}

// =============================================================================
// Facade
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Request,
    CallbackRequest,
    OutboundMessage,
    InboundMessage,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Request => "request",
            Channel::CallbackRequest => "callback-request",
            Channel::OutboundMessage => "outbound-message",
            Channel::InboundMessage => "inbound-message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStatus {
    pub channel: Channel,
    pub active: bool,
    pub reason: Option<String>,
}

/// Installs wrappers around whichever primitives the host provides. A
/// missing primitive leaves that channel inactive; the others still work.
pub struct InstrumentationFacade {
    interceptor: Rc<NetworkInterceptor>,
    channels: Vec<ChannelStatus>,
}

impl InstrumentationFacade {
    pub fn new(interceptor: Rc<NetworkInterceptor>) -> Self {
        Self {
            interceptor,
            channels: Vec::new(),
        }
    }

    pub fn interceptor(&self) -> &Rc<NetworkInterceptor> {
        &self.interceptor
    }

    pub fn channels(&self) -> &[ChannelStatus] {
        &self.channels
    }

    pub fn is_active(&self, channel: Channel) -> bool {
        self.channels.iter().any(|c| c.channel == channel && c.active)
    }

    pub fn wrap_issuer<R: RequestIssuer>(&mut self, real: Option<R>) -> Option<InstrumentedIssuer<R>> {
        let inner = self.install(Channel::Request, real)?;
        Some(InstrumentedIssuer {
            inner,
            interceptor: Rc::clone(&self.interceptor),
        })
    }

    pub fn wrap_callback_request<C: CallbackRequest>(
        &mut self,
        real: Option<C>,
    ) -> Option<InstrumentedCallbackRequest<C>> {
        let inner = self.install(Channel::CallbackRequest, real)?;
        Some(InstrumentedCallbackRequest {
            inner,
            interceptor: Rc::clone(&self.interceptor),
            target: None,
        })
    }

    pub fn wrap_poster<P: MessagePoster>(&mut self, real: Option<P>) -> Option<InstrumentedPoster<P>> {
        let inner = self.install(Channel::OutboundMessage, real)?;
        Some(InstrumentedPoster {
            inner,
            interceptor: Rc::clone(&self.interceptor),
        })
    }

    pub fn wrap_handler<H: MessageHandler>(&mut self, real: Option<H>) -> Option<InstrumentedHandler<H>> {
        let inner = self.install(Channel::InboundMessage, real)?;
        Some(InstrumentedHandler {
            inner,
            interceptor: Rc::clone(&self.interceptor),
        })
    }

    /// Record a channel that could not be wrapped for a reason other than
    /// the primitive being absent.
    pub fn mark_unavailable(&mut self, channel: Channel, reason: &str) {
        let err = ProbeError::hook_unavailable(channel.as_str(), reason);
        warn!(error = %err, category = %err.category(), "channel inactive");
        self.set_status(ChannelStatus {
            channel,
            active: false,
            reason: Some(reason.to_string()),
        });
    }

    /// Record a channel instrumented outside the generic wrappers.
    pub fn mark_active(&mut self, channel: Channel) {
        info!(channel = channel.as_str(), "channel instrumented");
        self.set_status(ChannelStatus {
            channel,
            active: true,
            reason: None,
        });
    }

    fn install<T>(&mut self, channel: Channel, real: Option<T>) -> Option<T> {
        match real {
            Some(primitive) => {
                self.mark_active(channel);
                Some(primitive)
            }
            None => {
                self.mark_unavailable(channel, "primitive not present");
                None
            }
        }
    }

    fn set_status(&mut self, status: ChannelStatus) {
        match self.channels.iter_mut().find(|c| c.channel == status.channel) {
            Some(existing) => *existing = status,
            None => self.channels.push(status),
        }
    }
}
