//! RangeTap: booking date-range observer
//!
//! Recovers the date range a user is shopping for on a hosted booking page,
//! without cooperation from the page, from two independent signals.
//!
//! # Architecture
//!
//! ## Network capture
//! - `extract` - DateNormalizer, KeyClassifier, payload views, DateExtractor
//! - `session` - SessionContext: capture window, learned filter, results sink
//! - `intercept` - EndpointClassifier, NetworkInterceptor, InstrumentationFacade
//!
//! ## DOM scanning
//! - `dom` - DomRangeScanner, ScanAggregator, RetryScheduler, RangeScanController
//!
//! ## Ambient
//! - `config` - ProbeConfig (serde, defaulted, validated)
//! - `error` - ProbeError
//! - `telemetry` - tracing → browser console
//! - `wasm` - browser bindings, `RangeProbe`
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { RangeProbe } from 'rangetap';
//!
//! await init();
//!
//! const probe = new RangeProbe({ capture: { defaultDurationMs: 15000 } });
//!
//! // Observe-only wrappers; the embedder decides where they are installed
//! const fetch = probe.wrapFetch(window.fetch);
//! const post = probe.wrapPostMessage(window.postMessage);
//! XMLHttpRequest.prototype.open = probe.wrapXhrOpen(XMLHttpRequest.prototype.open);
//! XMLHttpRequest.prototype.send = probe.wrapXhrSend(XMLHttpRequest.prototype.send);
//! window.addEventListener('message', probe.messageListener(), true);
//!
//! // Activation (e.g. on a "search" click)
//! probe.arm(15000);
//! probe.scan();
//!
//! console.log(probe.hits());        // DateHit[] in completion order
//! console.log(probe.scanResults()); // { all, unique, blocked, stats }
//! ```

pub mod error;
pub mod config;
pub mod extract;
pub mod session;
pub mod intercept;
pub mod dom;
pub mod telemetry;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use error::{ErrorCategory, ProbeError, Result};
pub use config::ProbeConfig;
pub use extract::*;
pub use session::*;
pub use intercept::*;
pub use dom::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Panic hook and console logging
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    telemetry::init();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("rangetap v{}", env!("CARGO_PKG_VERSION"))
}
