//! Network and message instrumentation
//!
//! - `endpoint`: which request targets are worth inspecting, discovery log
//! - `request`: outbound request model, query/body decoding
//! - `directive`: arm/reset control messages
//! - `interceptor`: observe-only inspection feeding the session
//! - `facade`: wrapped equivalents of the host's primitives

pub mod endpoint;
pub mod request;
pub mod directive;
pub mod interceptor;
pub mod facade;

pub use endpoint::*;
pub use request::*;
pub use directive::*;
pub use interceptor::*;
pub use facade::*;
