//! DOM range scanning
//!
//! - `node`: element-tree abstraction, in-memory `VirtualElement`
//! - `candidate`: attribute pair → `RangeCandidate`
//! - `scanner`: one traversal pass (shadow roots, frames, blocked frames)
//! - `aggregate`: unique ranges and the published `ScanReport`
//! - `retry`: debounce-with-ceiling rescan schedule
//! - `controller`: activation lifecycle feeding the results sink

pub mod node;
pub mod candidate;
pub mod scanner;
pub mod aggregate;
pub mod retry;
pub mod controller;

pub use node::*;
pub use candidate::*;
pub use scanner::*;
pub use aggregate::*;
pub use retry::*;
pub use controller::*;

#[cfg(test)]
mod tests;
