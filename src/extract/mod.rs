pub mod normalize;
pub mod payload;
pub mod keys;
pub mod walker;

pub use normalize::*;
pub use payload::*;
pub use keys::*;
pub use walker::*;
