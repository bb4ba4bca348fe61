pub mod hash;
pub mod logging;

pub use hash::{content_hash, short_hash};
