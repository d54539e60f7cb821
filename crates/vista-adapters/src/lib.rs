//! vista-adapters: capability adapters bridging canonical requests to
//! external inference providers, plus the response normalizer and the
//! voice command matcher.

pub mod command;
pub mod normalize;
pub mod ocr;
pub mod types;
pub mod vision;
pub mod voice;

pub use types::{AdapterContext, CapabilityAdapter};
