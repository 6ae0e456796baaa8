//! Offset registry.
//!
//! Every byte offset and signature the client readers use is looked up here
//! first, with the reader's compiled-in value as the default.

mod registry;
mod remote;

pub use registry::{OffsetRegistry, OffsetSource, SCHEMA_VERSION_KEY};
#[cfg(feature = "remote")]
pub use remote::HttpOffsets;
pub use remote::RemoteOffsets;
