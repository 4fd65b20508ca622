//! One stub per server resource. Each holds the shared [`ApiCore`] and
//! nothing else it does not own.
//!
//! [`ApiCore`]: crate::ApiCore

mod streams;
mod system;
mod zone_statuses;

pub use streams::StreamStub;
pub use system::SystemStub;
pub use zone_statuses::ZoneStatusStub;
