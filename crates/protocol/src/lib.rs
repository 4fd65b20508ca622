//! Wire-level domain for the BrainFrame API client.
//!
//! This crate contains every value that crosses the boundary between the
//! client and the server: identifiers, request/response values, zone-status
//! frames, and the typed error model together with the registry that maps
//! server error kinds onto it. Infrastructure crates move these values; they
//! never redefine them.
//!
//! ## Architectural Layer
//!
//! **Domain + error translation.** This crate has no I/O dependencies.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`StreamId`, `PremisesId`, `RequestId`) |
//! | [`errors`] | `ErrorKind`, `ApiError`, `TransportFailure`, `RetryPolicy` |
//! | [`registry`] | `ErrorRegistry`: kind string to error, failure translation |
//! | [`request`] | `PendingRequest`, `Body`, `RawResponse` |
//! | [`status`] | Zone-status payloads and feed frames |

pub mod errors;
pub mod identifiers;
pub mod registry;
pub mod request;
pub mod status;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ApiError, ErrorKind, RetryPolicy, TransportFailure};
pub use identifiers::{PremisesId, RequestId, StreamId};
pub use registry::{ErrorConstructor, ErrorRegistry, FailedExchange, RegistryError};
pub use request::{Body, Method, PendingRequest, RawResponse, ReadMode, DEFAULT_TIMEOUT};
pub use status::{decode_frame, FrameError, ZoneStatus, ZoneStatusFrame, ZoneStatuses};
