//! BrainFrame API client.
//!
//! [`BrainFrameApi`] is the entry point. It is composed of one stub per
//! server resource on top of a shared [`ApiCore`], which owns the HTTP
//! transport, the authenticated session, and the error registry.
//!
//! ## Architectural Layer
//!
//! **Facade.** Stubs map operations onto endpoints and bodies onto types.
//! Authentication, error translation, and the status feed come from the
//! [`transport`] and [`status`] crates.
//!
//! ## Module Layout
//!
//! | Module   | Contents                                                   |
//! |----------|------------------------------------------------------------|
//! | `api`    | [`BrainFrameApi`]                                          |
//! | `base`   | [`ApiCore`] and its JSON helpers                           |
//! | `config` | [`ClientConfig`], [`LoginConfig`], [`parse_server_url`]    |
//! | `codecs` | [`StreamConfiguration`], [`ConnType`], [`Options`]         |
//! | `error`  | [`ClientError`]                                            |
//! | `stubs`  | [`SystemStub`], [`StreamStub`], [`ZoneStatusStub`]         |

mod api;
mod base;
mod codecs;
mod config;
mod error;
mod stubs;

pub use api::BrainFrameApi;
pub use base::{ApiCore, Headers};
pub use codecs::{ConnType, Options, StreamConfiguration};
pub use config::{parse_server_url, ClientConfig, LoginConfig};
pub use error::ClientError;
pub use stubs::{StreamStub, SystemStub, ZoneStatusStub};

pub use protocol::{ApiError, ErrorKind, ErrorRegistry, PremisesId, StreamId, ZoneStatus, ZoneStatusFrame, ZoneStatuses};
pub use status::{ReceiverState, StatusReceiver, StatusReceiverConfig, ZoneStatusStream};
pub use transport::Credentials;
