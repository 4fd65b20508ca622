//! BrainFrame HTTP transport and session layer.
//!
//! Implements the request pipeline every API stub runs through:
//!
//! 1. [`SessionAuthenticator`] picks the authentication for the request
//!    (none, HTTP Basic, or the cached session cookie).
//! 2. A [`Transport`] performs exactly one round trip. [`HttpTransport`] is the
//!    `reqwest` implementation; [`MockTransport`] is a scripted stand-in for
//!    tests.
//! 3. Failures are translated into [`protocol::ApiError`] by the
//!    [`protocol::ErrorRegistry`] the authenticator was built with. A rejected
//!    session is retried once with credentials before anything is reported.
//!
//! Streamed responses are read through [`FrameLines`], which splits the body
//! on CRLF and fails a stream that goes silent for too long.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP details, cookies, timeouts and body framing live
//! here. The [`protocol`] crate sees none of them.

mod http;
mod lines;
mod mock;
mod session;
mod transport;

pub use http::HttpTransport;
pub use lines::{FrameLines, DEFAULT_MAX_LINE_LEN};
pub use mock::{MockReply, MockTransport, RecordedCall, StreamFeed};
pub use session::SessionAuthenticator;
pub use transport::{Authorization, Credentials, HttpResponse, ResponseBody, Transport, SESSION_COOKIE};
