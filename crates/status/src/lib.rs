//! BrainFrame zone-status feed.
//!
//! The server publishes zone statuses as a long-lived streamed GET whose body
//! is one JSON frame per CRLF-terminated line. This crate reads that feed:
//!
//! - [`ZoneStatusStream`] decodes the frames of a single connection.
//! - [`StatusReceiver`] owns a background task that keeps a connection open,
//!   reconnects after transient failures, caches the latest frame, and calls
//!   registered listeners for every frame.
//!
//! ## Module Layout
//!
//! | Module     | Contents                                              |
//! |------------|-------------------------------------------------------|
//! | `config`   | [`StatusReceiverConfig`]                              |
//! | `stream`   | [`ZoneStatusStream`], [`StatusStreamError`]           |
//! | `receiver` | [`StatusReceiver`], [`ReceiverState`]                 |

mod config;
mod receiver;
mod stream;

pub use config::StatusReceiverConfig;
pub use receiver::{ReceiverState, StatusReceiver};
pub use stream::{StatusStreamError, ZoneStatusStream};
