//! Kind-string to error-constructor registry and failure translation.
//!
//! [`ErrorRegistry::builtin`] is built once at startup and handed to whatever
//! needs to turn a failed exchange into an [`ApiError`]. There is no global
//! table: two clients may carry different registries.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use crate::errors::{ApiError, ErrorKind, TransportFailure};

/// Description used for every failure that never got an HTTP response.
pub const SERVER_NOT_READY_MESSAGE: &str =
    "A network exception occurred while communicating with the BrainFrame server";

/// Builds the error for one kind from the server's description.
pub type ErrorConstructor = Box<dyn Fn(String) -> ApiError + Send + Sync>;

/// Errors raised while populating a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The kind already has a constructor.
    #[error("error kind '{0}' is already registered")]
    DuplicateKind(String),
}

/// A failed exchange, as seen by the registry.
#[derive(Debug)]
pub enum FailedExchange<'a> {
    /// The server answered with a non-success status.
    Response { status: u16, body: &'a [u8] },
    /// No response was received.
    Transport(TransportFailure),
}

#[derive(Deserialize)]
struct ErrorBody {
    title: String,
    description: String,
}

/// Maps server-declared kind strings to error constructors.
pub struct ErrorRegistry {
    constructors: HashMap<String, ErrorConstructor>,
}

impl ErrorRegistry {
    /// Creates a registry with no kinds. Every server error translates to
    /// [`ErrorKind::Unknown`] until kinds are registered.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Creates a registry holding one constructor per [`ErrorKind`].
    ///
    /// # Panics
    ///
    /// Panics if two kinds share a kind string. That is a defect in this crate
    /// and surfaces the first time a client is constructed.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for &kind in ErrorKind::ALL {
            if let Err(e) = registry.register(kind.as_str(), move |d| ApiError::new(kind, d)) {
                panic!("built-in error registry is inconsistent: {e}");
            }
        }
        registry
    }

    /// Registers `constructor` for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(String) -> ApiError + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.constructors.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        self.constructors.insert(kind, Box::new(constructor));
        Ok(())
    }

    /// Returns the constructor registered for `kind`, if any.
    pub fn lookup(&self, kind: &str) -> Option<&ErrorConstructor> {
        self.constructors.get(kind)
    }

    /// Iterates over the registered kind strings in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Translates any failed exchange into exactly one [`ApiError`].
    pub fn translate(&self, outcome: FailedExchange<'_>) -> ApiError {
        match outcome {
            FailedExchange::Response { status, body } => self.translate_response(status, body),
            FailedExchange::Transport(failure) => self.translate_failure(failure),
        }
    }

    /// Translates a transport-level failure.
    pub fn translate_failure(&self, failure: TransportFailure) -> ApiError {
        ApiError::server_not_ready(SERVER_NOT_READY_MESSAGE, failure)
    }

    /// Translates a non-success HTTP response.
    pub fn translate_response(&self, status: u16, body: &[u8]) -> ApiError {
        let text = String::from_utf8_lossy(body);

        // nginx answers 502 while the server behind it is still starting.
        if status == 502 {
            let description = if text.is_empty() {
                SERVER_NOT_READY_MESSAGE.to_string()
            } else {
                format!("{SERVER_NOT_READY_MESSAGE}: {text}")
            };
            return ApiError::new(ErrorKind::ServerNotReady, description);
        }

        if body.is_empty() {
            return ApiError::unknown(
                "A failure happened but the server did not respond with a proper error",
                None,
            );
        }

        let parsed: ErrorBody = match serde_json::from_slice(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                return ApiError::unknown(
                    format!(
                        "A failure happened, and the response was not in the proper error format: {text}"
                    ),
                    Some(status),
                );
            }
        };

        match self.lookup(&parsed.title) {
            Some(constructor) => constructor(parsed.description).with_status(status),
            None => {
                let description = format!("Unknown error kind {}: {}", parsed.title, parsed.description);
                error!(kind = %parsed.title, status, "{description}");
                ApiError::unknown(description, Some(status))
            }
        }
    }
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for ErrorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRegistry")
            .field("kinds", &self.constructors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use super::*;

    fn body(kind: &str, description: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({ "title": kind, "description": description }))
            .unwrap()
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_every_registered_kind_translates_to_itself() {
        let registry = ErrorRegistry::builtin();
        for &kind in ErrorKind::ALL {
            if kind == ErrorKind::ServerNotReady {
                continue;
            }
            for status in [400, 401, 404, 409, 500] {
                let err = registry.translate_response(status, &body(kind.as_str(), "some detail"));
                assert_eq!(err.kind(), kind);
                assert_eq!(err.description(), "some detail");
                assert_eq!(err.status_code(), Some(status));
            }
        }
    }

    #[test]
    fn test_kind_strings_round_trip_through_registry() {
        let registry = ErrorRegistry::builtin();
        assert_eq!(registry.len(), ErrorKind::ALL.len());
        for &kind in ErrorKind::ALL {
            let constructor = registry.lookup(kind.as_str()).expect("kind registered");
            assert_eq!(constructor("x".into()).kind(), kind);
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ErrorRegistry::builtin();
        let result = registry.register("ZoneNotFoundError", |d| ApiError::new(ErrorKind::Unknown, d));
        assert_eq!(
            result,
            Err(RegistryError::DuplicateKind("ZoneNotFoundError".into()))
        );
        // The built-in mapping is untouched.
        let err = registry.translate_response(404, &body("ZoneNotFoundError", "gone"));
        assert_eq!(err.kind(), ErrorKind::ZoneNotFound);
    }

    #[test]
    fn test_502_is_server_not_ready_regardless_of_body() {
        let registry = ErrorRegistry::builtin();
        for payload in [
            Vec::new(),
            b"<html>Bad Gateway</html>".to_vec(),
            body("ZoneNotFoundError", "misleading"),
        ] {
            let err = registry.translate_response(502, &payload);
            assert_eq!(err.kind(), ErrorKind::ServerNotReady);
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_empty_body_is_unknown_without_status() {
        let err = ErrorRegistry::builtin().translate_response(500, b"");
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_malformed_body_is_unknown_with_status() {
        let registry = ErrorRegistry::builtin();
        let err = registry.translate_response(500, b"Internal Server Error");
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.status_code(), Some(500));
        assert!(err.description().contains("Internal Server Error"));

        let missing_title = serde_json::to_vec(&serde_json::json!({ "description": "x" })).unwrap();
        let err = registry.translate_response(400, &missing_title);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn test_unregistered_kind_is_unknown_and_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            ErrorRegistry::builtin().translate_response(418, &body("TeapotError", "short and stout"))
        });

        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.status_code(), Some(418));
        assert!(err.description().contains("TeapotError"));
        assert!(err.description().contains("short and stout"));

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains("TeapotError"), "{output}");
    }

    #[test]
    fn test_server_declared_unknown_error_keeps_status() {
        let err = ErrorRegistry::builtin().translate_response(500, &body("UnknownError", "boom"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.description(), "boom");
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_transport_failure_is_server_not_ready() {
        let registry = ErrorRegistry::builtin();
        let err = registry.translate(FailedExchange::Transport(TransportFailure::TimedOut(
            "operation timed out".into(),
        )));
        assert_eq!(err.kind(), ErrorKind::ServerNotReady);
        assert_eq!(
            err.cause(),
            Some(&TransportFailure::TimedOut("operation timed out".into()))
        );
    }

    #[test]
    fn test_empty_registry_falls_back_to_unknown() {
        let err = ErrorRegistry::empty().translate_response(404, &body("ZoneNotFoundError", "gone"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_alias_kind_can_be_registered() {
        let mut registry = ErrorRegistry::builtin();
        registry
            .register("ZoneMissingError", |d| ApiError::new(ErrorKind::ZoneNotFound, d))
            .unwrap();
        let err = registry.translate_response(404, &body("ZoneMissingError", "renamed kind"));
        assert_eq!(err.kind(), ErrorKind::ZoneNotFound);
    }
}
