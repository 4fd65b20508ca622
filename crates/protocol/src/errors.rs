//! Error kinds, typed API errors, and retry-policy types.
//!
//! The BrainFrame server reports domain failures as a JSON body of the form
//! `{"title": <kind>, "description": <text>}`. The `title` is a stable kind
//! string; [`ErrorKind`] enumerates every kind this client understands and
//! [`ApiError`] is the single error value produced for any failed exchange.
//!
//! Low-level failures that never reached the server's error handling are
//! represented by [`TransportFailure`] and always surface as
//! [`ErrorKind::ServerNotReady`].
//!
//! [`RetryPolicy`] is a cross-cutting concern: anything that decides whether
//! to try an operation again asks the error for its policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry.
///
/// ## Rules
///
/// - `Retryable` errors: connection failures, timeouts, reverse-proxy 502s
///   while the server is starting. The caller picks the back-off.
/// - `NonRetryable` errors: every server-declared domain error, protocol drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Retryable,
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable)
    }
}

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

// Generates the `ErrorKind` enum, its `ALL` table, and the kind-string mapping
// from one list so the three can never drift apart.
macro_rules! error_kinds {
    (
        $(
            $(#[$attr:meta])*
            $variant:ident => $kind:literal,
        )+
    ) => {
        /// Every error kind the client can produce or receive.
        ///
        /// The associated string ([`ErrorKind::as_str`]) is the value the
        /// server sends in the `title` field of an error body.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ErrorKind {
            $(
                $(#[$attr])*
                $variant,
            )+
        }

        impl ErrorKind {
            /// All kinds, in declaration order.
            pub const ALL: &'static [ErrorKind] = &[$(ErrorKind::$variant,)+];

            /// The kind string used on the wire.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(ErrorKind::$variant => $kind,)+
                }
            }
        }
    };
}

error_kinds! {
    /// Something unexpected happened. The server may be in an invalid state,
    /// or the client and server disagree on the error protocol.
    Unknown => "UnknownError",
    /// The server could not be reached, or a reverse proxy reported that it
    /// is not serving yet. Produced locally; always retryable.
    ServerNotReady => "ServerNotReadyError",
    /// A stream configuration specified by the client could not be found.
    StreamConfigNotFound => "StreamConfigNotFoundError",
    /// A zone specified by the client could not be found.
    ZoneNotFound => "ZoneNotFoundError",
    /// A premises specified by the client could not be found.
    PremisesNotFound => "PremisesNotFoundError",
    /// A client tried to delete a default zone.
    ZoneNotDeletable => "ZoneNotDeletableError",
    /// An alert specified by the client could not be found.
    AlertNotFound => "AlertNotFoundError",
    /// The syntax of the request could not be parsed.
    InvalidSyntax => "InvalidSyntaxError",
    /// The request was parsed, but some value within it is invalid.
    InvalidFormat => "InvalidFormatError",
    /// The client requested something the server does not implement.
    NotImplementedInApi => "NotImplementedError",
    /// A stream failed to open when it was required to.
    StreamNotOpened => "StreamNotOpenedError",
    /// A stream configuration with the same source already exists.
    DuplicateStreamSource => "DuplicateStreamSourceError",
    /// A zone with the same name already exists within the stream.
    DuplicateZoneName => "DuplicateZoneNameError",
    /// An identity with the same name already exists.
    DuplicateIdentityName => "DuplicateIdentityNameError",
    /// The class name is not detectable by any loaded capsule.
    NoDetectorForClass => "NoDetectorForClassError",
    /// The class name is not encodable by any loaded capsule.
    NoEncoderForClass => "NoEncoderForClassError",
    /// An identity specified by the client could not be found.
    IdentityNotFound => "IdentityNotFoundError",
    /// An image could not be found for the specified identity.
    ImageNotFoundForIdentity => "ImageNotFoundForIdentityError",
    /// An uploaded image could not be decoded.
    InvalidImageType => "InvalidImageTypeError",
    /// The maximum number of concurrently analysed streams has been reached.
    AnalysisLimitExceeded => "AnalysisLimitExceededError",
    /// An image to encode contains no object of the requested class.
    NoDetectionsInImage => "NoDetectionsInImageError",
    /// An image to encode contains more than one object of the requested class.
    TooManyDetectionsInImage => "TooManyDetectionsInImageError",
    /// The image has already been encoded for this identity and class.
    ImageAlreadyEncoded => "ImageAlreadyEncodedError",
    /// The vector already exists for the identity and class.
    DuplicateVector => "DuplicateVectorError",
    /// The alert has no frame attached.
    FrameNotFoundForAlert => "FrameNotFoundForAlertError",
    /// A referenced plugin does not exist.
    PluginNotFound => "PluginNotFoundError",
    /// The provided plugin options do not fit the plugin.
    InvalidPluginOption => "InvalidPluginOptionError",
    /// A referenced storage object does not exist.
    StorageNotFound => "StorageNotFoundError",
    /// A referenced zone alarm does not exist.
    ZoneAlarmNotFound => "ZoneAlarmNotFoundError",
    /// A runtime option is unsupported or of the wrong type.
    InvalidRuntimeOption => "InvalidRuntimeOptionError",
    /// A referenced encoding does not exist.
    EncodingNotFound => "EncodingNotFoundError",
    /// The request lacked valid authorization.
    Unauthorized => "UnauthorizedError",
    /// The session ID is expired or was never issued. The client should
    /// authenticate again to get a new session.
    InvalidSession => "InvalidSessionError",
    /// The encoding vector is longer than the maximum allowed length.
    VectorTooLong => "VectorTooLongError",
    /// A referenced user does not exist.
    UserNotFound => "UserNotFoundError",
    /// The user's role does not permit the operation.
    InsufficientRole => "InsufficientRoleError",
    /// The requested username already exists.
    DuplicateUsername => "DuplicateUsernameError",
    /// The operation would delete the only remaining admin account.
    AdminMustExist => "AdminMustExistError",
    /// The resource requires an active license and none is loaded.
    LicenseRequired => "LicenseRequiredError",
    /// The uploaded license has expired.
    LicenseExpired => "LicenseExpiredError",
    /// The uploaded license is malformed.
    LicenseInvalid => "LicenseInvalidError",
}

impl ErrorKind {
    /// Human-friendly name derived from the kind string, e.g. `"Zone not
    /// found"` for `ZoneNotFoundError`.
    pub fn pretty_name(self) -> String {
        let kind = self.as_str();
        let chars: Vec<char> = kind.chars().collect();
        let mut words = String::with_capacity(kind.len() + 8);

        for (i, &c) in chars.iter().enumerate() {
            if i > 0 && c.is_uppercase() {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                    words.push(' ');
                }
            }
            words.extend(c.to_lowercase());
        }

        let words = words.strip_suffix(" error").unwrap_or(&words);
        let mut out = String::with_capacity(words.len());
        let mut rest = words.chars();
        if let Some(first) = rest.next() {
            out.extend(first.to_uppercase());
            out.push_str(rest.as_str());
        }
        out
    }

    /// Whether an error of this kind is worth retrying.
    pub fn retry_policy(self) -> RetryPolicy {
        match self {
            ErrorKind::ServerNotReady => RetryPolicy::Retryable,
            _ => RetryPolicy::NonRetryable,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

/// A request that failed below the HTTP layer: nothing usable came back.
///
/// Carries the underlying error rendered as text so this crate stays free of
/// HTTP client types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// The connection could not be established (refused, DNS, TLS).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request as a whole, or connecting for a streamed request, timed out.
    #[error("request timed out: {0}")]
    TimedOut(String),

    /// A streamed response produced no data for longer than the allowed gap.
    #[error("no data received for {0:?}")]
    Silent(Duration),

    /// A streamed response sent more than this many bytes without a line
    /// delimiter.
    #[error("line longer than {0} bytes")]
    LineTooLong(usize),

    /// The connection broke while sending or receiving.
    #[error("connection interrupted: {0}")]
    Interrupted(String),

    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

// ---------------------------------------------------------------------------
// API errors
// ---------------------------------------------------------------------------

/// The typed error returned by every failed API call.
#[derive(Debug, Error)]
#[error("{kind}: {description}")]
pub struct ApiError {
    kind: ErrorKind,
    description: String,
    status_code: Option<u16>,
    #[source]
    cause: Option<TransportFailure>,
}

impl ApiError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            status_code: None,
            cause: None,
        }
    }

    /// Creates an [`ErrorKind::Unknown`] error, optionally tagged with the
    /// HTTP status that produced it.
    pub fn unknown(description: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            status_code,
            ..Self::new(ErrorKind::Unknown, description)
        }
    }

    /// Creates an [`ErrorKind::ServerNotReady`] error caused by `failure`.
    pub fn server_not_ready(description: impl Into<String>, failure: TransportFailure) -> Self {
        Self {
            cause: Some(failure),
            ..Self::new(ErrorKind::ServerNotReady, description)
        }
    }

    /// Attaches the HTTP status code that produced this error.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The HTTP status of the response this error was decoded from. `None`
    /// for transport failures and for responses without a usable body.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// The transport failure behind a [`ErrorKind::ServerNotReady`] error.
    pub fn cause(&self) -> Option<&TransportFailure> {
        self.cause.as_ref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.kind.retry_policy()
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_policy().is_retryable()
    }
}
