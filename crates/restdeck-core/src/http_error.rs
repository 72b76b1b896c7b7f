//! The request-time error taxonomy.
//!
//! Every failure raised while handling a request (resolution, body parsing,
//! or the resource handler itself) is an [`HttpError`]. The dispatcher turns
//! it into a response exactly once, using [`HttpError::status_code`] as the
//! response status and [`HttpError::message`] in the JSON body.

use std::fmt;

/// Classification of an [`HttpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HttpErrorKind {
    /// No registered pattern matches the request path.
    NotFound,
    /// The resource matched but does not declare the request method.
    MethodNotAllowed,
    /// A multipart content type carried no `boundary=` parameter.
    MissingBoundary,
    /// The multipart stream was malformed or exceeded the memory budget.
    MultipartDecode,
    /// The body was declared as JSON but is not valid JSON.
    JsonDecode,
    /// The body was declared (or defaulted) as a URL-encoded form and is malformed.
    FormDecode,
    /// Raised by a resource handler; its status is whatever the handler chose.
    Handler,
    /// Raised by a before-request hook.
    Hook,
    /// The response could not be produced, e.g. serialization failed.
    Internal,
}

impl HttpErrorKind {
    /// Short name of the kind, used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingBoundary => "BadRequest:MissingBoundary",
            Self::MultipartDecode => "BadRequest:MultipartDecode",
            Self::JsonDecode => "BadRequest:JsonDecode",
            Self::FormDecode => "BadRequest:FormDecode",
            Self::Handler => "HandlerError",
            Self::Hook => "HookError",
            Self::Internal => "InternalError",
        }
    }

    /// Default status for the kind. Handler and hook errors carry their own.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::NotFound => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingBoundary | Self::MultipartDecode | Self::JsonDecode | Self::FormDecode => {
                http::StatusCode::BAD_REQUEST
            }
            Self::Handler | Self::Hook | Self::Internal => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status-coded failure surfaced to the client as the response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status_code}: {message}")]
pub struct HttpError {
    /// What went wrong.
    pub kind: HttpErrorKind,
    /// The HTTP status code sent to the client.
    pub status_code: http::StatusCode,
    /// The message rendered in the error body.
    pub message: String,
}

impl HttpError {
    /// Create an error of `kind` with its default status and message.
    #[must_use]
    pub fn new(kind: HttpErrorKind) -> Self {
        let status_code = kind.default_status_code();
        Self {
            kind,
            status_code,
            message: status_code
                .canonical_reason()
                .unwrap_or_default()
                .to_owned(),
        }
    }

    /// Create an error of `kind` with its default status and a custom message.
    #[must_use]
    pub fn with_message(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code: kind.default_status_code(),
            message: message.into(),
        }
    }

    /// Create a handler error with an explicit status.
    ///
    /// This is what resource handlers return for domain failures; the
    /// dispatcher never rewrites the status.
    #[must_use]
    pub fn status(status_code: http::StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Handler,
            status_code,
            message: message.into(),
        }
    }

    /// Create a handler error from a raw status code.
    ///
    /// Codes outside `100..=999` fall back to 500.
    #[must_use]
    pub fn from_code(code: u16, message: impl Into<String>) -> Self {
        let status_code =
            http::StatusCode::from_u16(code).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        Self::status(status_code, message)
    }

    /// Replace the kind, keeping status and message.
    #[must_use]
    pub fn with_kind(mut self, kind: HttpErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// The status code as an integer.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status_code.as_u16()
    }

    /// The JSON payload rendered at the outermost boundary:
    /// `{"status": <code>, "message": "<message>"}`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.code(),
            "message": self.message,
        })
    }

    // -- Convenience constructors --

    /// No resource matches the request path.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(HttpErrorKind::NotFound)
    }

    /// The resource does not declare the request method.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(HttpErrorKind::MethodNotAllowed)
    }

    /// Multipart content type without a boundary.
    #[must_use]
    pub fn missing_boundary() -> Self {
        Self::with_message(HttpErrorKind::MissingBoundary, "missing boundary")
    }

    /// Malformed multipart stream.
    #[must_use]
    pub fn multipart_decode() -> Self {
        Self::with_message(
            HttpErrorKind::MultipartDecode,
            "error parsing multipart/form-data",
        )
    }

    /// Invalid JSON body.
    #[must_use]
    pub fn json_decode(cause: impl fmt::Display) -> Self {
        Self::with_message(
            HttpErrorKind::JsonDecode,
            format!("error parsing json: {cause}"),
        )
    }

    /// Malformed URL-encoded body.
    #[must_use]
    pub fn form_decode() -> Self {
        Self::with_message(HttpErrorKind::FormDecode, "error parsing urlencoded form")
    }

    /// A response that could not be produced.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(HttpErrorKind::Internal, message)
    }
}
