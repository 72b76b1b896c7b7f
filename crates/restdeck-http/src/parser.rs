//! Content-type driven request body decoding.
//!
//! The decoder is chosen from the declared `Content-Type` by substring match,
//! case as received, against a fixed priority list:
//!
//! | Order | Content type contains | Result |
//! |-------|----------------------|--------|
//! | 1 | `multipart/form-data` | [`ParsedBody::Multipart`] |
//! | 2 | `application/json` | [`ParsedBody::Json`] |
//! | 3 | `application/x-www-form-urlencoded` | [`ParsedBody::Form`] |
//!
//! A request without a content type is decoded as a URL-encoded form. A
//! content type that matches none of the entries yields [`ParsedBody::Empty`]
//! and the body is left unread. A request without a positive
//! `Content-Length` has no body and is never read.

use std::fmt;

use bytes::Bytes;
use http::HeaderMap;
use http_body::Body;
use http_body_util::BodyExt;
use restdeck_core::{BYTES_PER_MEGABYTE, HttpError};
use serde_json::Value;
use tracing::{debug, warn};

use crate::form::{FormFields, parse_urlencoded};
use crate::multipart::{MultipartError, MultipartForm, MultipartParser, extract_boundary};

/// `multipart/form-data`.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
/// `application/json`.
pub const APPLICATION_JSON: &str = "application/json";
/// `application/x-www-form-urlencoded`.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Default multipart ceiling for standalone parsing, in megabytes.
pub const DEFAULT_PARSE_MEMORY_MB: u64 = 128;

/// Options for [`parse_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// In-memory ceiling for multipart file contents, in bytes.
    pub max_multipart_memory_bytes: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from_megabytes(DEFAULT_PARSE_MEMORY_MB)
    }
}

impl ParseOptions {
    /// Options with a ceiling given in megabytes.
    #[must_use]
    pub fn from_megabytes(megabytes: u64) -> Self {
        Self {
            max_multipart_memory_bytes: megabytes.saturating_mul(BYTES_PER_MEGABYTE),
        }
    }
}

/// A decoded request body, tagged by the content type that produced it.
#[derive(Debug, Default)]
pub enum ParsedBody {
    /// No body, or a content type that is not decoded.
    #[default]
    Empty,
    /// URL-encoded form fields.
    Form(FormFields),
    /// A JSON document.
    Json(Value),
    /// Multipart fields and files.
    Multipart(MultipartForm),
}

impl ParsedBody {
    /// The content type that was decoded, `""` for [`ParsedBody::Empty`].
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::Form(_) => FORM_URLENCODED,
            Self::Json(_) => APPLICATION_JSON,
            Self::Multipart(_) => MULTIPART_FORM_DATA,
        }
    }

    /// Whether nothing was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The form fields, if the body was a URL-encoded form.
    #[must_use]
    pub fn as_form(&self) -> Option<&FormFields> {
        match self {
            Self::Form(fields) => Some(fields),
            _ => None,
        }
    }

    /// The JSON document, if the body was JSON.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The multipart form, if the body was multipart.
    #[must_use]
    pub fn as_multipart(&self) -> Option<&MultipartForm> {
        match self {
            Self::Multipart(form) => Some(form),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Multipart,
    Json,
    Form,
}

/// Decoders in priority order.
const DECODERS: [(&str, Decoder); 3] = [
    (MULTIPART_FORM_DATA, Decoder::Multipart),
    (APPLICATION_JSON, Decoder::Json),
    (FORM_URLENCODED, Decoder::Form),
];

fn select_decoder(content_type: Option<&str>) -> Option<Decoder> {
    let Some(content_type) = content_type else {
        return Some(Decoder::Form);
    };
    DECODERS
        .iter()
        .find(|(needle, _)| content_type.contains(needle))
        .map(|(_, decoder)| *decoder)
}

/// Parse the `Content-Length` header. Missing, non-numeric, and zero values
/// all mean "no body".
#[must_use]
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|len| *len > 0)
}

/// Whether the headers declare a request body.
#[must_use]
pub fn has_body(headers: &HeaderMap) -> bool {
    content_length(headers).is_some()
}

/// The request body decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyParser;

impl BodyParser {
    /// Decode `body` according to `content_type`.
    ///
    /// `content_length` is the already-parsed `Content-Length`; `None` means
    /// the request has no body and nothing is read.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`HttpError`] of the matching decode kind when the body
    /// cannot be decoded.
    pub async fn parse<B>(
        content_type: Option<&str>,
        content_length: Option<u64>,
        body: B,
        max_multipart_memory_bytes: u64,
    ) -> Result<ParsedBody, HttpError>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: fmt::Display,
    {
        if content_length.is_none() {
            return Ok(ParsedBody::Empty);
        }

        let Some(decoder) = select_decoder(content_type) else {
            debug!(content_type, "no decoder for content type, leaving body unread");
            return Ok(ParsedBody::Empty);
        };
        debug!(?decoder, content_type, content_length, "decoding request body");

        match decoder {
            Decoder::Multipart => {
                let boundary = content_type
                    .and_then(extract_boundary)
                    .ok_or_else(HttpError::missing_boundary)?;
                decode_multipart(&boundary, body, max_multipart_memory_bytes)
                    .await
                    .map(ParsedBody::Multipart)
            }
            Decoder::Json => {
                let bytes = collect(body).await.map_err(HttpError::json_decode)?;
                let text = std::str::from_utf8(&bytes).map_err(HttpError::json_decode)?;
                serde_json::from_str(text)
                    .map(ParsedBody::Json)
                    .map_err(HttpError::json_decode)
            }
            Decoder::Form => {
                let bytes = collect(body).await.map_err(|e| {
                    warn!(error = %e, "failed to read urlencoded body");
                    HttpError::form_decode()
                })?;
                parse_urlencoded(&bytes).map(ParsedBody::Form)
            }
        }
    }
}

/// Decode a request body using its own headers.
///
/// ```
/// use bytes::Bytes;
/// use http::HeaderMap;
/// use http_body_util::Full;
/// use restdeck_http::parser::{ParseOptions, parse_request};
///
/// # tokio_test::block_on(async {
/// let mut headers = HeaderMap::new();
/// headers.insert("content-type", "application/json".parse().unwrap());
/// headers.insert("content-length", "10".parse().unwrap());
///
/// let body = Full::new(Bytes::from_static(br#"{"id": 42}"#));
/// let parsed = parse_request(&headers, body, &ParseOptions::default())
///     .await
///     .unwrap();
/// assert_eq!(parsed.as_json().unwrap()["id"], 42);
/// # });
/// ```
///
/// # Errors
///
/// See [`BodyParser::parse`].
pub async fn parse_request<B>(
    headers: &HeaderMap,
    body: B,
    options: &ParseOptions,
) -> Result<ParsedBody, HttpError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: fmt::Display,
{
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    BodyParser::parse(
        content_type,
        content_length(headers),
        body,
        options.max_multipart_memory_bytes,
    )
    .await
}

async fn collect<B>(body: B) -> Result<Bytes, String>
where
    B: Body<Data = Bytes> + Send,
    B::Error: fmt::Display,
{
    body.collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| e.to_string())
}

async fn decode_multipart<B>(
    boundary: &str,
    body: B,
    max_memory: u64,
) -> Result<MultipartForm, HttpError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: fmt::Display,
{
    let mut parser = MultipartParser::new(boundary, max_memory);
    let mut body = std::pin::pin!(body);
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| {
            warn!(error = %e, "failed to read multipart body");
            HttpError::multipart_decode()
        })?;
        if let Ok(data) = frame.into_data() {
            parser.feed(&data).await.map_err(multipart_failure)?;
        }
    }
    parser.finish().map_err(multipart_failure)
}

fn multipart_failure(err: MultipartError) -> HttpError {
    warn!(error = %err, "rejecting multipart body");
    err.into()
}
