//! Conversion of handler results and errors into wire responses.

use http::{HeaderValue, Response};
use restdeck_core::HttpError;

use crate::body::ResponseBody;
use crate::resource::ResourceResponse;

/// Value of the `server` header.
pub const SERVER_NAME: &str = "RestDeck";

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Render an [`HttpError`] as `{"status": <code>, "message": "<message>"}`.
#[must_use]
pub fn error_to_response(error: &HttpError) -> Response<ResponseBody> {
    let json = serde_json::to_vec(&error.to_json()).unwrap_or_default();
    let mut response = Response::new(ResponseBody::from_bytes(json));
    *response.status_mut() = error.status_code;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}

/// Turn a handler result into a wire response.
///
/// A non-empty body without a `content-type` gets `default_content_type`.
#[must_use]
pub fn into_wire_response(
    resource_response: ResourceResponse,
    default_content_type: &HeaderValue,
) -> Response<ResponseBody> {
    let ResourceResponse {
        status,
        mut headers,
        body,
    } = resource_response;

    if !body.is_empty() && !headers.contains_key(http::header::CONTENT_TYPE) {
        headers.insert(http::header::CONTENT_TYPE, default_content_type.clone());
    }

    let mut response = Response::new(ResponseBody::from_bytes(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Add the headers every response carries.
#[must_use]
pub fn add_common_headers(
    mut response: Response<ResponseBody>,
    request_id: &str,
) -> Response<ResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, hv);
    }
    headers
        .entry(http::header::SERVER)
        .or_insert(HeaderValue::from_static(SERVER_NAME));

    response
}
