//! Access logging as a lifecycle hook.

use http::Response;
use restdeck_http::LifecycleHook;
use restdeck_http::body::ResponseBody;
use restdeck_http::request::RequestHead;
use tracing::info;

/// Logs one line per response.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl LifecycleHook for AccessLog {
    fn name(&self) -> &str {
        "access-log"
    }

    fn after_request(&self, head: &RequestHead, response: &mut Response<ResponseBody>) {
        info!(
            target: "restdeck::access",
            method = %head.method(),
            path = head.path(),
            status = response.status().as_u16(),
            host = head.url().host(),
            "request completed"
        );
    }
}
