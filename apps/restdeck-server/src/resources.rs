//! Resources served by the demo binary.

use http::StatusCode;
use restdeck_core::{HttpError, RestDeckResult};
use restdeck_http::multipart::FormFile;
use restdeck_http::{ParsedBody, RequestContext, Resource, ResourceResponse};
use serde::Serialize;
use serde_json::{Value, json};

/// Server version reported by the health resource.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Multipart ceiling for `/upload`, in megabytes.
const UPLOAD_MEMORY_MB: u64 = 1;

/// Every demo resource, in registration order.
///
/// `/users/new` is registered ahead of `/users/:id` so the literal path wins.
pub fn demo_resources() -> RestDeckResult<Vec<Resource>> {
    Ok(vec![
        Resource::builder("health").path("/health").get(health).build()?,
        Resource::builder("hello")
            .path("/hello/:thing/:greeting")
            .get(hello)
            .build()?,
        Resource::builder("new-user")
            .path("/users/new")
            .get(new_user)
            .build()?,
        Resource::builder("user")
            .path("/users/:id")
            .get(get_user)
            .delete(delete_user)
            .build()?,
        Resource::builder("echo")
            .path("/echo")
            .post(echo)
            .put(echo)
            .build()?,
        Resource::builder("upload")
            .path("/upload")
            .post(upload)
            .multipart_memory_mb(UPLOAD_MEMORY_MB)
            .build()?,
    ])
}

async fn health(_ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    ResourceResponse::json(&json!({ "status": "running", "version": VERSION }))
}

async fn hello(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    let thing = ctx.path_param("thing").unwrap_or_default();
    let greeting = ctx.path_param("greeting").unwrap_or_default();

    if ctx.accepts(&["application/json"]) {
        return ResourceResponse::json(&json!({ "thing": thing, "greeting": greeting }));
    }
    Ok(ResourceResponse::text(format!("{greeting}, {thing}!")))
}

async fn new_user(_ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    ResourceResponse::json(&json!({ "id": null, "name": "" }))
}

fn user_id(ctx: &RequestContext) -> Result<u64, HttpError> {
    let raw = ctx.path_param("id").unwrap_or_default();
    let id: u64 = raw
        .parse()
        .map_err(|_| HttpError::status(StatusCode::BAD_REQUEST, format!("invalid user id: {raw}")))?;
    if id == 0 {
        return Err(HttpError::status(StatusCode::NOT_FOUND, "user 0 does not exist"));
    }
    Ok(id)
}

async fn get_user(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    let id = user_id(&ctx)?;
    let name = ctx.cookie("name").unwrap_or("anonymous");
    ResourceResponse::json(&json!({ "id": id, "name": name }))
}

async fn delete_user(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    user_id(&ctx)?;
    Ok(ResourceResponse::new(StatusCode::NO_CONTENT))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileSummary<'a> {
    field_name: &'a str,
    file_name: &'a str,
    content_type: &'a str,
    size: u64,
    in_memory: bool,
}

impl<'a> From<&'a FormFile> for FileSummary<'a> {
    fn from(file: &'a FormFile) -> Self {
        Self {
            field_name: &file.field_name,
            file_name: &file.file_name,
            content_type: &file.content_type,
            size: file.size(),
            in_memory: file.is_in_memory(),
        }
    }
}

fn body_to_json(body: &ParsedBody) -> Value {
    match body {
        ParsedBody::Empty => Value::Null,
        ParsedBody::Form(fields) => json!(fields.to_map()),
        ParsedBody::Json(value) => value.clone(),
        ParsedBody::Multipart(form) => json!({
            "fields": form.fields.to_map(),
            "files": form.files.iter().map(FileSummary::from).collect::<Vec<_>>(),
        }),
    }
}

/// Echo the decoded body back with the content type it was decoded as.
async fn echo(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    let body = ctx.body();
    ResourceResponse::json(&json!({
        "contentType": body.content_type(),
        "body": body_to_json(body),
    }))
}

async fn upload(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    let Some(form) = ctx.body().as_multipart() else {
        return Err(HttpError::status(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected multipart/form-data",
        ));
    };
    let files: Vec<FileSummary<'_>> = form.files.iter().map(FileSummary::from).collect();
    Ok(ResourceResponse::json(&json!({ "files": files }))?.with_status(StatusCode::CREATED))
}
