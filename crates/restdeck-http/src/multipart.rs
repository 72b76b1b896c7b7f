//! Streaming `multipart/form-data` decoding.
//!
//! [`MultipartParser`] consumes the body chunk by chunk, so a large upload is
//! never collected in one piece. Parts with a non-empty `filename` become
//! [`FormFile`]s; every other named part becomes a text field.
//!
//! Memory is budgeted the same way for the whole body:
//!
//! - file contents share a budget of `max_memory` bytes. A file that would
//!   overflow what remains is moved to a temporary file and continues on disk;
//! - field values may use `max_memory` plus [`FIELD_VALUE_ALLOWANCE`] bytes in
//!   total. Field values never spill, exceeding the allowance is an error.
//!
//! Spilled bytes are written with `tokio::fs`, so decoding yields to the
//! runtime while the disk catches up. Temporary files are removed when the
//! owning [`FormFile`] is dropped.

use std::path::Path;
use std::sync::LazyLock;

use bytes::{Buf, Bytes, BytesMut};
use regex::Regex;
use restdeck_core::HttpError;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::trace;

use crate::form::FormFields;

/// Extra room granted to text field values on top of the memory ceiling.
pub const FIELD_VALUE_ALLOWANCE: u64 = 10 * 1_048_576;

/// Upper bound for one part's header block.
pub const MAX_PART_HEADER_BYTES: usize = 16 * 1024;

/// Upper bound for the transport padding after a delimiter.
pub const MAX_BOUNDARY_PADDING_BYTES: usize = 1024;

/// Content type assumed for a file part that declares none.
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

const CRLF: &[u8] = b"\r\n";

static BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)boundary=([^\s;]+)").expect("boundary regex is valid"));

/// Extract the `boundary=` parameter of a multipart content type.
///
/// Surrounding double quotes are removed. Returns `None` when the parameter
/// is absent or empty.
#[must_use]
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let captures = BOUNDARY_RE.captures(content_type)?;
    let boundary = captures.get(1)?.as_str().trim_matches('"');
    if boundary.is_empty() {
        None
    } else {
        Some(boundary.to_owned())
    }
}

/// Failure while decoding a multipart body.
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    /// The byte stream does not follow the multipart grammar.
    #[error("malformed multipart body: {0}")]
    Malformed(&'static str),

    /// A part header block is larger than [`MAX_PART_HEADER_BYTES`].
    #[error("multipart part headers are too large")]
    HeadersTooLarge,

    /// Field values exceed the memory allowance.
    #[error("multipart field values exceed the memory allowance")]
    FieldTooLarge,

    /// The body ended before the closing delimiter.
    #[error("multipart body ended before the closing boundary")]
    Incomplete,

    /// Spilling a file to disk failed.
    #[error("failed to buffer multipart file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MultipartError> for HttpError {
    fn from(_: MultipartError) -> Self {
        Self::multipart_decode()
    }
}

/// Where an uploaded file's bytes live.
#[derive(Debug)]
pub enum FileContent {
    /// Held in memory.
    InMemory(Bytes),
    /// Spilled to a temporary file, deleted on drop.
    OnDisk {
        /// The temporary file.
        file: NamedTempFile,
        /// Number of bytes written.
        size: u64,
    },
}

/// A file part of a multipart body.
#[derive(Debug)]
pub struct FormFile {
    /// The part's `name` parameter.
    pub field_name: String,
    /// The part's `filename` parameter.
    pub file_name: String,
    /// The part's `Content-Type`, or `application/octet-stream`.
    pub content_type: String,
    /// The file content.
    pub content: FileContent,
}

impl FormFile {
    /// Size of the content in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        match &self.content {
            FileContent::InMemory(bytes) => bytes.len() as u64,
            FileContent::OnDisk { size, .. } => *size,
        }
    }

    /// Whether the content stayed in memory.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        matches!(self.content, FileContent::InMemory(_))
    }

    /// The in-memory content, if it was not spilled.
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.content {
            FileContent::InMemory(bytes) => Some(bytes),
            FileContent::OnDisk { .. } => None,
        }
    }

    /// Path of the temporary file, if the content was spilled.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::InMemory(_) => None,
            FileContent::OnDisk { file, .. } => Some(file.path()),
        }
    }

    /// Load the whole content, reading the temporary file if needed.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from reading the temporary file.
    pub async fn read_to_bytes(&self) -> std::io::Result<Bytes> {
        match &self.content {
            FileContent::InMemory(bytes) => Ok(bytes.clone()),
            FileContent::OnDisk { file, .. } => tokio::fs::read(file.path()).await.map(Bytes::from),
        }
    }
}

/// A decoded multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Text fields, in body order.
    pub fields: FormFields,
    /// File parts, in body order.
    pub files: Vec<FormFile>,
}

impl MultipartForm {
    /// First text value for `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    /// First file uploaded under `name`.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files.iter().find(|f| f.field_name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    AfterDelimiter,
    Headers,
    Body,
    Epilogue,
}

#[derive(Debug)]
enum FileSink {
    Memory(BytesMut),
    Disk {
        file: NamedTempFile,
        writer: File,
        size: u64,
    },
}

impl FileSink {
    async fn write(&mut self, data: &[u8], budget: u64) -> Result<(), MultipartError> {
        match self {
            Self::Memory(buf) => {
                if (buf.len() + data.len()) as u64 > budget {
                    let file = NamedTempFile::new()?;
                    let mut writer = File::create(file.path()).await?;
                    writer.write_all(&buf[..]).await?;
                    writer.write_all(data).await?;
                    let size = (buf.len() + data.len()) as u64;
                    trace!(size, path = %file.path().display(), "spilled multipart file to disk");
                    *self = Self::Disk { file, writer, size };
                } else {
                    buf.extend_from_slice(data);
                }
            }
            Self::Disk { writer, size, .. } => {
                writer.write_all(data).await?;
                *size += data.len() as u64;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
enum PartSink {
    Skip,
    Field {
        name: String,
        value: Vec<u8>,
    },
    File {
        field_name: String,
        file_name: String,
        content_type: String,
        sink: FileSink,
    },
}

#[derive(Debug, Default)]
struct PartHeaders {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl PartHeaders {
    fn parse(block: &[u8]) -> Result<Self, MultipartError> {
        let text = std::str::from_utf8(block)
            .map_err(|_| MultipartError::Malformed("part headers are not UTF-8"))?;

        let mut headers = Self::default();
        for line in text.split("\r\n").filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or(MultipartError::Malformed("part header line has no colon"))?;
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-disposition") {
                let mut params = split_unquoted(value).into_iter();
                let disposition = params.next().unwrap_or_default().trim();
                if !disposition.eq_ignore_ascii_case("form-data") {
                    continue;
                }
                for param in params {
                    let Some((key, raw)) = param.split_once('=') else {
                        continue;
                    };
                    match key.trim().to_ascii_lowercase().as_str() {
                        "name" => headers.name = Some(unquote(raw)),
                        "filename" => headers.file_name = Some(unquote(raw)),
                        _ => {}
                    }
                }
            } else if name.eq_ignore_ascii_case("content-type") && !value.is_empty() {
                headers.content_type = Some(value.to_owned());
            }
        }
        Ok(headers)
    }
}

/// Incremental multipart decoder.
///
/// ```rust
/// use restdeck_http::multipart::MultipartParser;
///
/// # tokio_test::block_on(async {
/// let mut parser = MultipartParser::new("XyZ", 1024);
/// parser
///     .feed(b"--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n")
///     .await
///     .unwrap();
/// parser.feed(b"hello\r\n--XyZ--\r\n").await.unwrap();
/// let form = parser.finish().unwrap();
/// assert_eq!(form.field("a"), Some("hello"));
/// # });
/// ```
#[derive(Debug)]
pub struct MultipartParser {
    dash_boundary: Vec<u8>,
    delimiter: Vec<u8>,
    buf: BytesMut,
    state: State,
    part: Option<PartSink>,
    form: MultipartForm,
    file_budget: u64,
    value_budget: u64,
}

impl MultipartParser {
    /// Create a parser for `boundary` with `max_memory` bytes for file contents.
    #[must_use]
    pub fn new(boundary: &str, max_memory: u64) -> Self {
        let dash_boundary = format!("--{boundary}").into_bytes();
        let mut delimiter = CRLF.to_vec();
        delimiter.extend_from_slice(&dash_boundary);
        Self {
            dash_boundary,
            delimiter,
            buf: BytesMut::new(),
            state: State::Preamble,
            part: None,
            form: MultipartForm::default(),
            file_budget: max_memory,
            value_budget: max_memory.saturating_add(FIELD_VALUE_ALLOWANCE),
        }
    }

    /// Consume the next chunk of the body.
    ///
    /// # Errors
    ///
    /// Fails as soon as the input is known to be malformed or over budget.
    pub async fn feed(&mut self, chunk: &[u8]) -> Result<(), MultipartError> {
        if self.state == State::Epilogue {
            return Ok(());
        }
        self.buf.extend_from_slice(chunk);
        while self.step().await? {}
        Ok(())
    }

    /// Finish decoding once the body is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`MultipartError::Incomplete`] if the closing delimiter was
    /// never seen.
    pub fn finish(self) -> Result<MultipartForm, MultipartError> {
        if self.state == State::Epilogue {
            Ok(self.form)
        } else {
            Err(MultipartError::Incomplete)
        }
    }

    /// Advance the state machine once. Returns `false` when more input is needed.
    async fn step(&mut self) -> Result<bool, MultipartError> {
        match self.state {
            State::Preamble => {
                if let Some(pos) = find(&self.buf, &self.dash_boundary) {
                    self.buf.advance(pos + self.dash_boundary.len());
                    self.state = State::AfterDelimiter;
                    Ok(true)
                } else {
                    let discard = self
                        .buf
                        .len()
                        .saturating_sub(self.dash_boundary.len() - 1);
                    self.buf.advance(discard);
                    Ok(false)
                }
            }
            State::AfterDelimiter => {
                if self.buf.len() < 2 {
                    return Ok(false);
                }
                if self.buf.starts_with(b"--") {
                    self.buf.clear();
                    self.state = State::Epilogue;
                    return Ok(false);
                }
                match find(&self.buf, CRLF) {
                    Some(pos)
                        if pos <= MAX_BOUNDARY_PADDING_BYTES && is_padding(&self.buf[..pos]) =>
                    {
                        self.buf.advance(pos + CRLF.len());
                        self.state = State::Headers;
                        Ok(true)
                    }
                    None if self.buf.len() > MAX_BOUNDARY_PADDING_BYTES => {
                        Err(MultipartError::Malformed("boundary line is too long"))
                    }
                    None if self
                        .buf
                        .iter()
                        .all(|b| matches!(b, b' ' | b'\t' | b'\r')) =>
                    {
                        Ok(false)
                    }
                    _ => Err(MultipartError::Malformed("unexpected bytes after boundary")),
                }
            }
            State::Headers => {
                let (block_len, consumed) = if self.buf.starts_with(CRLF) {
                    (0, CRLF.len())
                } else if let Some(pos) = find(&self.buf, b"\r\n\r\n") {
                    (pos, pos + 4)
                } else if self.buf.len() > MAX_PART_HEADER_BYTES {
                    return Err(MultipartError::HeadersTooLarge);
                } else {
                    return Ok(false);
                };
                if block_len > MAX_PART_HEADER_BYTES {
                    return Err(MultipartError::HeadersTooLarge);
                }
                let headers = PartHeaders::parse(&self.buf[..block_len])?;
                self.buf.advance(consumed);
                self.part = Some(open_part(headers));
                self.state = State::Body;
                Ok(true)
            }
            State::Body => {
                if let Some(pos) = find(&self.buf, &self.delimiter) {
                    let data = self.buf.split_to(pos);
                    self.buf.advance(self.delimiter.len());
                    self.write_part(&data).await?;
                    self.close_part().await?;
                    self.state = State::AfterDelimiter;
                    Ok(true)
                } else {
                    // The tail may hold the start of a delimiter.
                    let ready = self.buf.len().saturating_sub(self.delimiter.len() - 1);
                    if ready > 0 {
                        let data = self.buf.split_to(ready);
                        self.write_part(&data).await?;
                    }
                    Ok(false)
                }
            }
            State::Epilogue => {
                self.buf.clear();
                Ok(false)
            }
        }
    }

    async fn write_part(&mut self, data: &[u8]) -> Result<(), MultipartError> {
        match self.part.as_mut() {
            None | Some(PartSink::Skip) => Ok(()),
            Some(PartSink::Field { value, .. }) => {
                let len = data.len() as u64;
                if len > self.value_budget {
                    return Err(MultipartError::FieldTooLarge);
                }
                self.value_budget -= len;
                value.extend_from_slice(data);
                Ok(())
            }
            Some(PartSink::File { sink, .. }) => sink.write(data, self.file_budget).await,
        }
    }

    async fn close_part(&mut self) -> Result<(), MultipartError> {
        match self.part.take() {
            None | Some(PartSink::Skip) => {}
            Some(PartSink::Field { name, value }) => {
                let value = String::from_utf8_lossy(&value).into_owned();
                self.form.fields.push(name, value);
            }
            Some(PartSink::File {
                field_name,
                file_name,
                content_type,
                sink,
            }) => {
                let content = match sink {
                    FileSink::Memory(buf) => {
                        self.file_budget = self.file_budget.saturating_sub(buf.len() as u64);
                        FileContent::InMemory(buf.freeze())
                    }
                    FileSink::Disk {
                        file,
                        mut writer,
                        size,
                    } => {
                        writer.flush().await?;
                        FileContent::OnDisk { file, size }
                    }
                };
                self.form.files.push(FormFile {
                    field_name,
                    file_name,
                    content_type,
                    content,
                });
            }
        }
        Ok(())
    }
}

/// Decode a complete multipart body held in memory.
///
/// # Errors
///
/// See [`MultipartParser::feed`] and [`MultipartParser::finish`].
pub async fn parse_multipart(
    body: &[u8],
    boundary: &str,
    max_memory: u64,
) -> Result<MultipartForm, MultipartError> {
    let mut parser = MultipartParser::new(boundary, max_memory);
    parser.feed(body).await?;
    parser.finish()
}

fn open_part(headers: PartHeaders) -> PartSink {
    let Some(name) = headers.name else {
        trace!("skipping multipart part without a name");
        return PartSink::Skip;
    };
    match headers.file_name.filter(|f| !f.is_empty()) {
        Some(file_name) => PartSink::File {
            field_name: name,
            file_name,
            content_type: headers
                .content_type
                .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_owned()),
            sink: FileSink::Memory(BytesMut::new()),
        },
        None => PartSink::Field {
            name,
            value: Vec::new(),
        },
    }
}

/// Split header parameters on `;`, ignoring separators inside quotes.
fn split_unquoted(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_owned();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn is_padding(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| matches!(b, b' ' | b'\t'))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
