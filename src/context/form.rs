//! Form data: urlencoded fields and multipart uploads.
//!
//! # Responsibilities
//! - Decode `application/x-www-form-urlencoded` bodies
//! - Split `multipart/form-data` bodies into fields and file uploads
//!
//! # Design Decisions
//! - Bodies are already buffered, so parsing works on a byte slice
//! - Multipart parts without a `name` are skipped
//! - Structural errors (missing boundary, truncated part) are client errors

use axum::body::Bytes;

use crate::context::media::MediaType;
use crate::context::value::ValueMap;
use crate::error::{Error, Result};

/// A file sent in a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    pub filename: String,
    pub content_type: Option<MediaType>,
    pub content: Bytes,
}

impl FileUpload {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Form fields plus uploaded files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Formdata {
    fields: ValueMap,
    files: Vec<FileUpload>,
}

impl Formdata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a body according to its content type. Other content types yield an empty form.
    pub fn parse(content_type: Option<&MediaType>, body: &Bytes) -> Result<Self> {
        match content_type {
            Some(media) if media.matches(&MediaType::form_urlencoded()) => {
                let text = std::str::from_utf8(body)
                    .map_err(|e| Error::BadRequest(format!("form body is not UTF-8: {}", e)))?;
                Ok(Self {
                    fields: ValueMap::parse(text),
                    files: Vec::new(),
                })
            }
            Some(media) if media.matches(&MediaType::multipart_form_data()) => {
                let boundary = media
                    .param("boundary")
                    .ok_or_else(|| Error::BadRequest("multipart boundary missing".into()))?;
                parse_multipart(boundary, body)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name, value);
        self
    }

    pub fn file(mut self, upload: FileUpload) -> Self {
        self.files.push(upload);
        self
    }

    pub fn fields(&self) -> &ValueMap {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    pub fn files(&self) -> &[FileUpload] {
        &self.files
    }

    /// First upload sent under `name`.
    pub fn upload(&self, name: &str) -> Option<&FileUpload> {
        self.files.iter().find(|f| f.name == name)
    }
}

fn parse_multipart(boundary: &str, body: &[u8]) -> Result<Formdata> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let malformed = |reason: &str| Error::BadRequest(format!("malformed multipart body: {}", reason));

    let mut form = Formdata::default();
    let mut pos = find(body, delimiter, 0).ok_or_else(|| malformed("opening boundary not found"))?;

    loop {
        pos += delimiter.len();
        // Closing delimiter
        if body[pos..].starts_with(b"--") {
            return Ok(form);
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(malformed("boundary not followed by CRLF"));
        }
        pos += 2;

        // 1. Part headers
        let headers_end = find(body, b"\r\n\r\n", pos).ok_or_else(|| malformed("part headers not terminated"))?;
        let headers = std::str::from_utf8(&body[pos..headers_end])
            .map_err(|_| malformed("part headers are not UTF-8"))?;
        let content_start = headers_end + 4;

        // 2. Part content runs up to CRLF + next delimiter
        let mut closing = Vec::with_capacity(delimiter.len() + 2);
        closing.extend_from_slice(b"\r\n");
        closing.extend_from_slice(delimiter);
        let content_end = find(body, &closing, content_start).ok_or_else(|| malformed("part not terminated"))?;
        let content = Bytes::copy_from_slice(&body[content_start..content_end]);

        // 3. Classify by Content-Disposition
        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in headers.split("\r\n") {
            let Some((header, value)) = line.split_once(':') else {
                continue;
            };
            if header.trim().eq_ignore_ascii_case("content-disposition") {
                for attr in value.split(';').skip(1) {
                    if let Some((key, val)) = attr.split_once('=') {
                        let val = val.trim().trim_matches('"').to_string();
                        match key.trim() {
                            "name" => name = Some(val),
                            "filename" => filename = Some(val),
                            _ => {}
                        }
                    }
                }
            } else if header.trim().eq_ignore_ascii_case("content-type") {
                content_type = value.trim().parse::<MediaType>().ok();
            }
        }

        match (name, filename) {
            (Some(name), Some(filename)) => form.files.push(FileUpload {
                name,
                filename,
                content_type,
                content,
            }),
            (Some(name), None) => {
                let value = String::from_utf8_lossy(&content).into_owned();
                form.fields.insert(name, value);
            }
            _ => tracing::debug!("Skipping multipart part without a name"),
        }

        pos = content_end + 2;
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
