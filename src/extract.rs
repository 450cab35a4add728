use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use serde::Deserialize;
use thiserror::Error;

use crate::html;

/// One node of a message's MIME content tree, as the Gmail API returns it
/// with `format=full`. A part either carries content in `body` or fans out
/// into `parts`; the API is not strict about that and neither are we.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimePart {
    #[serde(default)]
    pub mime_type: String,
    pub body: Option<PartBody>,
    pub parts: Option<Vec<MimePart>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// URL-safe base64 transport encoding; absent for container parts and
    /// attachments stored out of line.
    pub data: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid base64 in message body: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Where the extracted text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource {
    PlainText,
    HtmlConverted,
    Empty,
}

#[derive(Debug, Clone)]
pub struct ExtractedBody {
    pub text: String,
    pub source: BodySource,
}

impl ExtractedBody {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            source: BodySource::Empty,
        }
    }
}

/// Pick the plain-text rendition of a message payload.
///
/// The first `text/plain` child wins, scanned one level deep only; failing
/// that, the payload's own content is used, converted from HTML unless the
/// payload itself is plain text. Grandchildren are deliberately not
/// searched: widening the scan would change the output for nested multipart
/// messages, so trees without a top-level plain part fall through to the
/// root content or come back empty.
pub fn extract(root: &MimePart) -> Result<ExtractedBody, ExtractError> {
    if let Some(parts) = &root.parts {
        for part in parts {
            if part.mime_type == "text/plain" {
                return Ok(ExtractedBody {
                    text: decode_part(part.body.as_ref())?,
                    source: BodySource::PlainText,
                });
            }
        }
    }

    if let Some(data) = root.body.as_ref().and_then(|b| b.data.as_ref()) {
        let decoded = decode_data(data)?;
        return Ok(if root.mime_type == "text/plain" {
            ExtractedBody {
                text: decoded,
                source: BodySource::PlainText,
            }
        } else {
            ExtractedBody {
                text: html::convert(&decoded),
                source: BodySource::HtmlConverted,
            }
        });
    }

    Ok(ExtractedBody::empty())
}

fn decode_part(body: Option<&PartBody>) -> Result<String, ExtractError> {
    match body.and_then(|b| b.data.as_ref()) {
        Some(data) => decode_data(data),
        None => Ok(String::new()),
    }
}

fn decode_data(data: &str) -> Result<String, ExtractError> {
    let bytes = URL_SAFE.decode(data)?;
    // A corrupt transport encoding is an error; a stray non-UTF-8 byte in an
    // otherwise fine body is not worth losing the message over.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
