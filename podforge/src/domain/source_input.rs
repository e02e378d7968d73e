//! Source input descriptor.
//!
//! Every submission carries one of three source kinds. Validation happens
//! here, synchronously, before a task record is ever created.

use serde::{Deserialize, Serialize};

use crate::utils::url::require_http_url;
use crate::{Error, Result};

/// Hosts treated as video platforms when inferring the source kind.
const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be", "vimeo.com", "twitch.tv"];

/// Maximum accepted raw-text payload, in characters.
const MAX_RAW_TEXT_CHARS: usize = 200_000;

/// Kind of source a task starts from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    VideoUrl,
    ArticleUrl,
    RawText,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoUrl => "VIDEO_URL",
            Self::ArticleUrl => "ARTICLE_URL",
            Self::RawText => "RAW_TEXT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VIDEO_URL" => Some(Self::VideoUrl),
            "ARTICLE_URL" => Some(Self::ArticleUrl),
            "RAW_TEXT" => Some(Self::RawText),
            _ => None,
        }
    }
}

/// Validated source input for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInput {
    pub kind: SourceKind,
    pub payload: String,
}

impl SourceInput {
    /// Validate `payload` against an explicitly chosen kind.
    pub fn new(kind: SourceKind, payload: impl Into<String>) -> Result<Self> {
        let payload = payload.into();
        match kind {
            SourceKind::VideoUrl | SourceKind::ArticleUrl => {
                require_http_url(&payload)?;
            }
            SourceKind::RawText => {
                if payload.trim().is_empty() {
                    return Err(Error::invalid_input("raw text payload is empty"));
                }
                if payload.chars().count() > MAX_RAW_TEXT_CHARS {
                    return Err(Error::invalid_input(format!(
                        "raw text exceeds {MAX_RAW_TEXT_CHARS} characters"
                    )));
                }
            }
        }
        Ok(Self { kind, payload })
    }

    /// Infer the kind from the payload shape.
    ///
    /// URLs on a known video host become [`SourceKind::VideoUrl`], other
    /// URLs [`SourceKind::ArticleUrl`], and anything that does not parse as
    /// a URL is treated as raw text.
    pub fn infer(payload: impl Into<String>) -> Result<Self> {
        let payload = payload.into();
        let trimmed = payload.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let parsed = require_http_url(trimmed)?;
            let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
            let kind = if VIDEO_HOSTS
                .iter()
                .any(|h| host == *h || host.ends_with(&format!(".{h}")))
            {
                SourceKind::VideoUrl
            } else {
                SourceKind::ArticleUrl
            };
            return Self::new(kind, trimmed.to_string());
        }

        Self::new(SourceKind::RawText, payload)
    }
}
