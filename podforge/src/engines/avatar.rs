//! HTTP client for the avatar-video engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{AvatarVideoEngine, AvatarVideoOutput, AvatarVideoRequest, AvatarVideoStatus};
use super::{classify_status, classify_transport};
use crate::{Error, Result};

const SERVICE: &str = "avatar-video";

/// Client for the avatar-video endpoint.
pub struct HttpAvatarVideoEngine {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateVideoRequest<'a> {
    model: &'a str,
    image_url: &'a str,
    audio_url: &'a str,
    style: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateVideoResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoStatusResponse {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpAvatarVideoEngine {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

fn parse_status(parsed: VideoStatusResponse) -> Result<AvatarVideoStatus> {
    match parsed.status.as_str() {
        "pending" | "queued" | "processing" => Ok(AvatarVideoStatus::Processing),
        "succeeded" | "completed" => {
            let video_url = parsed.video_url.ok_or_else(|| Error::ProviderRejected {
                service: SERVICE.to_string(),
                message: "succeeded render without video_url".to_string(),
            })?;
            Ok(AvatarVideoStatus::Succeeded(AvatarVideoOutput {
                video_url,
                thumbnail_url: parsed.thumbnail_url,
                duration_secs: parsed.duration_seconds,
            }))
        }
        "failed" => Ok(AvatarVideoStatus::Failed {
            message: parsed.error.unwrap_or_else(|| "unknown failure".to_string()),
        }),
        other => Err(Error::ProviderRejected {
            service: SERVICE.to_string(),
            message: format!("unknown render status '{other}'"),
        }),
    }
}

#[async_trait]
impl AvatarVideoEngine for HttpAvatarVideoEngine {
    async fn create_video(&self, model: &str, request: &AvatarVideoRequest) -> Result<String> {
        debug!(model, style = %request.style, "Creating avatar video render");

        let response = self
            .http
            .post(format!("{}/v1/avatars", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CreateVideoRequest {
                model,
                image_url: &request.image_url,
                audio_url: &request.audio_url,
                style: &request.style,
            })
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let parsed: CreateVideoResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;
        Ok(parsed.task_id)
    }

    async fn video_status(&self, engine_task_id: &str) -> Result<AvatarVideoStatus> {
        let response = self
            .http
            .get(format!("{}/v1/avatars/{engine_task_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let parsed: VideoStatusResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;
        parse_status(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_processing_variants() {
        for status in ["pending", "queued", "processing"] {
            let parsed: VideoStatusResponse =
                serde_json::from_str(&format!(r#"{{"status": "{status}"}}"#)).unwrap();
            assert_eq!(parse_status(parsed).unwrap(), AvatarVideoStatus::Processing);
        }
    }

    #[test]
    fn test_parse_succeeded_requires_video_url() {
        let parsed: VideoStatusResponse =
            serde_json::from_str(r#"{"status": "succeeded"}"#).unwrap();
        assert!(parse_status(parsed).is_err());

        let parsed: VideoStatusResponse = serde_json::from_str(
            r#"{"status": "succeeded", "video_url": "https://cdn.example.com/v.mp4", "duration_seconds": 18.5}"#,
        )
        .unwrap();
        match parse_status(parsed).unwrap() {
            AvatarVideoStatus::Succeeded(output) => {
                assert_eq!(output.video_url, "https://cdn.example.com/v.mp4");
                assert_eq!(output.duration_secs, Some(18.5));
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_status_rejected() {
        let parsed: VideoStatusResponse =
            serde_json::from_str(r#"{"status": "exploded"}"#).unwrap();
        assert!(matches!(
            parse_status(parsed),
            Err(Error::ProviderRejected { .. })
        ));
    }
}
