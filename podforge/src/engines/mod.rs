//! External generation-engine clients.
//!
//! Each engine is reached through a trait seam so the pipeline can be
//! exercised against mocks; the HTTP implementations live alongside and
//! share one owned `reqwest::Client`.

pub mod avatar;
pub mod ingest;
pub mod narration;
pub mod textgen;
pub mod traits;

pub use avatar::HttpAvatarVideoEngine;
pub use ingest::HttpSourceIngestor;
pub use narration::HttpNarrationSynthesizer;
pub use textgen::HttpTextGenerator;
pub use traits::{
    AvatarVideoEngine, AvatarVideoOutput, AvatarVideoRequest, AvatarVideoStatus, EpisodeOutput,
    EpisodeRequest, EpisodeStatus, IngestedSource, NarrationSynthesizer, QualityMode,
    SourceIngestor, TextGenerator,
};

use reqwest::StatusCode;

use crate::Error;

/// Map an HTTP status into the provider-failure taxonomy.
pub(crate) fn classify_status(service: &str, status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::ProviderUnauthorized {
            service: service.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => Error::ProviderRateLimited {
            service: service.to_string(),
        },
        s if s.is_server_error() => Error::ProviderTransient {
            service: service.to_string(),
            message: format!("HTTP {s}"),
        },
        s => Error::ProviderRejected {
            service: service.to_string(),
            message: format!("HTTP {s}: {}", truncate(body, 256)),
        },
    }
}

/// Map a transport-level `reqwest` failure into the taxonomy.
///
/// Connect, timeout, request, body and decode failures are transient;
/// anything else (redirect loops, builder misuse) is a rejection.
pub(crate) fn classify_transport(service: &str, error: reqwest::Error) -> Error {
    if error.is_connect()
        || error.is_timeout()
        || error.is_request()
        || error.is_body()
        || error.is_decode()
    {
        Error::ProviderTransient {
            service: service.to_string(),
            message: error.to_string(),
        }
    } else {
        Error::ProviderRejected {
            service: service.to_string(),
            message: error.to_string(),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_taxonomy() {
        assert!(matches!(
            classify_status("stt", StatusCode::UNAUTHORIZED, ""),
            Error::ProviderUnauthorized { .. }
        ));
        assert!(matches!(
            classify_status("stt", StatusCode::FORBIDDEN, ""),
            Error::ProviderUnauthorized { .. }
        ));
        assert!(matches!(
            classify_status("stt", StatusCode::TOO_MANY_REQUESTS, ""),
            Error::ProviderRateLimited { .. }
        ));
        assert!(matches!(
            classify_status("stt", StatusCode::BAD_GATEWAY, ""),
            Error::ProviderTransient { .. }
        ));
        assert!(matches!(
            classify_status("stt", StatusCode::BAD_REQUEST, "nope"),
            Error::ProviderRejected { .. }
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
