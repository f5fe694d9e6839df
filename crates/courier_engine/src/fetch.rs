use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; KindleCourier/1.0)";
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            redirect_limit: 5,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Binary GET with a size ceiling. `bearer` is attached as an
/// `Authorization: Bearer` credential when present.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, bearer: Option<&str>) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, bearer: Option<&str>) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme {}", parsed.scheme()),
            ));
        }

        let mut request = self.client.get(parsed);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput { bytes, metadata })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
